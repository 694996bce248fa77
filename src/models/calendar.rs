//! Calendar model: working windows, canonical slots, week enumeration.
//!
//! A working day is made of four canonical windows. A slot is any interval of
//! the requested duration that starts on a whole hour boundary inside a
//! window (starting at the window start) and ends no later than the window
//! end: a 1h duration yields two slots per window, a 2h duration exactly one.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use super::entities::{ClosingPeriod, DateSpan};

/// The four canonical daily working windows.
pub const WORKING_WINDOWS: [(NaiveTime, NaiveTime); 4] = [
    (
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    ),
    (
        NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
        NaiveTime::from_hms_opt(12, 15, 0).unwrap(),
    ),
    (
        NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
        NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
    ),
    (
        NaiveTime::from_hms_opt(15, 45, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 45, 0).unwrap(),
    ),
];

/// Longest placeable session, in hours (the window length).
pub const MAX_SESSION_HOURS: u32 = 2;

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_closed(date: NaiveDate, closings: &[ClosingPeriod]) -> bool {
    closings.iter().any(|p| p.span.contains(date))
}

/// Ordered Mondays of every week intersecting `window`, excluding weeks
/// whose five weekdays are all inside a closing period.
pub fn weeks_in(window: DateSpan, closings: &[ClosingPeriod]) -> Vec<NaiveDate> {
    let mut weeks = Vec::new();
    let mut current = week_start(window.start);
    while current <= window.end {
        if !working_days(current, closings).is_empty() {
            weeks.push(current);
        }
        current += Duration::days(7);
    }
    weeks
}

/// Weekdays (Mon..Fri) of the week starting at `week_start` that are not
/// inside any closing period.
pub fn working_days(week_start: NaiveDate, closings: &[ClosingPeriod]) -> Vec<NaiveDate> {
    (0..5)
        .map(|offset| week_start + Duration::days(offset))
        .filter(|day| is_weekday(*day) && !is_closed(*day, closings))
        .collect()
}

/// Ordered candidate slots of `duration_hours` on `day`, earliest first.
pub fn slots(day: NaiveDate, duration_hours: u32) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let duration = Duration::hours(duration_hours as i64);
    let mut out = Vec::new();
    for (window_start, window_end) in WORKING_WINDOWS {
        let mut start = window_start;
        loop {
            let end = start + duration;
            if end > window_end {
                break;
            }
            out.push((day.and_time(start), day.and_time(end)));
            start += Duration::hours(1);
        }
    }
    out
}

/// True when `[start, end]` lies inside a single working window.
pub fn inside_working_window(start: NaiveTime, end: NaiveTime) -> bool {
    WORKING_WINDOWS
        .iter()
        .any(|(ws, we)| *ws <= start && end <= *we)
}

/// Human week label, e.g. `S42 2025 — 13/10 → 19/10`.
pub fn week_label(week_start: NaiveDate) -> String {
    let iso = week_start.iso_week();
    let week_end = week_start + Duration::days(6);
    format!(
        "S{:02} {} — {} → {}",
        iso.week(),
        iso.year(),
        week_start.format("%d/%m"),
        week_end.format("%d/%m"),
    )
}
