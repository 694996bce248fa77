//! Relocation engine: bounded repair for tutorial and practical requests.
//!
//! When direct placement fails for a TD/TP request, each TD/TP session
//! already placed this run for the same class-group in the same week is
//! tried as a displacement victim, in (start, id) order: remove it, place
//! the new request, then re-place the victim elsewhere in the week. At most
//! one swap is committed per attempt; anything short of both placements
//! succeeding restores the index to its prior state.
//!
//! Only sessions placed during the current run (provisional ids) are moved:
//! persisted sessions from earlier runs are user-visible and stay put.

use tracing::debug;

use crate::models::SessionId;

use super::availability::{AvailabilityIndex, IndexedSession};
use super::placement::{place_request, Placed, PlacementContext};
use super::requests::{RequestKind, SessionRequest};
use super::GenerationInput;

/// A committed swap: the new request placed plus the victim's new slot.
#[derive(Debug)]
pub struct Relocation {
    pub placed: Placed,
    pub moved_from: SessionId,
    pub moved_to: Placed,
}

pub fn try_relocate(
    index: &mut AvailabilityIndex,
    input: &GenerationInput,
    ctx: &PlacementContext<'_>,
    request: &SessionRequest,
    week_start: chrono::NaiveDate,
) -> Option<Relocation> {
    let candidates = index.relocatable_sessions(request.class_group, week_start);
    for victim_id in candidates {
        // Only this run's sessions move; their course must be in scope so
        // the re-placement request can be rebuilt.
        if victim_id.value() >= 0 {
            continue;
        }
        let Some(victim) = index.session(victim_id).cloned() else {
            continue;
        };
        if input.course(victim.course).is_none() {
            continue;
        }

        let checkpoint = index.checkpoint();
        index.remove(victim_id);

        let placed = match place_request(index, ctx, request, week_start) {
            Ok(placed) => placed,
            Err(_) => {
                index.restore(checkpoint);
                continue;
            }
        };

        let victim_request = rebuild_request(&victim);
        let victim_ctx = PlacementContext {
            input,
            // The victim stays in the same week; its weekly count is
            // unchanged, so no quota applies to the move.
            quota_remaining: None,
            continuity_teacher: Some(victim.teacher),
        };
        match place_request(index, &victim_ctx, &victim_request, week_start) {
            Ok(moved_to)
                if !(moved_to.session.start == victim.start
                    && moved_to.session.room == victim.room) =>
            {
                debug!(
                    victim = %victim_id,
                    from = %victim.start,
                    to = %moved_to.session.start,
                    "relocated session to free a slot"
                );
                return Some(Relocation {
                    placed,
                    moved_from: victim_id,
                    moved_to,
                });
            }
            _ => {
                index.restore(checkpoint);
            }
        }
    }
    None
}

/// Rebuild a placement request for a displaced session.
fn rebuild_request(victim: &IndexedSession) -> SessionRequest {
    SessionRequest {
        seq: u32::MAX,
        course: victim.course,
        class_group: victim.class_group,
        subgroup_label: victim.subgroup_label.clone(),
        kind: if victim.course_type == crate::models::CourseType::TP {
            RequestKind::Practical
        } else {
            RequestKind::Tutorial
        },
        duration_hours: victim.duration_hours(),
        preferred_teacher: Some(victim.teacher),
        released: true,
        attempts: 0,
        carried_weeks: 0,
        last_rejection: None,
    }
}
