//! Typed entity identifiers.
//!
//! The planner works on immutable snapshot tables keyed by these ids, so the
//! course/class/teacher relationships stay flat instead of forming cyclic
//! object graphs.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(value: i64) -> Self {
                $name(value)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Teacher identifier.
    TeacherId
);
entity_id!(
    /// Class-group identifier.
    ClassGroupId
);
entity_id!(
    /// Room identifier.
    RoomId
);
entity_id!(
    /// Course identifier.
    CourseId
);
entity_id!(
    /// Session identifier (assigned on persistence; planner-local sessions
    /// use negative provisional values).
    SessionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrip() {
        let id = CourseId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id, CourseId(42));
    }

    #[test]
    fn ids_order_by_value() {
        assert!(SessionId::new(1) < SessionId::new(2));
    }
}
