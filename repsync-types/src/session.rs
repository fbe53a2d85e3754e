//! Live-session domain types.
//!
//! The coordination core is generic; these are the concrete types the
//! workout app instantiates it with; tests use them as realistic payloads.

use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::key::EntityKey;

/// Status of a tracked set within a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetStatus {
    /// Not yet attempted.
    Pending,
    /// All planned reps done at the planned weight.
    Completed,
    /// Attempted but not completed as planned.
    Failed,
    /// Deliberately skipped.
    Skipped,
}

/// One tracked exercise set in a live workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSet {
    /// Backend identifier for this set.
    pub id: String,
    /// Exercise name as shown to the user.
    pub exercise: String,
    /// Reps actually performed.
    pub reps: u32,
    /// Weight actually moved, in kilograms.
    pub weight_kg: f64,
    /// Current status of the set.
    pub status: SetStatus,
}

impl SessionSet {
    /// The entity key under which writes to this set are coalesced.
    pub fn key(&self) -> Result<EntityKey, KeyError> {
        EntityKey::new(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench_press_set() -> SessionSet {
        SessionSet {
            id: "set-1".into(),
            exercise: "Bench Press".into(),
            reps: 8,
            weight_kg: 80.0,
            status: SetStatus::Completed,
        }
    }

    #[test]
    fn set_key_matches_id() {
        let set = bench_press_set();
        assert_eq!(set.key().unwrap().as_str(), "set-1");
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&SetStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
