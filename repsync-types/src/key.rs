//! Typed entity keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Stable identifier of a mutable entity whose writes are coalesced.
///
/// Keys are just strings underneath — no UUID enforcement, no format
/// requirement. The one precondition is non-emptiness, validated at
/// construction so the scheduler never has to re-check it.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKey(String);

impl EntityKey {
    /// Create a key from anything that converts to `String`.
    ///
    /// Returns [`KeyError::Empty`] for an empty string.
    pub fn new(key: impl Into<String>) -> Result<Self, KeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self(key))
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for EntityKey {
    type Error = KeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.0
    }
}
