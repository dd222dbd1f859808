//! Validated entity identifier.
//!
//! Every ranked entity (player, song, product) is keyed by an opaque string
//! supplied by the producer. The identifier is validated once at the edge
//! (event decoding, snapshot loading, query path parsing) so the ranking
//! store can treat it as trusted.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Maximum length of an entity identifier in bytes.
pub const MAX_ENTITY_ID_LEN: usize = 128;

/// Reasons an entity identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityIdError {
    /// The identifier is the empty string.
    #[error("entity id is empty")]
    Empty,

    /// The identifier exceeds [`MAX_ENTITY_ID_LEN`] bytes.
    #[error("entity id is {len} bytes, maximum is {MAX_ENTITY_ID_LEN}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
    },

    /// The identifier contains whitespace or a control character.
    #[error("entity id contains invalid character {ch:?}")]
    InvalidChar {
        /// The offending character.
        ch: char,
    },
}

/// Unique key of a leaderboard entry.
///
/// Ordering is plain byte-wise string ordering, which is the tie-break
/// used by the ranked view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(try_from = "String", into = "String")]
#[ts(export, export_to = "bindings/")]
pub struct EntityId(String);

impl EntityId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EntityIdError`] if the identifier is empty, longer than
    /// [`MAX_ENTITY_ID_LEN`], or contains whitespace/control characters.
    pub fn parse(raw: &str) -> Result<Self, EntityIdError> {
        Self::try_from(raw.to_owned())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if raw.is_empty() {
            return Err(EntityIdError::Empty);
        }
        if raw.len() > MAX_ENTITY_ID_LEN {
            return Err(EntityIdError::TooLong { len: raw.len() });
        }
        if let Some(ch) = raw.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(EntityIdError::InvalidChar { ch });
        }
        Ok(Self(raw))
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(&self.0)
    }
}

impl core::str::FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        let id = EntityId::parse("player-42");
        assert_eq!(id.map(String::from), Ok(String::from("player-42")));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(EntityId::parse(""), Err(EntityIdError::Empty));
    }

    #[test]
    fn rejects_whitespace() {
        assert_eq!(
            EntityId::parse("two words"),
            Err(EntityIdError::InvalidChar { ch: ' ' })
        );
    }

    #[test]
    fn rejects_overlong() {
        let raw = "x".repeat(MAX_ENTITY_ID_LEN.saturating_add(1));
        assert!(matches!(
            EntityId::parse(&raw),
            Err(EntityIdError::TooLong { .. })
        ));
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<EntityId, _> = serde_json::from_str("\"song_7\"");
        assert!(ok.is_ok());
        let bad: Result<EntityId, _> = serde_json::from_str("\"\\u0007bell\"");
        assert!(bad.is_err());
    }

    #[test]
    fn ordering_is_bytewise() {
        let a = EntityId::parse("A").ok();
        let b = EntityId::parse("B").ok();
        assert!(a < b);
    }
}
