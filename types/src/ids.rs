use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Principals
// ============================================================================

/// Verified identifier of an individual player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Parse an identifier-shaped token.
    ///
    /// Accepts the dashed 36-character form, the undashed 32-character hex
    /// form and either of those behind a case-insensitive `uuid:` prefix.
    /// Anything else (names, braced or URN forms) is rejected.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        let raw = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("uuid:") => &trimmed[5..],
            _ => trimmed,
        };
        if raw.len() != 32 && raw.len() != 36 {
            return None;
        }
        Uuid::try_parse(raw).ok().map(Self)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Name of a permission group. Stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for GroupId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<GroupId> for String {
    fn from(value: GroupId) -> Self {
        value.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Regions
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionIdError {
    #[error("region id cannot be empty")]
    Empty,
    #[error("region id '{id}' contains invalid character '{ch}'")]
    InvalidChar { id: String, ch: char },
}

/// Region identifier.
///
/// Keeps the spelling it was created with for display, but compares and
/// hashes case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId {
    display: String,
    key: String,
}

impl RegionId {
    pub fn new(raw: impl Into<String>) -> Result<Self, RegionIdError> {
        let display = raw.into();
        if display.is_empty() {
            return Err(RegionIdError::Empty);
        }
        if let Some(ch) = display.chars().find(|ch| !is_valid_id_char(*ch)) {
            return Err(RegionIdError::InvalidChar { id: display, ch });
        }
        let key = display.to_lowercase();
        Ok(Self { display, key })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lower-cased form used for equality.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn is_valid_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | ',' | '\'' | '-' | '+' | '/')
}

impl PartialEq for RegionId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RegionId {}

impl Hash for RegionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl TryFrom<String> for RegionId {
    type Error = RegionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RegionId {
    type Error = RegionIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionId> for String {
    fn from(value: RegionId) -> Self {
        value.display
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Host-assigned identity of a moving entity (mob, vehicle, player).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
