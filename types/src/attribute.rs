//! Attribute (flag) catalog and per-region settings.
//!
//! The catalog is static: every key the engine understands is a variant of
//! [`AttributeKey`], each with a semantic kind and a global default. The
//! resolver never interprets values, it only orders them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Domain;

/// Allow/deny value of a state attribute. "Unset" is the absence of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Allow,
    Deny,
}

impl State {
    #[must_use]
    pub fn is_allow(self) -> bool {
        self == State::Allow
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(State::Allow),
            "deny" => Some(State::Deny),
            _ => None,
        }
    }
}

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    State,
    Boolean,
    Integer,
    Choice(&'static [&'static str]),
    Domain,
}

impl AttributeKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AttributeKind::State => "state",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Integer => "integer",
            AttributeKind::Choice(_) => "choice",
            AttributeKind::Domain => "domain",
        }
    }
}

const GAME_MODES: &[&str] = &["survival", "creative", "adventure", "spectator"];

/// Known attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKey {
    Build,
    Entry,
    Exit,
    MobEntry,
    MobExit,
    Pvp,
    Buyable,
    HealDelay,
    MaxPlayers,
    GameMode,
    EntryBypass,
}

impl AttributeKey {
    #[must_use]
    pub fn all() -> &'static [AttributeKey] {
        &[
            AttributeKey::Build,
            AttributeKey::Entry,
            AttributeKey::Exit,
            AttributeKey::MobEntry,
            AttributeKey::MobExit,
            AttributeKey::Pvp,
            AttributeKey::Buyable,
            AttributeKey::HealDelay,
            AttributeKey::MaxPlayers,
            AttributeKey::GameMode,
            AttributeKey::EntryBypass,
        ]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AttributeKey::Build => "build",
            AttributeKey::Entry => "entry",
            AttributeKey::Exit => "exit",
            AttributeKey::MobEntry => "mob-entry",
            AttributeKey::MobExit => "mob-exit",
            AttributeKey::Pvp => "pvp",
            AttributeKey::Buyable => "buyable",
            AttributeKey::HealDelay => "heal-delay",
            AttributeKey::MaxPlayers => "max-players",
            AttributeKey::GameMode => "game-mode",
            AttributeKey::EntryBypass => "entry-bypass",
        }
    }

    /// Look up a key by name, ignoring case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(wanted))
    }

    #[must_use]
    pub fn kind(self) -> AttributeKind {
        match self {
            AttributeKey::Build
            | AttributeKey::Entry
            | AttributeKey::Exit
            | AttributeKey::MobEntry
            | AttributeKey::MobExit
            | AttributeKey::Pvp => AttributeKind::State,
            AttributeKey::Buyable => AttributeKind::Boolean,
            AttributeKey::HealDelay | AttributeKey::MaxPlayers => AttributeKind::Integer,
            AttributeKey::GameMode => AttributeKind::Choice(GAME_MODES),
            AttributeKey::EntryBypass => AttributeKind::Domain,
        }
    }

    /// Value used when no applicable region defines the key.
    #[must_use]
    pub fn default_value(self) -> Option<AttributeValue> {
        match self {
            AttributeKey::Entry
            | AttributeKey::Exit
            | AttributeKey::MobEntry
            | AttributeKey::MobExit => Some(AttributeValue::State(State::Allow)),
            AttributeKey::Buyable => Some(AttributeValue::Boolean(false)),
            AttributeKey::Build
            | AttributeKey::Pvp
            | AttributeKey::HealDelay
            | AttributeKey::MaxPlayers
            | AttributeKey::GameMode
            | AttributeKey::EntryBypass => None,
        }
    }

    /// Check that `value` has the kind this key expects.
    pub fn check(self, value: &AttributeValue) -> Result<(), AttributeError> {
        let kind = self.kind();
        let ok = match (kind, value) {
            (AttributeKind::State, AttributeValue::State(_))
            | (AttributeKind::Boolean, AttributeValue::Boolean(_))
            | (AttributeKind::Integer, AttributeValue::Integer(_))
            | (AttributeKind::Domain, AttributeValue::Domain(_)) => true,
            (AttributeKind::Choice(choices), AttributeValue::Choice(choice)) => {
                if !choices.contains(&choice.as_str()) {
                    return Err(AttributeError::UnknownChoice {
                        key: self.name(),
                        value: choice.clone(),
                    });
                }
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(AttributeError::KindMismatch {
                key: self.name(),
                expected: kind.label(),
                found: value.kind_label(),
            })
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute '{key}' expects a {expected} value (got {found})")]
    KindMismatch {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{value}' is not a valid choice for attribute '{key}'")]
    UnknownChoice { key: &'static str, value: String },
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    State(State),
    Boolean(bool),
    Integer(i64),
    Choice(String),
    Domain(Domain),
}

impl AttributeValue {
    #[must_use]
    pub fn as_state(&self) -> Option<State> {
        match self {
            AttributeValue::State(state) => Some(*state),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            AttributeValue::State(_) => "state",
            AttributeValue::Boolean(_) => "boolean",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Choice(_) => "choice",
            AttributeValue::Domain(_) => "domain",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::State(State::Allow) => f.write_str("allow"),
            AttributeValue::State(State::Deny) => f.write_str("deny"),
            AttributeValue::Boolean(b) => write!(f, "{b}"),
            AttributeValue::Integer(n) => write!(f, "{n}"),
            AttributeValue::Choice(choice) => f.write_str(choice),
            AttributeValue::Domain(domain) => write!(f, "{domain}"),
        }
    }
}

/// Who a group-restricted value applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionGroup {
    /// Members and owners.
    #[default]
    Members,
    Owners,
}

/// Setting of one attribute on one region.
///
/// `group_value` applies to actors in `group` of that region; everyone else
/// sees `value`. Both absent means the attribute is unset on the region.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_value: Option<AttributeValue>,
    #[serde(default)]
    pub group: RegionGroup,
}

impl FlagSetting {
    #[must_use]
    pub fn unrestricted(value: AttributeValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn restricted(group: RegionGroup, value: AttributeValue) -> Self {
        Self {
            value: None,
            group_value: Some(value),
            group,
        }
    }

    /// Add an unrestricted fallback to a restricted setting.
    #[must_use]
    pub fn with_fallback(mut self, value: AttributeValue) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.value.is_none() && self.group_value.is_none()
    }

    /// Value seen by an actor, given whether they belong to `self.group`.
    #[must_use]
    pub fn value_for(&self, in_group: bool) -> Option<&AttributeValue> {
        if in_group {
            self.group_value.as_ref().or(self.value.as_ref())
        } else {
            self.value.as_ref()
        }
    }
}
