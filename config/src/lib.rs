//! Configuration for bulwark.
//!
//! ```toml
//! [regions]
//! enabled = true
//! max_region_count = 7
//! unlimited_groups = ["admins"]
//!
//! [regions.group_limits]
//! vip = 20
//!
//! [movement]
//! entity_move = true
//! session_idle_secs = 60
//!
//! [resolver]
//! max_concurrent_lookups = 4
//!
//! [worlds.nether]
//! use_regions = false
//! ```
//!
//! Every section is optional. Per-world tables override the global values
//! for that world only; see [`GuardConfig::world`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bulwark_types::GroupId;
use serde::Deserialize;
use thiserror::Error;

// Default value functions for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

const fn default_max_region_count() -> i64 {
    7
}

const fn default_session_idle_secs() -> u64 {
    60
}

const fn default_sweep_interval_secs() -> u64 {
    30
}

const fn default_max_concurrent_lookups() -> usize {
    4
}

const fn default_wait_notice_millis() -> u64 {
    500
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub regions: RegionsConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Per-world overrides keyed by world name.
    #[serde(default)]
    pub worlds: BTreeMap<String, WorldOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionsConfig {
    /// Master switch for region protection.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Regions a player may own; negative means unlimited.
    #[serde(default = "default_max_region_count")]
    pub max_region_count: i64,
    /// Per-group limits. The largest limit among the player's groups wins.
    #[serde(default)]
    pub group_limits: BTreeMap<String, i64>,
    #[serde(default)]
    pub unlimited_groups: Vec<String>,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_region_count: default_max_region_count(),
            group_limits: BTreeMap::new(),
            unlimited_groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    /// Apply entry/exit rules to mobs and vehicles.
    #[serde(default = "default_true")]
    pub entity_move: bool,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            entity_move: true,
            session_idle_secs: default_session_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl MovementConfig {
    #[must_use]
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Lookup-service round trips allowed in flight at once.
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
    /// Delay before telling the sender a resolution is still running.
    #[serde(default = "default_wait_notice_millis")]
    pub wait_notice_millis: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: default_max_concurrent_lookups(),
            wait_notice_millis: default_wait_notice_millis(),
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn wait_notice(&self) -> Duration {
        Duration::from_millis(self.wait_notice_millis)
    }
}

/// Values a `[worlds.<name>]` table may override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldOverrides {
    pub use_regions: Option<bool>,
    pub entity_move: Option<bool>,
    pub max_region_count: Option<i64>,
}

/// Effective settings of one world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSettings {
    pub use_regions: bool,
    pub entity_move: bool,
    /// `None` when unlimited.
    pub max_region_count: Option<usize>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        GuardConfig::default().world("")
    }
}

/// Negative limits mean unlimited.
fn limit(raw: i64) -> Option<usize> {
    usize::try_from(raw).ok()
}

impl GuardConfig {
    /// Load from the default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Global settings with `[worlds.<name>]` applied on top.
    #[must_use]
    pub fn world(&self, name: &str) -> WorldSettings {
        let overrides = self.worlds.get(name);
        let pick = |field: fn(&WorldOverrides) -> Option<bool>, global: bool| {
            overrides.and_then(field).unwrap_or(global)
        };
        let raw_limit = overrides
            .and_then(|o| o.max_region_count)
            .unwrap_or(self.regions.max_region_count);
        WorldSettings {
            use_regions: pick(|o| o.use_regions, self.regions.enabled),
            entity_move: pick(|o| o.entity_move, self.movement.entity_move),
            max_region_count: limit(raw_limit),
        }
    }

    /// Region limit for a player in `groups`, `None` when unlimited.
    ///
    /// Unlimited groups win outright; otherwise the largest matching group
    /// limit applies, falling back to the world limit.
    #[must_use]
    pub fn region_limit<'a>(
        &self,
        world: &str,
        groups: impl IntoIterator<Item = &'a GroupId>,
    ) -> Option<usize> {
        let mut best: Option<i64> = None;
        for group in groups {
            if self
                .regions
                .unlimited_groups
                .iter()
                .any(|unlimited| unlimited.eq_ignore_ascii_case(group.as_str()))
            {
                return None;
            }
            let group_limit = self
                .regions
                .group_limits
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(group.as_str()))
                .map(|(_, limit)| *limit);
            if let Some(group_limit) = group_limit {
                if group_limit < 0 {
                    return None;
                }
                best = Some(best.map_or(group_limit, |b| b.max(group_limit)));
            }
        }
        match best {
            Some(raw) => limit(raw),
            None => self.world(world).max_region_count,
        }
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bulwark").join("config.toml"))
}
