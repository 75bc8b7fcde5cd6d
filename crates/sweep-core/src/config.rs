use anyhow::{Context, Result, ensure};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::MergePolicy;

/// Name of the per-project state directory.
pub const SWEEP_DIR: &str = ".sweep";

/// Config file name inside [`SWEEP_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Operation lock directory inside [`SWEEP_DIR`].
pub const LOCKS_DIR: &str = "locks";

/// Largest accepted `[cleanup].lookback_days` (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_merge_threshold_minutes")]
    pub merge_threshold_minutes: u32,
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            merge_threshold_minutes: default_merge_threshold_minutes(),
            merge_policy: MergePolicy::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl CleanupConfig {
    /// Reject values that cannot describe a usable window.
    ///
    /// # Errors
    ///
    /// Returns an error if `lookback_days` exceeds [`MAX_LOOKBACK_DAYS`].
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.lookback_days <= MAX_LOOKBACK_DAYS,
            "cleanup.lookback_days = {} exceeds the maximum of {MAX_LOOKBACK_DAYS}",
            self.lookback_days
        );
        Ok(())
    }

    #[must_use]
    pub fn lookback(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.lookback_days))
    }

    #[must_use]
    pub fn merge_threshold(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.merge_threshold_minutes))
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database path. Relative paths are resolved against the `.sweep/` dir.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn resolve(&self, sweep_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            sweep_dir.join(&self.path)
        }
    }
}

/// Load `.sweep/config.toml` under `project_root`, falling back to defaults
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(SWEEP_DIR).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .cleanup
        .validate()
        .with_context(|| format!("Invalid {}", path.display()))?;
    Ok(config)
}

/// Walk up from `start` to the nearest directory containing `.sweep/`.
#[must_use]
pub fn find_sweep_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(SWEEP_DIR).is_dir())
        .map(Path::to_path_buf)
}

const fn default_lookback_days() -> u32 {
    30
}

const fn default_merge_threshold_minutes() -> u32 {
    60
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("sweep.db")
}
