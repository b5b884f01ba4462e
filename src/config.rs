//! TOML configuration for the reconciler.
//!
//! Provides two loading methods:
//! - `default_config()` - the defaults embedded in the binary
//! - `load_config(path)` - a user file; missing keys fall back to defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};
use crate::matcher::MatchPolicy;

/// Defaults embedded at compile time from `config/default.toml`.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub paths: PathsConfig,
    pub watch: WatchConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub game_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub templates_subdir: String,
    pub output_subdir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub policy: MatchPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            paths: PathsConfig::default(),
            watch: WatchConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            game_dir: None,
            reports_dir: None,
            templates_dir: None,
            output_dir: None,
            templates_subdir: "Campaign Fleets".to_string(),
            output_subdir: "In Theater".to_string(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { settle_ms: 1000 }
    }
}

impl WatchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<ReconcilerConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReconcileError::io(path, e))?;
    toml::from_str(&content)
        .map_err(|e| ReconcileError::Config(format!("{}: {}", path.display(), e)))
}

/// Load `path` if given, otherwise the embedded defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ReconcilerConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(default_config()),
    }
}

/// Get the default configuration embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_config() -> ReconcilerConfig {
    toml::from_str(DEFAULT_CONFIG).expect("embedded default.toml must be valid TOML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_code_defaults() {
        assert_eq!(default_config(), ReconcilerConfig::default());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconciler.toml");
        std::fs::write(
            &path,
            "[paths]\ngame_dir = \"/games/Nebulous\"\n\n[matching]\npolicy = \"smallest-superset\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.paths.game_dir, Some(PathBuf::from("/games/Nebulous")));
        assert_eq!(config.paths.output_subdir, "In Theater");
        assert_eq!(config.matching.policy, MatchPolicy::SmallestSuperset);
        assert_eq!(config.watch.settle_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[watch]\nsettle_ms = \"soon\"\n").unwrap();

        assert!(matches!(load_config(&path), Err(ReconcileError::Config(_))));
    }
}
