use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::PathsConfig;
use crate::error::{ReconcileError, Result};

/// Resolved Nebulous directories the reconciler reads from and writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct GamePaths {
    /// Skirmish reports appear here (e.g., .../Saves/SkirmishReports)
    pub reports_dir: PathBuf,
    /// Template library (e.g., .../Saves/Fleets/Campaign Fleets)
    pub templates_dir: PathBuf,
    /// Reconciled fleets are written here (e.g., .../Saves/Fleets/In Theater)
    pub output_dir: PathBuf,
}

impl GamePaths {
    /// Derive the standard layout under a Nebulous install directory.
    pub fn from_game_dir(game_dir: &Path, config: &PathsConfig) -> Self {
        let saves = game_dir.join("Saves");
        let fleets = saves.join("Fleets");
        Self {
            reports_dir: saves.join("SkirmishReports"),
            templates_dir: fleets.join(&config.templates_subdir),
            output_dir: fleets.join(&config.output_subdir),
        }
    }

    /// Resolve paths from config, detecting the install directory when
    /// `game_dir` is unset. Explicit directory overrides always win.
    pub fn resolve(config: &PathsConfig) -> Result<Self> {
        let fully_overridden = config.reports_dir.is_some()
            && config.templates_dir.is_some()
            && config.output_dir.is_some();

        let base = if fully_overridden {
            None
        } else {
            let game_dir = match &config.game_dir {
                Some(dir) => dir.clone(),
                None => Self::find_game_dir()?,
            };
            Some(Self::from_game_dir(&game_dir, config))
        };

        let pick = |explicit: &Option<PathBuf>, derived: Option<&PathBuf>| -> Result<PathBuf> {
            explicit
                .clone()
                .or_else(|| derived.cloned())
                .ok_or(ReconcileError::GameDirNotFound)
        };

        Ok(Self {
            reports_dir: pick(&config.reports_dir, base.as_ref().map(|b| &b.reports_dir))?,
            templates_dir: pick(&config.templates_dir, base.as_ref().map(|b| &b.templates_dir))?,
            output_dir: pick(&config.output_dir, base.as_ref().map(|b| &b.output_dir))?,
        })
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> Result<()> {
        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir)
                .map_err(|e| ReconcileError::io(&self.output_dir, e))?;
            info!("Created output directory {:?}", self.output_dir);
        }
        Ok(())
    }

    /// Find the Nebulous install directory among the usual Steam and standalone locations.
    fn find_game_dir() -> Result<PathBuf> {
        for candidate in Self::candidate_dirs() {
            if candidate.is_dir() {
                debug!("Found Nebulous at {:?}", candidate);
                return Ok(candidate);
            }
        }
        Err(ReconcileError::GameDirNotFound)
    }

    fn candidate_dirs() -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = [
            r"C:\Program Files (x86)\Steam\steamapps\common\Nebulous",
            r"C:\Program Files\Steam\steamapps\common\Nebulous",
            r"C:\Program Files (x86)\Nebulous",
            r"C:\Program Files\Nebulous",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        // Steam libraries on Linux (native and Flatpak) and macOS
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".steam/steam/steamapps/common/Nebulous"));
            candidates.push(home.join(".local/share/Steam/steamapps/common/Nebulous"));
            candidates.push(
                home.join(".var/app/com.valvesoftware.Steam/data/Steam/steamapps/common/Nebulous"),
            );
        }
        if let Some(data_dir) = dirs::data_dir() {
            candidates.push(data_dir.join("Steam/steamapps/common/Nebulous"));
        }

        candidates
    }
}
