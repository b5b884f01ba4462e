use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Result};

pub const REPORT_EXTENSION: &str = "xml";

/// A battle report that appeared in the watched directory.
#[derive(Debug, Clone, Serialize)]
pub struct ReportArrived {
    pub path: PathBuf,
    pub received_at: DateTime<Utc>,
}

/// Watches the reports directory and forwards new `.xml` files over a channel.
///
/// Dropping the watcher stops it, which in turn closes the channel once
/// the last event has been sent.
pub struct ReportWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl ReportWatcher {
    /// Start watching `dir` (non-recursive).
    ///
    /// Each created report is forwarded after `settle` has passed, giving the
    /// game time to finish writing it.
    pub fn start(dir: &Path, settle: Duration, sender: Sender<ReportArrived>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ReconcileError::Watch(format!(
                "Directory does not exist: {}",
                dir.display()
            )));
        }

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in created_reports(&event) {
                    info!("Battle report detected: {:?}", path);
                    std::thread::sleep(settle);
                    let arrived = ReportArrived {
                        path,
                        received_at: Utc::now(),
                    };
                    if sender.send(arrived).is_err() {
                        debug!("Report receiver gone, dropping event");
                    }
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        })
        .map_err(|e| ReconcileError::Watch(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| ReconcileError::Watch(format!("Failed to watch {}: {}", dir.display(), e)))?;

        info!("Watching for battle reports in {:?}", dir);
        Ok(Self {
            _watcher: watcher,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_report(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(REPORT_EXTENSION))
        .unwrap_or(false)
}

/// Report files created by `event`. Modifications, renames and removals are ignored.
fn created_reports(event: &Event) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| is_report(p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn test_only_created_xml_files_forwarded() {
        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/reports/Skirmish 1.xml"))
            .add_path(PathBuf::from("/reports/Skirmish 1.XML"))
            .add_path(PathBuf::from("/reports/notes.txt"));
        assert_eq!(
            created_reports(&created),
            vec![
                PathBuf::from("/reports/Skirmish 1.xml"),
                PathBuf::from("/reports/Skirmish 1.XML")
            ]
        );

        let modified = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/reports/Skirmish 1.xml"));
        assert!(created_reports(&modified).is_empty());
    }

    #[test]
    fn test_start_on_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = std::sync::mpsc::channel();
        let err = ReportWatcher::start(&dir.path().join("missing"), Duration::ZERO, tx);
        assert!(matches!(err, Err(ReconcileError::Watch(_))));
    }
}
