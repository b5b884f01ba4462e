//! One report in, at most one fleet out.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::document::read_document;
use crate::error::Result;
use crate::fleet::TemplateLibrary;
use crate::matcher::{select_template, MatchPolicy};
use crate::paths::GamePaths;
use crate::reconcile::reconcile;
use crate::report::parse_report;
use crate::synthesize::{synthesize, write};
use crate::watcher::ReportArrived;

/// What happened to a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// A reconciled fleet was written to `output`.
    Written {
        output: PathBuf,
        template: String,
        /// Template ships dropped because they were lost
        removed: Vec<String>,
    },
    /// No template contains every surviving ship; nothing was written.
    NoMatch { survivors: BTreeSet<String> },
}

/// Report processing against a template directory.
///
/// The template library is re-read for every report so fleets saved while
/// the watcher runs are picked up.
#[derive(Debug, Clone)]
pub struct Pipeline {
    templates_dir: PathBuf,
    output_dir: PathBuf,
    policy: MatchPolicy,
}

impl Pipeline {
    pub fn new(templates_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, policy: MatchPolicy) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            output_dir: output_dir.into(),
            policy,
        }
    }

    pub fn from_paths(paths: &GamePaths, policy: MatchPolicy) -> Self {
        Self::new(&paths.templates_dir, &paths.output_dir, policy)
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reconcile a single battle report.
    ///
    /// The report is parsed before any template is read, so a malformed
    /// report never touches the library or the output directory.
    pub fn process_report(&self, path: &Path) -> Result<ProcessOutcome> {
        info!("Processing battle report {:?}", path);
        let document = read_document(path)?;
        let report = parse_report(&document)?;
        for (name, tally) in &report.craft {
            debug!("Craft {}: {} of {} lost", name, tally.lost, tally.carried);
        }

        let survivors = report.survivors();
        if survivors.is_empty() {
            warn!("No ships survived in {:?}, nothing to reconcile", path);
            return Ok(ProcessOutcome::NoMatch { survivors });
        }
        info!("Surviving ships: {:?}", survivors);

        let library = TemplateLibrary::load_dir(&self.templates_dir)?;
        let Some(template) = select_template(&survivors, library.templates(), self.policy) else {
            warn!(
                "No template in {:?} contains all of {:?}",
                self.templates_dir, survivors
            );
            return Ok(ProcessOutcome::NoMatch { survivors });
        };
        info!("Matched template '{}'", template.name);

        let result = reconcile(template, &report);
        let fleet = synthesize(template, &result, &result.eliminated)?;
        let output = write(&fleet, &self.output_dir)?;

        let removed = template
            .ships
            .iter()
            .filter(|s| result.eliminated.contains(&s.name))
            .map(|s| s.name.clone())
            .collect();

        Ok(ProcessOutcome::Written {
            output,
            template: template.name.clone(),
            removed,
        })
    }

    /// Process reports from `events` one at a time until the sender hangs up.
    ///
    /// A failing report is logged and skipped; the next one is still processed.
    pub fn consume(&self, events: Receiver<ReportArrived>) {
        for event in events {
            match self.process_report(&event.path) {
                Ok(ProcessOutcome::Written { output, removed, .. }) => {
                    info!(
                        "Reconciled {:?} (received {}) into {:?}, {} ships removed",
                        event.path,
                        event.received_at.to_rfc3339(),
                        output,
                        removed.len()
                    );
                }
                Ok(ProcessOutcome::NoMatch { .. }) => {
                    warn!("No matching fleet for {:?}", event.path);
                }
                Err(e) => error!("Failed to process {:?}: {}", event.path, e),
            }
        }
        info!("Report channel closed, stopping");
    }
}
