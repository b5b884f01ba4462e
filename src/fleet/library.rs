use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::parse::parse_template;
use super::types::FleetTemplate;
use crate::document::read_document;
use crate::error::{ReconcileError, Result};

pub const FLEET_EXTENSION: &str = "fleet";

/// Read and normalize a single `.fleet` file.
pub fn read_template(path: &Path) -> Result<FleetTemplate> {
    let document = read_document(path)?;
    let template = parse_template(document)?.with_source(path);
    debug!(
        "Read fleet {:?} with {} ships from {:?}",
        template.name,
        template.ships.len(),
        path
    );
    Ok(template)
}

/// Ordered collection of candidate fleet templates.
///
/// Directory listings are sorted by file name so the matcher sees the same
/// order on every platform.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: Vec<FleetTemplate>,
}

impl TemplateLibrary {
    /// Load every `.fleet` file directly inside `dir`.
    ///
    /// A template that fails to parse is skipped with a warning; one broken
    /// file should not stop reconciliation against the rest of the library.
    /// Failing to list the directory itself is an error.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ReconcileError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "template directory does not exist"),
            ));
        }

        let mut templates = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                match e.into_io_error() {
                    Some(io) => ReconcileError::io(&path, io),
                    None => ReconcileError::Io {
                        path: path.display().to_string(),
                        source: std::io::Error::other("directory walk failed"),
                    },
                }
            })?;

            let path = entry.path();
            let is_fleet = entry.file_type().is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case(FLEET_EXTENSION))
                    .unwrap_or(false);
            if !is_fleet {
                continue;
            }

            match read_template(path) {
                Ok(template) => templates.push(template),
                Err(e) => warn!("Skipping fleet template {:?}: {}", path, e),
            }
        }

        info!("Loaded {} fleet templates from {:?}", templates.len(), dir);
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[FleetTemplate] {
        &self.templates
    }
}
