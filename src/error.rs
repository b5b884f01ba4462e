use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Malformed document {origin}: {reason}")]
    MalformedDocument { origin: String, reason: String },

    #[error("Schema violation in {context}: missing or invalid `{field}`")]
    SchemaViolation { context: String, field: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize {origin}: {reason}")]
    Serialize { origin: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Nebulous game directory not found. Set paths.game_dir in the config")]
    GameDirNotFound,

    #[error("Watcher error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    /// Wrap an I/O failure on `path`, surfacing permission problems as their own kind.
    pub fn io(path: &Path, source: io::Error) -> Self {
        let path = path.display().to_string();
        if source.kind() == io::ErrorKind::PermissionDenied {
            ReconcileError::PermissionDenied { path }
        } else {
            ReconcileError::Io { path, source }
        }
    }

    /// True for an I/O failure caused by the target path already existing.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ReconcileError::Io { source, .. } if source.kind() == io::ErrorKind::AlreadyExists)
    }

    pub fn malformed(origin: impl Into<String>, reason: impl ToString) -> Self {
        ReconcileError::MalformedDocument {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(context: impl Into<String>, field: impl Into<String>) -> Self {
        ReconcileError::SchemaViolation {
            context: context.into(),
            field: field.into(),
        }
    }
}
