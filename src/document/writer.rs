use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use super::tree::XmlDocument;
use crate::error::{ReconcileError, Result};

/// Write a document to a path that must not exist yet.
///
/// The XML goes to a temporary file in the target's directory, which is then
/// renamed into place. The rename refuses to replace an existing file: a
/// lost race surfaces as an `Io` error of kind `AlreadyExists` (see
/// [`ReconcileError::is_already_exists`]) and the temporary file is removed.
pub fn write_document_new(document: &XmlDocument, target_path: &Path) -> Result<()> {
    let temp = stage(document, target_path)?;
    temp.persist_noclobber(target_path)
        .map_err(|e| ReconcileError::io(target_path, e.error))?;

    debug!("Persisted {:?}", target_path);
    Ok(())
}

fn stage(document: &XmlDocument, target_path: &Path) -> Result<NamedTempFile> {
    // Serialize first so a serialization failure touches nothing on disk.
    let xml = document.to_xml_string(&target_path.display().to_string())?;

    let parent = target_path.parent().ok_or_else(|| ReconcileError::Io {
        path: target_path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent directory"),
    })?;

    std::fs::create_dir_all(parent).map_err(|e| ReconcileError::io(parent, e))?;

    // Same directory as the target, so the rename stays on one filesystem.
    let mut temp = NamedTempFile::new_in(parent).map_err(|e| ReconcileError::io(parent, e))?;
    temp.write_all(xml.as_bytes())
        .map_err(|e| ReconcileError::io(temp.path(), e))?;
    temp.flush().map_err(|e| ReconcileError::io(temp.path(), e))?;
    Ok(temp)
}
