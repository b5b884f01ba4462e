use std::path::Path;

use tracing::debug;

use super::tree::XmlDocument;
use crate::error::{ReconcileError, Result};

/// Read and parse an XML document from disk.
///
/// Content that is empty or not UTF-8 is reported as malformed rather than
/// as an I/O problem; the game creates report files before it finishes
/// writing them.
pub fn read_document(path: &Path) -> Result<XmlDocument> {
    let bytes = std::fs::read(path).map_err(|e| ReconcileError::io(path, e))?;
    let origin = path.display().to_string();

    let content = String::from_utf8(bytes).map_err(|e| ReconcileError::malformed(&origin, e))?;
    if content.trim().is_empty() {
        return Err(ReconcileError::malformed(origin, "file is empty"));
    }

    let document = XmlDocument::parse(&content, &origin)?;
    debug!(
        "Read document {:?} with root <{}>",
        path,
        document.root().name()
    );
    Ok(document)
}
