//! All-or-nothing replacement of the target document.

use std::path::Path;

use tracing::debug;

use contribmerge_shared::{ContribMergeError, Result};

/// Write `contents` to a sibling temp file, then rename it over `path`.
///
/// Readers see either the old file or the new one. The temp file is removed
/// when the rename fails.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ContribMergeError::validation(format!("not a file path: {}", path.display())))?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let temp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::now_v7()));

    std::fs::write(&temp, contents).map_err(|e| ContribMergeError::io(&temp, e))?;

    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(ContribMergeError::io(path, e));
    }

    debug!(path = %path.display(), bytes = contents.len(), "document written");
    Ok(())
}
