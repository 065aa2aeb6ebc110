//! Filesystem helpers shared across modules.
//!
//! Errors carry the operation and the path so startup failures read well.

use std::path::Path;

use crate::{Error, Result};

/// Whether `path` exists and is a directory.
pub fn dir_exists(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Ensure a per-user private directory exists.
///
/// Missing directories are created recursively; on Unix the leaf is created
/// with mode `0700`. An existing directory is left as is.
pub fn ensure_private_dir(op: &'static str, path: &Path) -> Result<()> {
    if dir_exists(path) {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(path)
        .map_err(|e| Error::io_path(op, path, e))?;

    if !dir_exists(path) {
        return Err(Error::config(format!(
            "could not create directory {}",
            path.display()
        )));
    }
    Ok(())
}
