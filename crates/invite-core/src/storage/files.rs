//! File output helpers
//!
//! Export files are written atomically (write to temp file, then rename) so
//! a crash never leaves a half-written document where the user expects a
//! complete one.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::storage::error::{StoreError, StoreResult};

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    let write_err = |source| StoreError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    // Create temp file in the same directory (for atomic rename)
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path).map_err(write_err)?;
    file.write_all(data).map_err(write_err)?;

    // Sync to disk before rename
    file.sync_all().map_err(write_err)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    Ok(())
}
