// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe file writes.
//!
//! Every persistence write in the crate goes through [`write_atomic`]: the
//! bytes land in a sibling temp file which is then renamed over the target,
//! never truncating in place.

use std::path::Path;

use crate::errors::Result;

/// Write `bytes` to `path` via a temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
