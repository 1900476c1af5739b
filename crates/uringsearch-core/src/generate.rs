//! Test array file generation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SearchError};

/// Write `count` elements `0, step, 2 * step, ...` to `path`, replacing any
/// existing file. Values wrap on overflow, so very large steps produce an
/// unsorted file.
pub fn create_test_file(path: impl AsRef<Path>, count: u64, step: u64) -> Result<()> {
    let path = path.as_ref();
    if count == 0 {
        return Err(SearchError::InvalidConfig("element count cannot be 0".into()));
    }

    let file = File::create(path)
        .map_err(|source| SearchError::Open { path: path.to_path_buf(), source })?;
    let write_err = |source| SearchError::Write { path: path.to_path_buf(), source };
    let mut writer = BufWriter::new(file);
    for i in 0..count {
        writer.write_all(&i.wrapping_mul(step).to_ne_bytes()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;

    tracing::info!(path = %path.display(), count, step, "test file created");
    Ok(())
}
