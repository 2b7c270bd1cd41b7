//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod watermark;

use docsync_store::DataDir;
use std::path::Path;

/// Opens an existing data directory, taking its lock.
pub(crate) fn open_dir(path: &Path) -> Result<DataDir, Box<dyn std::error::Error>> {
    DataDir::open(path, false).map_err(|e| format!("cannot open {}: {e}", path.display()).into())
}
