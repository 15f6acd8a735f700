pub mod analyze_ids;
pub mod config;
pub mod orphans;
pub mod plan;
pub mod record_applied;
pub mod window;

use anyhow::Result;
use caltrack_core::{MappingFile, SyncConfig};

/// Mapping file at the configured location.
pub fn mapping_file(config: &SyncConfig) -> Result<MappingFile> {
    let path = config.storage.mapping_path()?;
    Ok(MappingFile::new(path))
}
