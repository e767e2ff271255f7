//! Fold per-city indexes into the per-split index the training loader reads.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::Result;
use crate::record::{read_index, write_index, AnnotationIndex};

/// Name of the merged per-split index.
pub const MERGED_INDEX_NAME: &str = "via_region_data.json";

/// Load each file in order and fold its records into one index.
///
/// Keys are expected to be disjoint across cities. On a collision the
/// record from the later file wins and a warning is logged.
pub fn merge_indexes(paths: &[PathBuf]) -> Result<AnnotationIndex> {
    let mut merged = AnnotationIndex::new();
    for path in paths {
        let index = read_index(path)?;
        info!("Merging {} records from {}", index.len(), path.display());
        for (key, record) in index {
            if merged.insert(key.clone(), record).is_some() {
                warn!("{} appears in more than one index, keeping the one from {}", key, path.display());
            }
        }
    }
    Ok(merged)
}

/// Merge `paths` and write `<split_dir>/via_region_data.json`.
pub fn merge_split(paths: &[PathBuf], split_dir: &Path) -> Result<PathBuf> {
    let merged = merge_indexes(paths)?;
    let out = split_dir.join(MERGED_INDEX_NAME);
    write_index(&out, &merged)?;
    info!("Merged {} files into {} ({} records)", paths.len(), out.display(), merged.len());
    Ok(out)
}
