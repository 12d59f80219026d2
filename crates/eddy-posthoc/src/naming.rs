//! Deterministic block file names.
//!
//! Names are never stored: the index emitters recompute every name with
//! the same rule used when the block was written. A block id is the
//! leaf's slot position as numbered by [`eddy_core::apply_slots`], so every
//! id written in a step falls in `0..block_count` for that step.

use std::path::{Path, PathBuf};

/// File name (no directory) of one block of one step:
/// `{mesh}_{block:06}_{file:06}{ext}`.
pub fn block_file_stem(mesh: &str, block_id: usize, file_id: u64, extension: &str) -> String {
    format!("{mesh}_{block_id:06}_{file_id:06}{extension}")
}

/// Full path of one block of one step inside `dir`.
pub fn block_file_name(
    dir: &Path,
    mesh: &str,
    block_id: usize,
    file_id: u64,
    extension: &str,
) -> PathBuf {
    dir.join(block_file_stem(mesh, block_id, file_id, extension))
}
