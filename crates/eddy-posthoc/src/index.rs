//! Index files referencing every block of every recorded step.
//!
//! Two layouts are supported: an XML collection (`{mesh}.pvd`) with one
//! entry per (step, block) pair, and a line-oriented legacy file
//! (`{mesh}.visit`) with a block count, one time per step, and one file
//! name per (step, block) pair.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use eddy_core::AnalysisError;

use crate::naming::{block_file_name, block_file_stem};
use crate::state::StepRecord;

/// Index file layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexMode {
    /// XML collection, one `DataSet` entry per (step, block).
    #[default]
    Collection,
    /// Line-oriented legacy index.
    ///
    /// The block count is taken from the first recorded step and assumed
    /// for every later step.
    Legacy,
}

impl IndexMode {
    /// Index file extension (with leading dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Collection => ".pvd",
            Self::Legacy => ".visit",
        }
    }

    /// Path of the index of `mesh` inside `dir`.
    pub fn index_path(self, dir: &Path, mesh: &str) -> PathBuf {
        dir.join(format!("{mesh}{}", self.extension()))
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collection => "collection",
            Self::Legacy => "legacy",
        })
    }
}

impl FromStr for IndexMode {
    type Err = AnalysisError;

    /// Case-insensitive: `paraview`, `pvd` and `collection` select
    /// [`IndexMode::Collection`]; `visit` and `legacy` select
    /// [`IndexMode::Legacy`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paraview" | "pvd" | "collection" => Ok(Self::Collection),
            "visit" | "legacy" => Ok(Self::Legacy),
            _ => Err(AnalysisError::configuration(format!("invalid index mode \"{s}\""))),
        }
    }
}

/// Everything needed to regenerate the index of one mesh.
#[derive(Clone, Copy, Debug)]
pub struct IndexSource<'a> {
    /// Output directory the blocks were written to.
    pub dir: &'a Path,
    /// Mesh name.
    pub mesh: &'a str,
    /// Block file extension.
    pub extension: &'a str,
    /// Recorded steps, oldest first.
    pub history: &'a [StepRecord],
}

/// Encode the XML collection index.
pub fn encode_collection<W: Write>(src: &IndexSource<'_>, out: &mut W) -> io::Result<()> {
    writeln!(out, "<?xml version=\"1.0\"?>")?;
    writeln!(
        out,
        "<VTKFile type=\"Collection\" version=\"0.1\" byte_order=\"LittleEndian\" compressor=\"\">"
    )?;
    writeln!(out, "<Collection>")?;
    for (file_id, step) in src.history.iter().enumerate() {
        for block in 0..step.block_count {
            let file = block_file_name(src.dir, src.mesh, block, file_id as u64, src.extension);
            writeln!(
                out,
                "<DataSet timestep=\"{}\" group=\"\" part=\"{block}\" file=\"{}\"/>",
                step.time,
                file.display()
            )?;
        }
    }
    writeln!(out, "</Collection>")?;
    writeln!(out, "</VTKFile>")
}

/// Encode the legacy index.
pub fn encode_legacy<W: Write>(src: &IndexSource<'_>, out: &mut W) -> io::Result<()> {
    let blocks = src.history.first().map_or(0, |s| s.block_count);
    if src.history.iter().any(|s| s.block_count != blocks) {
        tracing::warn!(
            mesh = src.mesh,
            blocks,
            "block count changed during the session; legacy index lists {blocks} blocks per step"
        );
    }
    writeln!(out, "!NBLOCKS {blocks}")?;
    for step in src.history {
        writeln!(out, "!TIME {}", step.time)?;
    }
    for file_id in 0..src.history.len() {
        for block in 0..blocks {
            writeln!(
                out,
                "{}",
                block_file_stem(src.mesh, block, file_id as u64, src.extension)
            )?;
        }
    }
    Ok(())
}

/// Write the index of one mesh in `mode`. Returns the index path.
pub fn write_index(mode: IndexMode, src: &IndexSource<'_>) -> Result<PathBuf, AnalysisError> {
    let path = mode.index_path(src.dir, src.mesh);
    let file = File::create(&path).map_err(|e| AnalysisError::io(&path, e))?;
    let mut out = BufWriter::new(file);
    match mode {
        IndexMode::Collection => encode_collection(src, &mut out),
        IndexMode::Legacy => encode_legacy(src, &mut out),
    }
    .and_then(|()| out.flush())
    .map_err(|e| AnalysisError::io(&path, e))?;
    Ok(path)
}
