//! The incremental multi-block writer analysis.
//!
//! Every rank writes its own leaf blocks each step. Meshes that are not
//! composite are wrapped in a container with one slot per rank and the
//! local piece in this rank's slot, so block ids are globally unique.
//! The lead rank records one [`StepRecord`] per mesh per step and emits
//! the index files at finalize time. The writer issues no collectives.

use std::fs;
use std::path::{Path, PathBuf};

use eddy_core::{
    apply, apply_slots, count_leaf_slots, AdaptorError, AnalysisAdaptor, AnalysisError,
    Association, BlockKind, DataAdaptor, DataObject, MultiBlock, SharedComm, Visit,
};
use eddy_requirements::{DataRequirements, MeshRequirement, RequirementsError};

use crate::index::{write_index, IndexMode, IndexSource};
use crate::naming::block_file_name;
use crate::state::{OutputLedger, StepRecord};
use crate::vtk::{BlockWriter, WriteError, XmlBlockWriter};

impl From<WriteError> for AnalysisError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::Io { path, source } => AnalysisError::Io { path, source },
            other => AnalysisError::DataUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

/// Writes the required meshes of every step, one file per leaf block.
pub struct PosthocWriter {
    comm: SharedComm,
    output_dir: PathBuf,
    mode: IndexMode,
    requirements: DataRequirements,
    ledger: OutputLedger,
    block_writer: Box<dyn BlockWriter>,
}

impl PosthocWriter {
    /// Create a writer emitting into `output_dir`, with the collection
    /// index mode and no requirements (everything is written).
    pub fn new(comm: SharedComm, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            comm,
            output_dir: output_dir.into(),
            mode: IndexMode::default(),
            requirements: DataRequirements::new(),
            ledger: OutputLedger::new(),
            block_writer: Box::new(XmlBlockWriter),
        }
    }

    /// Replace the block file writer.
    pub fn with_block_writer(mut self, writer: Box<dyn BlockWriter>) -> Self {
        self.block_writer = writer;
        self
    }

    /// Select the index mode by name.
    pub fn set_mode(&mut self, mode: &str) -> Result<(), AnalysisError> {
        self.mode = mode.parse()?;
        Ok(())
    }

    /// Index mode.
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Replace the requirements.
    pub fn set_requirements(&mut self, requirements: DataRequirements) {
        self.requirements = requirements;
    }

    /// Require `arrays` of `association` on `mesh`.
    pub fn add_requirement<I, S>(&mut self, mesh: &str, association: Association, arrays: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements.add_requirement(mesh, association, arrays);
    }

    /// Current requirements.
    pub fn requirements(&self) -> &DataRequirements {
        &self.requirements
    }

    /// Per-mesh output bookkeeping.
    pub fn ledger(&self) -> &OutputLedger {
        &self.ledger
    }

    /// Fetch one required mesh with its ghost and required arrays.
    fn fetch(
        data: &mut dyn DataAdaptor,
        req: &MeshRequirement,
    ) -> Result<Option<DataObject>, AnalysisError> {
        let name = req.mesh_name();
        let Some(mut mesh) = data.mesh(name, req.structure_only())? else {
            tracing::debug!(mesh = name, "no local data");
            return Ok(None);
        };

        let ghost_err = |source: AdaptorError| AnalysisError::GhostMetadata {
            mesh: name.to_string(),
            source,
        };
        if data.ghost_cell_layers(name).map_err(ghost_err)? > 0 {
            data.add_ghost_cells_array(&mut mesh, name).map_err(ghost_err)?;
        }
        if data.ghost_node_layers(name).map_err(ghost_err)? > 0 {
            data.add_ghost_nodes_array(&mut mesh, name).map_err(ghost_err)?;
        }

        for array in req.arrays() {
            if let Err(e) = data.add_array(&mut mesh, name, array.association, &array.name) {
                tracing::warn!(
                    mesh = name,
                    error = %e,
                    "failed to add {} data array \"{}\"",
                    array.association,
                    array.name
                );
            }
        }
        Ok(Some(mesh))
    }

    /// Wrap a non-composite piece in a container with one slot per rank.
    fn normalize(&self, mesh: Option<DataObject>) -> DataObject {
        match mesh {
            Some(obj) if obj.is_composite() => obj,
            Some(obj) => {
                let mut mb = MultiBlock::with_slots(self.comm.size());
                mb.set_block(self.comm.rank(), obj);
                mb.into()
            }
            None => MultiBlock::with_slots(self.comm.size()).into(),
        }
    }

    /// Kind of the first non-empty leaf, if any.
    fn first_leaf_kind(tree: &DataObject) -> Result<Option<BlockKind>, AnalysisError> {
        let mut kind = None;
        apply(tree, |_, ds| {
            kind = Some(ds.kind());
            Visit::Stop
        })?;
        Ok(kind)
    }

    /// Write every non-empty leaf of `tree` under `file_id`, named by its
    /// leaf slot position. Returns the number of files written.
    fn write_blocks(
        &self,
        name: &str,
        tree: &DataObject,
        kind: BlockKind,
        file_id: u64,
    ) -> Result<usize, AnalysisError> {
        let extension = kind.extension();
        let mut written = 0;
        let mut failure = None;
        apply_slots(tree, |block, ds| {
            if ds.kind() != kind {
                tracing::warn!(
                    mesh = name,
                    block,
                    "{} block written with the {kind} extension {extension}",
                    ds.kind()
                );
            }
            let path = block_file_name(&self.output_dir, name, block, file_id, extension);
            match self.block_writer.write_block(&path, ds) {
                Ok(()) => {
                    written += 1;
                    Visit::Continue
                }
                Err(e) => {
                    let reason = e.to_string();
                    failure = Some(e);
                    Visit::Fail(reason)
                }
            }
        })
        .map_err(|e| match failure.take() {
            Some(w) => AnalysisError::from(w),
            None => AnalysisError::from(e),
        })?;
        Ok(written)
    }

    fn execute_mesh(
        &mut self,
        data: &mut dyn DataAdaptor,
        req: &MeshRequirement,
    ) -> Result<(), AnalysisError> {
        let name = req.mesh_name();
        let tree = self.normalize(Self::fetch(data, req)?);

        let first_kind = Self::first_leaf_kind(&tree)?;
        let state = self.ledger.observe(name);
        if let (None, Some(kind)) = (state.kind(), first_kind) {
            state.latch_kind(kind);
            tracing::debug!(mesh = name, extension = kind.extension(), "latched block kind");
        }
        let (kind, file_id) = (state.kind(), state.file_id());

        let block_count = count_leaf_slots(&tree);
        let written = match kind {
            Some(kind) => self.write_blocks(name, &tree, kind, file_id)?,
            None => 0,
        };
        tracing::debug!(mesh = name, file_id, block_count, written, "wrote blocks");

        let state = self.ledger.observe(name);
        state.advance();
        if self.comm.rank() == 0 {
            state.record(StepRecord {
                time: data.data_time(),
                time_step: data.data_time_step(),
                block_count,
            });
        }
        Ok(())
    }
}

impl AnalysisAdaptor for PosthocWriter {
    fn name(&self) -> &str {
        "posthoc"
    }

    fn execute(&mut self, data: &mut dyn DataAdaptor) -> Result<(), AnalysisError> {
        if self.requirements.is_empty() {
            self.requirements.initialize(&*data).map_err(|e| match e {
                RequirementsError::Adaptor(source) => AnalysisError::Adaptor(source),
                other => AnalysisError::configuration(other.to_string()),
            })?;
            tracing::warn!("no subset specified, writing all available data");
        }

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| AnalysisError::io(&self.output_dir, e))?;

        let meshes: Vec<MeshRequirement> = self.requirements.mesh_requirements().cloned().collect();
        for req in &meshes {
            self.execute_mesh(data, req)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), AnalysisError> {
        if self.comm.rank() != 0 {
            return Ok(());
        }
        for mesh in self.requirements.required_meshes() {
            let state = self
                .ledger
                .get(mesh)
                .filter(|s| !s.history().is_empty())
                .ok_or_else(|| {
                    AnalysisError::configuration(format!(
                        "no blocks have been written for a mesh named \"{mesh}\""
                    ))
                })?;
            let extension = state.extension().ok_or_else(|| {
                AnalysisError::configuration(format!(
                    "block kind of mesh \"{mesh}\" was never observed on the lead rank"
                ))
            })?;
            let path = write_index(
                self.mode,
                &IndexSource {
                    dir: &self.output_dir,
                    mesh,
                    extension,
                    history: state.history(),
                },
            )?;
            tracing::info!(
                mesh,
                steps = state.history().len(),
                path = %path.display(),
                "wrote {} index",
                self.mode
            );
        }
        Ok(())
    }
}
