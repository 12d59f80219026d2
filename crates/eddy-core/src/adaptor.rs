//! The pull-based adaptor protocol between a simulation and its analyses.
//!
//! A simulation exposes its state through a [`DataAdaptor`]; analyses
//! implement [`AnalysisAdaptor`] and pull exactly the meshes and arrays
//! they need. A [`StreamingAdaptor`] additionally drives the time-step
//! sequence.

use crate::array::Association;
use crate::error::{AdaptorError, AnalysisError};
use crate::object::DataObject;

/// Pull-based provider of mesh, array and ghost data for one time step.
///
/// Meshes are fetched by name, optionally structure-only, and arrays
/// are then added to the fetched tree on demand. The adaptor owns the
/// underlying simulation memory until [`release_data`](Self::release_data)
/// is called.
pub trait DataAdaptor {
    /// Number of meshes served.
    fn number_of_meshes(&self) -> Result<usize, AdaptorError>;

    /// Name of the mesh at `index`.
    fn mesh_name(&self, index: usize) -> Result<String, AdaptorError>;

    /// Fetch a mesh.
    ///
    /// Returns `Ok(None)` when the mesh exists but this rank holds no
    /// data for it this step. With `structure_only`, leaves carry
    /// geometry but no arrays.
    fn mesh(&mut self, name: &str, structure_only: bool)
        -> Result<Option<DataObject>, AdaptorError>;

    /// Number of ghost cell layers on `mesh`.
    fn ghost_cell_layers(&self, mesh: &str) -> Result<u32, AdaptorError>;

    /// Number of ghost node layers on `mesh`.
    fn ghost_node_layers(&self, mesh: &str) -> Result<u32, AdaptorError>;

    /// Number of arrays with the given association on `mesh`.
    fn number_of_arrays(&self, mesh: &str, association: Association)
        -> Result<usize, AdaptorError>;

    /// Name of array `index` with the given association on `mesh`.
    fn array_name(
        &self,
        mesh: &str,
        association: Association,
        index: usize,
    ) -> Result<String, AdaptorError>;

    /// Add the named array to every leaf of `target` that has it.
    ///
    /// `target` must have been fetched from this adaptor for `mesh`.
    fn add_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
        association: Association,
        array: &str,
    ) -> Result<(), AdaptorError>;

    /// Add the cell ghost flag array to `target`.
    fn add_ghost_cells_array(&mut self, target: &mut DataObject, mesh: &str)
        -> Result<(), AdaptorError>;

    /// Add the node ghost flag array to `target`.
    fn add_ghost_nodes_array(&mut self, target: &mut DataObject, mesh: &str)
        -> Result<(), AdaptorError>;

    /// Simulation time of the current step.
    fn data_time(&self) -> f64;

    /// Index of the current step.
    fn data_time_step(&self) -> i64;

    /// Release the current step's data. Further access fails with
    /// [`AdaptorError::Released`] until the stream advances.
    fn release_data(&mut self) -> Result<(), AdaptorError>;

    /// Every mesh name, in adaptor order.
    fn mesh_names(&self) -> Result<Vec<String>, AdaptorError> {
        (0..self.number_of_meshes()?)
            .map(|i| self.mesh_name(i))
            .collect()
    }

    /// Every array name with the given association, in adaptor order.
    fn array_names(
        &self,
        mesh: &str,
        association: Association,
    ) -> Result<Vec<String>, AdaptorError> {
        (0..self.number_of_arrays(mesh, association)?)
            .map(|i| self.array_name(mesh, association, i))
            .collect()
    }
}

/// A [`DataAdaptor`] that steps through a sequence of snapshots.
pub trait StreamingAdaptor: DataAdaptor {
    /// Open the stream and make the first step current.
    fn open(&mut self) -> Result<(), AdaptorError>;

    /// Move to the next step. Returns `false` when the stream is exhausted.
    fn advance(&mut self) -> Result<bool, AdaptorError>;

    /// Close the stream.
    fn close(&mut self) -> Result<(), AdaptorError>;
}

/// An in-situ analysis invoked once per step.
pub trait AnalysisAdaptor {
    /// Human-readable name for diagnostics and metrics.
    fn name(&self) -> &str;

    /// Run the analysis against the current step.
    ///
    /// Analyses that issue collectives must issue them on every call,
    /// including calls that fail locally.
    fn execute(&mut self, data: &mut dyn DataAdaptor) -> Result<(), AnalysisError>;

    /// Called once after the last step.
    fn finalize(&mut self) -> Result<(), AnalysisError>;
}
