//! Test utilities and fault injection for Eddy development.
//!
//! Provides [`FaultyAdaptor`], a [`DataAdaptor`] wrapper that injects
//! failures into selected calls, and the reusable [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use eddy_core::{
    AdaptorError, Association, DataAdaptor, DataObject, StreamingAdaptor,
};

/// A call [`FaultyAdaptor`] can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// `mesh()` returns an error.
    MeshFetch,
    /// `mesh()` returns `Ok(None)`: no local data.
    MeshAbsent,
    /// `add_array()` returns an error.
    AddArray,
    /// Ghost layer queries return an error.
    GhostQuery,
    /// `add_ghost_cells_array()` / `add_ghost_nodes_array()` return an error.
    AddGhostArray,
}

/// Wraps an adaptor and fails the calls named by its [`Fault`]s.
///
/// Also counts lifecycle calls so tests can check that a driver released
/// and closed the stream.
pub struct FaultyAdaptor<A> {
    inner: A,
    faults: Vec<Fault>,
    releases: usize,
    closes: usize,
}

impl<A> FaultyAdaptor<A> {
    /// Wrap `inner` with no faults.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            faults: Vec::new(),
            releases: 0,
            closes: 0,
        }
    }

    /// Add a fault.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Add `fault` only when `enabled`; convenient for per-rank injection.
    pub fn with_fault_if(self, enabled: bool, fault: Fault) -> Self {
        if enabled {
            self.with_fault(fault)
        } else {
            self
        }
    }

    /// Number of `release_data()` calls.
    pub fn releases(&self) -> usize {
        self.releases
    }

    /// Number of `close()` calls.
    pub fn closes(&self) -> usize {
        self.closes
    }

    /// The wrapped adaptor.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn injected(what: &str) -> AdaptorError {
        AdaptorError::Backend {
            reason: format!("injected {what} failure"),
        }
    }
}

impl<A: DataAdaptor> DataAdaptor for FaultyAdaptor<A> {
    fn number_of_meshes(&self) -> Result<usize, AdaptorError> {
        self.inner.number_of_meshes()
    }

    fn mesh_name(&self, index: usize) -> Result<String, AdaptorError> {
        self.inner.mesh_name(index)
    }

    fn mesh(
        &mut self,
        name: &str,
        structure_only: bool,
    ) -> Result<Option<DataObject>, AdaptorError> {
        if self.has(Fault::MeshFetch) {
            return Err(Self::injected("mesh fetch"));
        }
        if self.has(Fault::MeshAbsent) {
            return Ok(None);
        }
        self.inner.mesh(name, structure_only)
    }

    fn ghost_cell_layers(&self, mesh: &str) -> Result<u32, AdaptorError> {
        if self.has(Fault::GhostQuery) {
            return Err(AdaptorError::GhostMetadata {
                mesh: mesh.to_string(),
                reason: "injected ghost query failure".to_string(),
            });
        }
        self.inner.ghost_cell_layers(mesh)
    }

    fn ghost_node_layers(&self, mesh: &str) -> Result<u32, AdaptorError> {
        if self.has(Fault::GhostQuery) {
            return Err(AdaptorError::GhostMetadata {
                mesh: mesh.to_string(),
                reason: "injected ghost query failure".to_string(),
            });
        }
        self.inner.ghost_node_layers(mesh)
    }

    fn number_of_arrays(
        &self,
        mesh: &str,
        association: Association,
    ) -> Result<usize, AdaptorError> {
        self.inner.number_of_arrays(mesh, association)
    }

    fn array_name(
        &self,
        mesh: &str,
        association: Association,
        index: usize,
    ) -> Result<String, AdaptorError> {
        self.inner.array_name(mesh, association, index)
    }

    fn add_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
        association: Association,
        array: &str,
    ) -> Result<(), AdaptorError> {
        if self.has(Fault::AddArray) {
            return Err(Self::injected("add array"));
        }
        self.inner.add_array(target, mesh, association, array)
    }

    fn add_ghost_cells_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
    ) -> Result<(), AdaptorError> {
        if self.has(Fault::AddGhostArray) {
            return Err(Self::injected("add ghost cells"));
        }
        self.inner.add_ghost_cells_array(target, mesh)
    }

    fn add_ghost_nodes_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
    ) -> Result<(), AdaptorError> {
        if self.has(Fault::AddGhostArray) {
            return Err(Self::injected("add ghost nodes"));
        }
        self.inner.add_ghost_nodes_array(target, mesh)
    }

    fn data_time(&self) -> f64 {
        self.inner.data_time()
    }

    fn data_time_step(&self) -> i64 {
        self.inner.data_time_step()
    }

    fn release_data(&mut self) -> Result<(), AdaptorError> {
        self.releases += 1;
        self.inner.release_data()
    }
}

impl<A: StreamingAdaptor> StreamingAdaptor for FaultyAdaptor<A> {
    fn open(&mut self) -> Result<(), AdaptorError> {
        self.inner.open()
    }

    fn advance(&mut self) -> Result<bool, AdaptorError> {
        self.inner.advance()
    }

    fn close(&mut self) -> Result<(), AdaptorError> {
        self.closes += 1;
        self.inner.close()
    }
}
