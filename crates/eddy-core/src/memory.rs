//! In-memory streaming adaptor.
//!
//! [`MemoryAdaptor`] serves a queue of prepared [`StepData`] snapshots.
//! It backs the single-process driver and most tests: each rank builds
//! its own adaptor holding only its local pieces.

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::adaptor::{DataAdaptor, StreamingAdaptor};
use crate::array::{Association, GHOST_ARRAY_NAME};
use crate::error::AdaptorError;
use crate::object::{DataObject, GhostLayers, GHOST_LAYERS_ARRAY_NAME};
use crate::traverse::{apply, apply_pair, Visit};

#[derive(Clone, Debug)]
struct MeshEntry {
    object: Option<DataObject>,
    ghosts: GhostLayers,
}

/// One time step's worth of local meshes.
#[derive(Clone, Debug)]
pub struct StepData {
    time_step: i64,
    time: f64,
    meshes: IndexMap<String, MeshEntry>,
}

impl StepData {
    /// An empty step.
    pub fn new(time_step: i64, time: f64) -> Self {
        Self {
            time_step,
            time,
            meshes: IndexMap::new(),
        }
    }

    /// Add a mesh without ghost layers.
    pub fn with_mesh(self, name: impl Into<String>, object: impl Into<DataObject>) -> Self {
        self.with_ghost_mesh(name, object, GhostLayers::default())
    }

    /// Add a mesh with ghost layers. Ghost flags are expected as
    /// `vtkGhostType` arrays on the leaves.
    pub fn with_ghost_mesh(
        mut self,
        name: impl Into<String>,
        object: impl Into<DataObject>,
        ghosts: GhostLayers,
    ) -> Self {
        self.meshes.insert(
            name.into(),
            MeshEntry {
                object: Some(object.into()),
                ghosts,
            },
        );
        self
    }

    /// Declare a mesh for which this rank has no local data.
    pub fn with_absent_mesh(mut self, name: impl Into<String>) -> Self {
        self.meshes.insert(
            name.into(),
            MeshEntry {
                object: None,
                ghosts: GhostLayers::default(),
            },
        );
        self
    }

    /// Step index.
    pub fn time_step(&self) -> i64 {
        self.time_step
    }

    /// Simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    fn entry(&self, mesh: &str) -> Result<&MeshEntry, AdaptorError> {
        self.meshes.get(mesh).ok_or_else(|| AdaptorError::NoSuchMesh {
            name: mesh.to_string(),
        })
    }

    /// Distinct array names across every leaf, in first-seen order.
    fn array_names_of(
        &self,
        mesh: &str,
        association: Association,
    ) -> Result<Vec<String>, AdaptorError> {
        let entry = self.entry(mesh)?;
        let mut names: Vec<String> = Vec::new();
        if let Some(obj) = &entry.object {
            apply(obj, |_, ds| {
                for a in ds.attributes(association) {
                    let n = a.name();
                    if n != GHOST_ARRAY_NAME
                        && n != GHOST_LAYERS_ARRAY_NAME
                        && !names.iter().any(|x| x == n)
                    {
                        names.push(n.to_string());
                    }
                }
                Visit::Continue
            })
            .map_err(|e| AdaptorError::Backend {
                reason: e.to_string(),
            })?;
        }
        Ok(names)
    }
}

/// A [`StreamingAdaptor`] over a queue of in-memory snapshots.
#[derive(Clone, Debug, Default)]
pub struct MemoryAdaptor {
    pending: VecDeque<StepData>,
    current: Option<StepData>,
    released: bool,
}

impl MemoryAdaptor {
    /// A stream over `steps`. Call [`StreamingAdaptor::open`] to make the
    /// first one current.
    pub fn new(steps: impl IntoIterator<Item = StepData>) -> Self {
        Self {
            pending: steps.into_iter().collect(),
            current: None,
            released: false,
        }
    }

    /// An adaptor whose single step is already current.
    pub fn from_step(step: StepData) -> Self {
        Self {
            pending: VecDeque::new(),
            current: Some(step),
            released: false,
        }
    }

    /// Number of steps not yet reached.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn current(&self) -> Result<&StepData, AdaptorError> {
        if self.released {
            return Err(AdaptorError::Released);
        }
        self.current.as_ref().ok_or(AdaptorError::EndOfStream)
    }

    fn copy_array(
        &self,
        target: &mut DataObject,
        mesh: &str,
        association: Association,
        array: &str,
    ) -> Result<bool, AdaptorError> {
        let Some(source) = &self.current()?.entry(mesh)?.object else {
            return Ok(false);
        };
        let mut found = false;
        apply_pair(source, target, |_, src, dst| {
            if let Some(a) = src.attributes(association).get(array) {
                dst.attributes_mut(association).insert(a.clone());
                found = true;
            }
            Visit::Continue
        })
        .map_err(|e| AdaptorError::Backend {
            reason: e.to_string(),
        })?;
        Ok(found)
    }

    fn copy_ghosts(
        &self,
        target: &mut DataObject,
        mesh: &str,
        association: Association,
        layers: u32,
    ) -> Result<(), AdaptorError> {
        if layers == 0 {
            return Ok(());
        }
        if self.copy_array(target, mesh, association, GHOST_ARRAY_NAME)? {
            Ok(())
        } else {
            Err(AdaptorError::GhostMetadata {
                mesh: mesh.to_string(),
                reason: format!(
                    "{layers} {association} ghost layer(s) declared \
                         but no {GHOST_ARRAY_NAME} array present"
                ),
            })
        }
    }
}

impl DataAdaptor for MemoryAdaptor {
    fn number_of_meshes(&self) -> Result<usize, AdaptorError> {
        Ok(self.current()?.meshes.len())
    }

    fn mesh_name(&self, index: usize) -> Result<String, AdaptorError> {
        let step = self.current()?;
        step.meshes
            .get_index(index)
            .map(|(name, _)| name.clone())
            .ok_or(AdaptorError::MeshIndexOutOfRange {
                index,
                count: step.meshes.len(),
            })
    }

    /// Leaves always come back without arrays, whatever `structure_only`
    /// says: in-memory geometry is cheap to copy, and arrays are pulled
    /// one at a time with [`add_array`](DataAdaptor::add_array).
    fn mesh(
        &mut self,
        name: &str,
        _structure_only: bool,
    ) -> Result<Option<DataObject>, AdaptorError> {
        let entry = self.current()?.entry(name)?;
        let Some(object) = &entry.object else {
            return Ok(None);
        };
        let mut fetched = object.structure();
        if entry.ghosts != GhostLayers::default() {
            fetched.set_ghost_layers(entry.ghosts);
        }
        Ok(Some(fetched))
    }

    fn ghost_cell_layers(&self, mesh: &str) -> Result<u32, AdaptorError> {
        Ok(self.current()?.entry(mesh)?.ghosts.cells)
    }

    fn ghost_node_layers(&self, mesh: &str) -> Result<u32, AdaptorError> {
        Ok(self.current()?.entry(mesh)?.ghosts.nodes)
    }

    fn number_of_arrays(
        &self,
        mesh: &str,
        association: Association,
    ) -> Result<usize, AdaptorError> {
        Ok(self.current()?.array_names_of(mesh, association)?.len())
    }

    fn array_name(
        &self,
        mesh: &str,
        association: Association,
        index: usize,
    ) -> Result<String, AdaptorError> {
        let names = self.current()?.array_names_of(mesh, association)?;
        names
            .into_iter()
            .nth(index)
            .ok_or_else(|| AdaptorError::ArrayIndexOutOfRange {
                mesh: mesh.to_string(),
                association,
                index,
            })
    }

    fn add_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
        association: Association,
        array: &str,
    ) -> Result<(), AdaptorError> {
        if self.copy_array(target, mesh, association, array)? {
            Ok(())
        } else {
            Err(AdaptorError::NoSuchArray {
                mesh: mesh.to_string(),
                association,
                array: array.to_string(),
            })
        }
    }

    fn add_ghost_cells_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
    ) -> Result<(), AdaptorError> {
        let layers = self.ghost_cell_layers(mesh)?;
        self.copy_ghosts(target, mesh, Association::Cell, layers)
    }

    fn add_ghost_nodes_array(
        &mut self,
        target: &mut DataObject,
        mesh: &str,
    ) -> Result<(), AdaptorError> {
        let layers = self.ghost_node_layers(mesh)?;
        self.copy_ghosts(target, mesh, Association::Point, layers)
    }

    fn data_time(&self) -> f64 {
        self.current.as_ref().map_or(0.0, StepData::time)
    }

    fn data_time_step(&self) -> i64 {
        self.current.as_ref().map_or(0, StepData::time_step)
    }

    fn release_data(&mut self) -> Result<(), AdaptorError> {
        self.released = true;
        Ok(())
    }
}

impl StreamingAdaptor for MemoryAdaptor {
    fn open(&mut self) -> Result<(), AdaptorError> {
        if self.current.is_none() {
            self.current = Some(self.pending.pop_front().ok_or(AdaptorError::EndOfStream)?);
        }
        self.released = false;
        Ok(())
    }

    fn advance(&mut self) -> Result<bool, AdaptorError> {
        self.current = self.pending.pop_front();
        self.released = false;
        Ok(self.current.is_some())
    }

    fn close(&mut self) -> Result<(), AdaptorError> {
        self.pending.clear();
        self.current = None;
        Ok(())
    }
}
