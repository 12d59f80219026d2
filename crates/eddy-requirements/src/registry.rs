//! The requirements registry and its read cursors.

use eddy_core::{Association, DataAdaptor};
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::RequirementsError;

/// One required array.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayRequirement {
    /// Where the array lives.
    pub association: Association,
    /// Array name.
    pub name: String,
}

/// Requirements for a single mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshRequirement {
    name: String,
    structure_only: bool,
    arrays: SmallVec<[ArrayRequirement; 4]>,
}

impl MeshRequirement {
    fn new(name: &str, structure_only: bool) -> Self {
        Self {
            name: name.to_string(),
            structure_only,
            arrays: SmallVec::new(),
        }
    }

    /// Mesh name.
    pub fn mesh_name(&self) -> &str {
        &self.name
    }

    /// Whether the mesh is needed without arrays.
    pub fn structure_only(&self) -> bool {
        self.structure_only
    }

    /// Required arrays in declaration order.
    pub fn arrays(&self) -> ArrayRequirementIter<'_> {
        ArrayRequirementIter {
            inner: self.arrays.iter(),
        }
    }

    /// Add an array. Duplicates are ignored.
    pub fn add_array(&mut self, association: Association, name: impl Into<String>) {
        let req = ArrayRequirement {
            association,
            name: name.into(),
        };
        if !self.arrays.contains(&req) {
            self.arrays.push(req);
        }
    }
}

/// Cursor over mesh requirements in registration order.
#[derive(Clone, Debug)]
pub struct MeshRequirementIter<'a> {
    inner: indexmap::map::Values<'a, String, MeshRequirement>,
}

impl<'a> Iterator for MeshRequirementIter<'a> {
    type Item = &'a MeshRequirement;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for MeshRequirementIter<'_> {}

/// Cursor over one mesh's array requirements in declaration order.
#[derive(Clone, Debug)]
pub struct ArrayRequirementIter<'a> {
    inner: std::slice::Iter<'a, ArrayRequirement>,
}

impl<'a> Iterator for ArrayRequirementIter<'a> {
    type Item = &'a ArrayRequirement;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ArrayRequirementIter<'_> {}

/// Mesh name → [`MeshRequirement`], in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataRequirements {
    meshes: IndexMap<String, MeshRequirement>,
}

impl DataRequirements {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no mesh is registered.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Number of registered meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Register a mesh, or update its structure-only flag if already
    /// registered.
    pub fn add_mesh(&mut self, mesh: &str, structure_only: bool) -> &mut MeshRequirement {
        let entry = self
            .meshes
            .entry(mesh.to_string())
            .or_insert_with(|| MeshRequirement::new(mesh, structure_only));
        entry.structure_only = structure_only;
        entry
    }

    /// Require `arrays` with the given association on `mesh`, registering
    /// the mesh (with arrays) if needed.
    pub fn add_requirement<I, S>(&mut self, mesh: &str, association: Association, arrays: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .meshes
            .entry(mesh.to_string())
            .or_insert_with(|| MeshRequirement::new(mesh, false));
        for name in arrays {
            entry.add_array(association, name);
        }
    }

    /// Populate an empty registry with everything `adaptor` serves:
    /// every mesh, with arrays, and every array of every association.
    ///
    /// Fails with [`RequirementsError::AlreadyPopulated`] if the registry
    /// is not empty. On an adaptor error the registry is left empty.
    pub fn initialize(&mut self, adaptor: &dyn DataAdaptor) -> Result<(), RequirementsError> {
        if !self.is_empty() {
            return Err(RequirementsError::AlreadyPopulated {
                meshes: self.meshes.len(),
            });
        }
        let mut meshes = IndexMap::new();
        for mesh in adaptor.mesh_names()? {
            let mut req = MeshRequirement::new(&mesh, false);
            for association in Association::ALL {
                for array in adaptor.array_names(&mesh, association)? {
                    req.add_array(association, array);
                }
            }
            meshes.insert(mesh, req);
        }
        self.meshes = meshes;
        Ok(())
    }

    /// Requirements for one mesh.
    pub fn mesh(&self, mesh: &str) -> Option<&MeshRequirement> {
        self.meshes.get(mesh)
    }

    /// Cursor over every mesh requirement.
    pub fn mesh_requirements(&self) -> MeshRequirementIter<'_> {
        MeshRequirementIter {
            inner: self.meshes.values(),
        }
    }

    /// Cursor over one mesh's array requirements, `None` if the mesh is
    /// not registered.
    pub fn array_requirements(&self, mesh: &str) -> Option<ArrayRequirementIter<'_>> {
        self.meshes.get(mesh).map(MeshRequirement::arrays)
    }

    /// Names of every required mesh.
    pub fn required_meshes(&self) -> impl Iterator<Item = &str> + '_ {
        self.meshes.keys().map(String::as_str)
    }

    /// Drop every requirement.
    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}
