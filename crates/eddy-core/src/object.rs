//! Hierarchical data objects: leaves, composite containers, and
//! objects the traversal engine cannot descend into.

use crate::array::{ArrayValues, Association, Attributes, DataArray};
use crate::dataset::{BlockKind, Dataset};

/// Field-data array carrying `[ghost cell layers, ghost node layers]`.
pub const GHOST_LAYERS_ARRAY_NAME: &str = "senseiGhostLayers";

/// Number of ghost cell and ghost node layers on a mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GhostLayers {
    /// Layers of duplicated boundary cells.
    pub cells: u32,
    /// Layers of duplicated boundary nodes.
    pub nodes: u32,
}

/// A node in a hierarchical dataset.
#[derive(Clone, Debug, PartialEq)]
pub enum DataObject {
    /// A concrete, array-bearing dataset.
    Leaf(Dataset),
    /// An ordered, possibly sparse collection of children.
    Composite(MultiBlock),
    /// A data object that is neither a dataset nor a composite
    /// (a table, a graph). Traversal rejects it.
    Other {
        /// Type name reported in diagnostics.
        class_name: String,
    },
}

impl DataObject {
    /// Kind of this node, or `None` for [`DataObject::Other`].
    pub fn kind(&self) -> Option<BlockKind> {
        match self {
            Self::Leaf(ds) => Some(ds.kind()),
            Self::Composite(_) => Some(BlockKind::MultiBlock),
            Self::Other { .. } => None,
        }
    }

    /// Type name for diagnostics.
    pub fn class_name(&self) -> &str {
        match self {
            Self::Leaf(ds) => ds.kind().class_name(),
            Self::Composite(_) => BlockKind::MultiBlock.class_name(),
            Self::Other { class_name } => class_name,
        }
    }

    /// Returns `true` for composite containers.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    /// Field data attached to this node, if it can carry any.
    pub fn field_data(&self) -> Option<&Attributes> {
        match self {
            Self::Leaf(ds) => Some(ds.attributes(Association::Field)),
            Self::Composite(mb) => Some(&mb.field_data),
            Self::Other { .. } => None,
        }
    }

    /// Mutable field data attached to this node.
    pub fn field_data_mut(&mut self) -> Option<&mut Attributes> {
        match self {
            Self::Leaf(ds) => Some(ds.attributes_mut(Association::Field)),
            Self::Composite(mb) => Some(&mut mb.field_data),
            Self::Other { .. } => None,
        }
    }

    /// Read ghost layer metadata stored in field data.
    pub fn ghost_layers(&self) -> Option<GhostLayers> {
        let array = self.field_data()?.get(GHOST_LAYERS_ARRAY_NAME)?;
        match array.values() {
            ArrayValues::I32(v) if v.len() >= 2 => Some(GhostLayers {
                cells: v[0].max(0) as u32,
                nodes: v[1].max(0) as u32,
            }),
            _ => None,
        }
    }

    /// Store ghost layer metadata in field data. Returns `false` if this
    /// node cannot carry field data.
    pub fn set_ghost_layers(&mut self, layers: GhostLayers) -> bool {
        let Some(fd) = self.field_data_mut() else {
            return false;
        };
        fd.insert(DataArray::new(
            GHOST_LAYERS_ARRAY_NAME,
            ArrayValues::I32(vec![layers.cells as i32, layers.nodes as i32]),
        ));
        true
    }

    /// A copy with the same tree shape and geometry but no arrays on
    /// the leaves. Field data on composite nodes is kept.
    pub fn structure(&self) -> Self {
        match self {
            Self::Leaf(ds) => Self::Leaf(ds.structure()),
            Self::Composite(mb) => Self::Composite(MultiBlock {
                blocks: mb
                    .blocks
                    .iter()
                    .map(|b| b.as_ref().map(DataObject::structure))
                    .collect(),
                field_data: mb.field_data.clone(),
            }),
            Self::Other { class_name } => Self::Other {
                class_name: class_name.clone(),
            },
        }
    }
}

impl From<Dataset> for DataObject {
    fn from(ds: Dataset) -> Self {
        Self::Leaf(ds)
    }
}

impl From<MultiBlock> for DataObject {
    fn from(mb: MultiBlock) -> Self {
        Self::Composite(mb)
    }
}

/// Composite container of ordered, optionally empty child slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiBlock {
    blocks: Vec<Option<DataObject>>,
    field_data: Attributes,
}

impl MultiBlock {
    /// Create a container with no slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container with `n` empty slots.
    pub fn with_slots(n: usize) -> Self {
        Self {
            blocks: (0..n).map(|_| None).collect(),
            field_data: Attributes::new(),
        }
    }

    /// Build from a list of slots.
    pub fn from_blocks(blocks: Vec<Option<DataObject>>) -> Self {
        Self {
            blocks,
            field_data: Attributes::new(),
        }
    }

    /// Number of slots, empty or not.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if there are no slots.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Child in slot `i`, `None` if empty or out of range.
    pub fn block(&self, i: usize) -> Option<&DataObject> {
        self.blocks.get(i).and_then(Option::as_ref)
    }

    /// Place `obj` in slot `i`, growing the slot list if needed.
    pub fn set_block(&mut self, i: usize, obj: impl Into<DataObject>) {
        if i >= self.blocks.len() {
            self.blocks.resize_with(i + 1, || None);
        }
        self.blocks[i] = Some(obj.into());
    }

    /// Append a child.
    pub fn push(&mut self, obj: impl Into<DataObject>) {
        self.blocks.push(Some(obj.into()));
    }

    /// All slots in order.
    pub fn slots(&self) -> &[Option<DataObject>] {
        &self.blocks
    }

    /// All slots in order, mutably.
    pub fn slots_mut(&mut self) -> &mut [Option<DataObject>] {
        &mut self.blocks
    }

    /// Field data attached to the container.
    pub fn field_data(&self) -> &Attributes {
        &self.field_data
    }
}
