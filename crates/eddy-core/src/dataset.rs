//! Leaf datasets: geometry plus point, cell, and field attributes.
//!
//! The concrete kind of a leaf is carried explicitly by its
//! [`Geometry`] variant and surfaced as a [`BlockKind`], so consumers
//! that need per-kind behavior (file extensions, writers) match on a
//! tag instead of inspecting types.

use std::fmt;

use crate::array::{Association, Attributes};

/// Concrete kind of a block, including the composite container kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Polygonal surface data.
    PolyData,
    /// Unstructured grid of arbitrary cells.
    UnstructuredGrid,
    /// Uniform rectilinear lattice.
    ImageData,
    /// Axis-aligned lattice with per-axis coordinates.
    RectilinearGrid,
    /// Curvilinear lattice with explicit points.
    StructuredGrid,
    /// Composite multi-block container.
    MultiBlock,
}

impl BlockKind {
    /// File extension (with leading dot) for this kind of block.
    pub fn extension(self) -> &'static str {
        match self {
            Self::PolyData => ".vtp",
            Self::UnstructuredGrid => ".vtu",
            Self::ImageData => ".vti",
            Self::RectilinearGrid => ".vtr",
            Self::StructuredGrid => ".vts",
            Self::MultiBlock => ".vtm",
        }
    }

    /// Class name used in diagnostics and file headers.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::PolyData => "PolyData",
            Self::UnstructuredGrid => "UnstructuredGrid",
            Self::ImageData => "ImageData",
            Self::RectilinearGrid => "RectilinearGrid",
            Self::StructuredGrid => "StructuredGrid",
            Self::MultiBlock => "MultiBlockDataSet",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Inclusive index-space bounds `[i0, i1, j0, j1, k0, k1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent(pub [i64; 6]);

impl Extent {
    /// Number of points along each axis.
    pub fn point_dims(&self) -> [usize; 3] {
        let e = &self.0;
        [
            (e[1] - e[0] + 1).max(0) as usize,
            (e[3] - e[2] + 1).max(0) as usize,
            (e[5] - e[4] + 1).max(0) as usize,
        ]
    }

    /// Total number of points.
    pub fn point_count(&self) -> usize {
        self.point_dims().iter().product()
    }

    /// Total number of cells. Degenerate (single-point) axes do not
    /// contribute a factor, so a 2D slab still has cells.
    pub fn cell_count(&self) -> usize {
        let dims = self.point_dims();
        if dims.iter().any(|&d| d == 0) {
            return 0;
        }
        let spanning: Vec<usize> = dims.iter().filter(|&&d| d > 1).map(|&d| d - 1).collect();
        if spanning.is_empty() {
            return 0;
        }
        spanning.iter().product()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.0;
        write!(f, "{} {} {} {} {} {}", e[0], e[1], e[2], e[3], e[4], e[5])
    }
}

/// Topology and coordinates of a leaf dataset.
///
/// Point coordinates are stored interleaved `x0 y0 z0 x1 ...`. Cell
/// `offsets` are cumulative end offsets into `connectivity`, one per cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Uniform lattice.
    Image {
        /// Index-space bounds.
        extent: Extent,
        /// Coordinates of index `(0, 0, 0)`.
        origin: [f64; 3],
        /// Distance between adjacent points per axis.
        spacing: [f64; 3],
    },
    /// Lattice with independent coordinates per axis.
    Rectilinear {
        /// Index-space bounds.
        extent: Extent,
        /// X coordinates, one per point along the first axis.
        x: Vec<f64>,
        /// Y coordinates.
        y: Vec<f64>,
        /// Z coordinates.
        z: Vec<f64>,
    },
    /// Curvilinear lattice.
    Structured {
        /// Index-space bounds.
        extent: Extent,
        /// Interleaved point coordinates.
        points: Vec<f64>,
    },
    /// Arbitrary cells.
    Unstructured {
        /// Interleaved point coordinates.
        points: Vec<f64>,
        /// Point ids of every cell, concatenated.
        connectivity: Vec<i64>,
        /// Cumulative end offset of each cell in `connectivity`.
        offsets: Vec<i64>,
        /// VTK cell type code per cell.
        cell_types: Vec<u8>,
    },
    /// Polygonal surface.
    Poly {
        /// Interleaved point coordinates.
        points: Vec<f64>,
        /// Point ids of every polygon, concatenated.
        connectivity: Vec<i64>,
        /// Cumulative end offset of each polygon in `connectivity`.
        offsets: Vec<i64>,
    },
}

impl Geometry {
    /// The block kind this geometry represents.
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Image { .. } => BlockKind::ImageData,
            Self::Rectilinear { .. } => BlockKind::RectilinearGrid,
            Self::Structured { .. } => BlockKind::StructuredGrid,
            Self::Unstructured { .. } => BlockKind::UnstructuredGrid,
            Self::Poly { .. } => BlockKind::PolyData,
        }
    }
}

/// A leaf dataset: geometry plus three attribute collections.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    geometry: Geometry,
    point_data: Attributes,
    cell_data: Attributes,
    field_data: Attributes,
}

impl Dataset {
    /// Create a dataset with no arrays.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            point_data: Attributes::new(),
            cell_data: Attributes::new(),
            field_data: Attributes::new(),
        }
    }

    /// Uniform lattice with the given extent, origin and spacing.
    pub fn image(extent: [i64; 6], origin: [f64; 3], spacing: [f64; 3]) -> Self {
        Self::new(Geometry::Image {
            extent: Extent(extent),
            origin,
            spacing,
        })
    }

    /// Kind tag of this leaf.
    pub fn kind(&self) -> BlockKind {
        self.geometry.kind()
    }

    /// Topology and coordinates.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Number of points.
    pub fn number_of_points(&self) -> usize {
        match &self.geometry {
            Geometry::Image { extent, .. }
            | Geometry::Rectilinear { extent, .. }
            | Geometry::Structured { extent, .. } => extent.point_count(),
            Geometry::Unstructured { points, .. } | Geometry::Poly { points, .. } => {
                points.len() / 3
            }
        }
    }

    /// Number of cells.
    pub fn number_of_cells(&self) -> usize {
        match &self.geometry {
            Geometry::Image { extent, .. }
            | Geometry::Rectilinear { extent, .. }
            | Geometry::Structured { extent, .. } => extent.cell_count(),
            Geometry::Unstructured { offsets, .. } | Geometry::Poly { offsets, .. } => {
                offsets.len()
            }
        }
    }

    /// Attributes for one association.
    pub fn attributes(&self, association: Association) -> &Attributes {
        match association {
            Association::Point => &self.point_data,
            Association::Cell => &self.cell_data,
            Association::Field => &self.field_data,
        }
    }

    /// Mutable attributes for one association.
    pub fn attributes_mut(&mut self, association: Association) -> &mut Attributes {
        match association {
            Association::Point => &mut self.point_data,
            Association::Cell => &mut self.cell_data,
            Association::Field => &mut self.field_data,
        }
    }

    /// Builder-style array insertion.
    pub fn with_array(mut self, association: Association, array: crate::DataArray) -> Self {
        self.attributes_mut(association).insert(array);
        self
    }

    /// A copy carrying the geometry but no arrays.
    pub fn structure(&self) -> Self {
        Self::new(self.geometry.clone())
    }
}
