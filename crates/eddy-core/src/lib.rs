//! Core types and traits for the Eddy in-situ analysis framework.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! hierarchical data model, the composite traversal engine, the adaptor
//! protocol between simulations and analyses, the communicator
//! abstraction, and the error taxonomy used throughout the workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adaptor;
pub mod array;
pub mod comm;
pub mod dataset;
pub mod error;
pub mod memory;
pub mod object;
pub mod traverse;

pub use adaptor::{AnalysisAdaptor, DataAdaptor, StreamingAdaptor};
pub use array::{
    ArrayValues, Association, Attributes, DataArray, ParseAssociationError, GHOST_ARRAY_NAME,
};
pub use comm::{Communicator, ReduceOp, SelfComm, SharedComm};
pub use dataset::{BlockKind, Dataset, Extent, Geometry};
pub use error::{AdaptorError, AnalysisError, CommError, TraversalError};
pub use memory::{MemoryAdaptor, StepData};
pub use object::{DataObject, GhostLayers, MultiBlock, GHOST_LAYERS_ARRAY_NAME};
pub use traverse::{apply, apply_mut, apply_pair, apply_slots, count_leaf_slots, Flow, Visit};
