//! Data requirements registry for Eddy analyses.
//!
//! An analysis declares which meshes it needs, whether it needs them
//! with or without arrays, and which arrays of which association. The
//! registry preserves insertion order, so meshes and arrays are always
//! visited in the order they were declared (or discovered, for a
//! registry auto-populated from an adaptor).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod registry;

pub use config::RequirementConfig;
pub use error::RequirementsError;
pub use registry::{
    ArrayRequirement, ArrayRequirementIter, DataRequirements, MeshRequirement, MeshRequirementIter,
};
