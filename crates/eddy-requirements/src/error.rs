//! Errors from the requirements registry.

use eddy_core::AdaptorError;
use thiserror::Error;

/// Errors from [`DataRequirements`](crate::DataRequirements).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RequirementsError {
    /// [`initialize`](crate::DataRequirements::initialize) was called on a
    /// registry that already holds requirements.
    #[error("requirements already populated ({meshes} meshes)")]
    AlreadyPopulated {
        /// Number of meshes already registered.
        meshes: usize,
    },
    /// The adaptor failed while being queried for metadata.
    #[error("querying adaptor metadata: {0}")]
    Adaptor(#[from] AdaptorError),
}
