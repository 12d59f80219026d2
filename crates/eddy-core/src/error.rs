//! Error types for the Eddy in-situ framework.
//!
//! Organized by subsystem: data adaptor access, composite traversal,
//! collective communication, and analysis execution. [`AnalysisError`]
//! is the taxonomy surfaced by every [`AnalysisAdaptor`](crate::AnalysisAdaptor).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::array::Association;

/// Errors from a [`DataAdaptor`](crate::DataAdaptor).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AdaptorError {
    /// No mesh with the given name is served by the adaptor.
    #[error("no mesh named \"{name}\"")]
    NoSuchMesh {
        /// The requested mesh name.
        name: String,
    },
    /// A mesh index is past the end of the mesh list.
    #[error("mesh index {index} out of range ({count} meshes)")]
    MeshIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of meshes the adaptor serves.
        count: usize,
    },
    /// The named array is not present on any local block of the mesh.
    #[error("no {association} data array \"{array}\" on mesh \"{mesh}\"")]
    NoSuchArray {
        /// Mesh the array was requested from.
        mesh: String,
        /// Requested association.
        association: Association,
        /// Requested array name.
        array: String,
    },
    /// An array index is past the end of the array list.
    #[error("{association} array index {index} out of range on mesh \"{mesh}\"")]
    ArrayIndexOutOfRange {
        /// Mesh the array was requested from.
        mesh: String,
        /// Requested association.
        association: Association,
        /// The requested index.
        index: usize,
    },
    /// Ghost layer metadata could not be determined for the mesh.
    #[error("ghost layer metadata unavailable for mesh \"{mesh}\": {reason}")]
    GhostMetadata {
        /// Mesh name.
        mesh: String,
        /// Description of the failure.
        reason: String,
    },
    /// The current step's data was already released.
    #[error("data for the current step has been released")]
    Released,
    /// The stream has no (more) steps.
    #[error("end of stream")]
    EndOfStream,
    /// A backend specific failure.
    #[error("{reason}")]
    Backend {
        /// Description of the failure.
        reason: String,
    },
}

/// Errors from the composite traversal engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TraversalError {
    /// The visitor requested stop-with-error.
    #[error("visitor failed at flat index {flat_index}: {reason}")]
    VisitorFailed {
        /// Flat index of the leaf being visited.
        flat_index: usize,
        /// Reason reported by the visitor.
        reason: String,
    },
    /// A node is neither a leaf dataset nor a composite container.
    #[error("can't apply to {class_name} at flat index {flat_index}")]
    Unsupported {
        /// Flat index of the offending node.
        flat_index: usize,
        /// Type name of the offending node.
        class_name: String,
    },
    /// The two trees of a binary traversal differ in shape.
    #[error("trees differ in structure at flat index {flat_index}")]
    StructureMismatch {
        /// Flat index where the shapes diverge.
        flat_index: usize,
    },
}

/// Errors from a [`Communicator`](crate::Communicator).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommError {
    /// A peer left the group while this rank waited in a collective.
    #[error("rank {peer} disconnected during a collective")]
    PeerDisconnected {
        /// Rank of the peer that disappeared.
        peer: usize,
    },
    /// Ranks entered different collectives at the same point in the sequence.
    #[error("collective mismatch with rank {peer}: expected {expected}, got {found}")]
    Mismatch {
        /// Rank whose contribution did not match.
        peer: usize,
        /// Description of the collective this rank entered.
        expected: String,
        /// Description of the collective the peer entered.
        found: String,
    },
    /// The root of a broadcast is not a member of the group.
    #[error("broadcast root {root} out of range (size {size})")]
    InvalidRoot {
        /// The requested root.
        root: usize,
        /// Group size.
        size: usize,
    },
    /// A transport specific failure.
    #[error("{reason}")]
    Backend {
        /// Description of the failure.
        reason: String,
    },
}

/// Errors from analysis execution and finalization.
///
/// Variants follow the failure classes of the in-situ protocol:
/// configuration errors are fatal to the call, unavailable data is
/// normally downgraded to a warning before it reaches this type, ghost
/// metadata failures are fatal to the invocation on the affected rank,
/// and I/O failures carry the offending path.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid configuration, or a required mesh never produced output.
    #[error("configuration error: {reason}")]
    Configuration {
        /// Description of the misconfiguration.
        reason: String,
    },
    /// Data needed by the analysis is not available on this rank.
    #[error("data unavailable: {reason}")]
    DataUnavailable {
        /// Description of what is missing.
        reason: String,
    },
    /// Ghost layers are claimed present but could not be obtained.
    #[error("ghost metadata error on mesh \"{mesh}\": {source}")]
    GhostMetadata {
        /// Mesh name.
        mesh: String,
        /// Underlying adaptor failure.
        #[source]
        source: AdaptorError,
    },
    /// A file could not be created or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The data adaptor failed.
    #[error("adaptor: {0}")]
    Adaptor(#[from] AdaptorError),
    /// The traversal engine failed.
    #[error("traversal: {0}")]
    Traversal(#[from] TraversalError),
    /// A collective operation failed.
    #[error("communicator: {0}")]
    Comm(#[from] CommError),
}

impl AnalysisError {
    /// Shorthand for [`AnalysisError::Configuration`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`AnalysisError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptor_error_names_array_and_association() {
        let e = AdaptorError::NoSuchArray {
            mesh: "mesh".into(),
            association: Association::Cell,
            array: "pressure".into(),
        };
        assert_eq!(
            e.to_string(),
            "no cell data array \"pressure\" on mesh \"mesh\""
        );
    }

    #[test]
    fn io_error_reports_path() {
        let e = AnalysisError::io(
            "/out/mesh.pvd",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = e.to_string();
        assert!(msg.contains("/out/mesh.pvd"), "{msg}");
        assert!(msg.contains("denied"), "{msg}");
    }

    #[test]
    fn ghost_metadata_error_chains_source() {
        use std::error::Error;
        let e = AnalysisError::GhostMetadata {
            mesh: "m".into(),
            source: AdaptorError::Released,
        };
        assert!(e.source().is_some());
    }
}
