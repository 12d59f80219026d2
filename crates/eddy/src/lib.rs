//! Eddy: in-situ analysis for parallel simulations.
//!
//! A simulation exposes its in-memory meshes through a
//! [`DataAdaptor`](types::DataAdaptor), once per time step. Analyses pull
//! exactly the meshes and arrays they need, compute on them in place, and
//! coordinate across ranks through a [`Communicator`](types::Communicator).
//! No intermediate files are written unless an analysis writes them.
//!
//! This is the facade crate re-exporting every sub-crate.
//!
//! # Quick start
//!
//! ```rust
//! use eddy::prelude::*;
//!
//! let block = Dataset::image([0, 4, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
//!     .with_array(Association::Cell, DataArray::from_f64("pressure", vec![0.0, 1.0, 2.0, 3.0]));
//! let steps = (0..3).map(|s| StepData::new(s, s as f64).with_mesh("fluid", block.clone()));
//!
//! let histogram = Histogram::new(
//!     SelfComm::shared(),
//!     HistogramConfig {
//!         bins: 2,
//!         mesh: "fluid".into(),
//!         association: Association::Cell,
//!         array: "pressure".into(),
//!     },
//! )
//! .unwrap();
//!
//! let mut session = Session::new(MemoryAdaptor::new(steps), vec![Box::new(histogram)]);
//! let report = session.run().unwrap();
//! assert_eq!(report.steps, 3);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `eddy-core` | Data model, traversal, adaptor traits, errors |
//! | [`comm`] | `eddy-comm` | In-process rank groups and the MPI backend |
//! | [`requirements`] | `eddy-requirements` | Data requirements registry |
//! | [`histogram`] | `eddy-histogram` | Distributed histogram |
//! | [`posthoc`] | `eddy-posthoc` | Multi-block file writer and index files |
//! | [`engine`] | `eddy-engine` | Session driver, configuration, logging |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Data model, traversal engine, adaptor traits and errors (`eddy-core`).
pub use eddy_core as types;

/// Communicator backends (`eddy-comm`).
///
/// [`comm::LocalGroup`] runs ranks as threads of one process. With the
/// `mpi` feature, `comm::MpiComm` wraps an MPI communicator.
pub use eddy_comm as comm;

/// Data requirements registry (`eddy-requirements`).
pub use eddy_requirements as requirements;

/// Distributed histogram (`eddy-histogram`).
pub use eddy_histogram as histogram;

/// Multi-block writer (`eddy-posthoc`).
pub use eddy_posthoc as posthoc;

/// Session driver, configuration and logging (`eddy-engine`).
pub use eddy_engine as engine;

/// Common imports for typical Eddy usage.
pub mod prelude {
    // Data model
    pub use eddy_core::{
        ArrayValues, Association, DataArray, DataObject, Dataset, GhostLayers, Geometry,
        MultiBlock,
    };

    // Traversal
    pub use eddy_core::{apply, apply_mut, apply_pair, Flow, Visit};

    // Adaptors and communication
    pub use eddy_core::{
        AnalysisAdaptor, Communicator, DataAdaptor, MemoryAdaptor, SelfComm, SharedComm,
        StepData, StreamingAdaptor,
    };

    // Errors
    pub use eddy_core::{AdaptorError, AnalysisError, CommError, TraversalError};

    // Requirements
    pub use eddy_requirements::DataRequirements;

    // Analyses
    pub use eddy_histogram::{Histogram, HistogramConfig, HistogramState};
    pub use eddy_posthoc::{IndexMode, PosthocWriter};

    // Engine
    pub use eddy_engine::{build_analyses, Session, SessionConfig, SessionReport};
}
