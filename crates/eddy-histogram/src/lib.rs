//! Distributed histogram analysis for Eddy.
//!
//! [`Histogram`] computes a global histogram of one array across every
//! rank in two collectives, excluding ghost tuples. The local kernels in
//! [`kernel`] are public for benchmarking and reuse.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod histogram;
pub mod kernel;
pub mod state;

pub use histogram::{Histogram, HistogramConfig, Phase};
pub use state::HistogramState;
