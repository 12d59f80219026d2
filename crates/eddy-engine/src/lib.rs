//! Streaming session driver for Eddy.
//!
//! A [`Session`] pulls steps from a [`StreamingAdaptor`](eddy_core::StreamingAdaptor)
//! and runs a list of analyses against each one. Analyses are usually
//! built from a TOML [`SessionConfig`] with [`build_analyses`]; the
//! [`logging`] module installs the `tracing` subscriber.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod factory;
pub mod logging;
pub mod metrics;
pub mod session;

pub use config::{AnalysisConfig, ConfigError, HistogramSection, PosthocSection, SessionConfig};
pub use factory::build_analyses;
pub use metrics::{SessionReport, StepMetrics};
pub use session::{Session, SessionError};
