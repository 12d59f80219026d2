//! Communicator backends for Eddy.
//!
//! - [`LocalGroup`] / [`LocalComm`]: an in-process group with one thread
//!   per rank, used by tests and single-node runs.
//! - `MpiComm` (feature `mpi`): a distributed group over MPI.
//!
//! Both implement [`eddy_core::Communicator`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_backend;

pub use local::{LocalComm, LocalGroup};
#[cfg(feature = "mpi")]
pub use mpi_backend::MpiComm;
