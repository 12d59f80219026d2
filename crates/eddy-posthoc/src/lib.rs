//! Incremental multi-block writer for Eddy.
//!
//! [`PosthocWriter`] persists the required meshes of every streamed step
//! as one VTK XML file per leaf block, named deterministically from the
//! mesh, the block id and the step's file id. A session-scoped
//! [`OutputLedger`] records what was written, and at finalize time the
//! lead rank regenerates an index per mesh from it: an XML collection
//! (`.pvd`) or the legacy line-oriented format (`.visit`).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod index;
pub mod naming;
pub mod state;
pub mod vtk;
pub mod writer;

pub use index::{IndexMode, IndexSource};
pub use naming::{block_file_name, block_file_stem};
pub use state::{BlockOutputState, OutputLedger, StepRecord};
pub use vtk::{BlockWriter, WriteError, XmlBlockWriter};
pub use writer::PosthocWriter;
