//! MPI communicator backend.
//!
//! Wraps an rsmpi communicator. Construct it from the world
//! communicator of an initialized [`Universe`]; the universe must
//! outlive every [`MpiComm`] derived from it.

use eddy_core::{CommError, Communicator, ReduceOp};
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as _, CommunicatorCollectives as _, Root as _};

/// [`Communicator`] over an MPI communicator.
pub struct MpiComm {
    comm: SimpleCommunicator,
}

impl MpiComm {
    /// Initialize MPI and wrap the world communicator.
    ///
    /// Returns the [`Universe`] guard alongside the communicator; MPI is
    /// finalized when the guard is dropped.
    pub fn init() -> Result<(Universe, Self), CommError> {
        let universe = mpi::initialize().ok_or_else(|| CommError::Backend {
            reason: "MPI is already initialized".to_string(),
        })?;
        let comm = universe.world();
        Ok((universe, Self { comm }))
    }

    /// Wrap an existing communicator.
    pub fn new(comm: SimpleCommunicator) -> Self {
        Self { comm }
    }
}

fn system_op(op: ReduceOp) -> SystemOperation {
    match op {
        ReduceOp::Min => SystemOperation::min(),
        ReduceOp::Max => SystemOperation::max(),
        ReduceOp::Sum => SystemOperation::sum(),
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn all_reduce_f64(&self, values: &mut [f64], op: ReduceOp) -> Result<(), CommError> {
        let send = values.to_vec();
        self.comm.all_reduce_into(&send[..], values, system_op(op));
        Ok(())
    }

    fn all_reduce_u64(&self, values: &mut [u64], op: ReduceOp) -> Result<(), CommError> {
        let send = values.to_vec();
        self.comm.all_reduce_into(&send[..], values, system_op(op));
        Ok(())
    }

    fn broadcast_bytes(&self, root: usize, bytes: &mut Vec<u8>) -> Result<(), CommError> {
        let size = self.size();
        if root >= size {
            return Err(CommError::InvalidRoot { root, size });
        }
        let root_process = self.comm.process_at_rank(root as i32);
        let mut len = bytes.len() as u64;
        root_process.broadcast_into(&mut len);
        bytes.resize(len as usize, 0);
        root_process.broadcast_into(&mut bytes[..]);
        Ok(())
    }
}
