//! Collective communication abstraction.
//!
//! Analyses never talk to a transport directly. They hold a
//! [`SharedComm`] and issue collectives through the [`Communicator`]
//! trait, which has an in-process implementation for tests and single
//! process runs and an MPI implementation behind a feature flag.
//!
//! Every collective must be entered by every rank of the group in the
//! same order. An implementation may detect a mismatch and report
//! [`CommError::Mismatch`], but is not required to.

use std::fmt;
use std::sync::Arc;

use crate::error::CommError;

/// Element-wise reduction operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise minimum.
    Min,
    /// Element-wise maximum.
    Max,
    /// Element-wise sum.
    Sum,
}

impl ReduceOp {
    /// Combine two `f64` contributions.
    #[inline]
    pub fn apply_f64(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Sum => a + b,
        }
    }

    /// Combine two `u64` contributions. Sums saturate.
    #[inline]
    pub fn apply_u64(self, a: u64, b: u64) -> u64 {
        match self {
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Sum => a.saturating_add(b),
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
        })
    }
}

/// A process group supporting the collectives analyses need.
///
/// Implementations are used from a single thread per rank; the trait
/// carries no `Send`/`Sync` bound so that transports with thread-bound
/// handles can implement it.
pub trait Communicator {
    /// This process's rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// In-place all-reduce: on return every rank holds the element-wise
    /// reduction of every rank's `values`. All ranks must pass slices
    /// of the same length.
    fn all_reduce_f64(&self, values: &mut [f64], op: ReduceOp) -> Result<(), CommError>;

    /// Integer variant of [`all_reduce_f64`](Self::all_reduce_f64).
    fn all_reduce_u64(&self, values: &mut [u64], op: ReduceOp) -> Result<(), CommError>;

    /// Replace `bytes` on every rank with the contents held by `root`.
    fn broadcast_bytes(&self, root: usize, bytes: &mut Vec<u8>) -> Result<(), CommError>;
}

/// Shared handle to a communicator.
pub type SharedComm = Arc<dyn Communicator>;

/// The trivial single-rank group.
///
/// Every collective is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfComm;

impl SelfComm {
    /// A [`SharedComm`] wrapping a `SelfComm`.
    pub fn shared() -> SharedComm {
        Arc::new(Self)
    }
}

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_f64(&self, _values: &mut [f64], _op: ReduceOp) -> Result<(), CommError> {
        Ok(())
    }

    fn all_reduce_u64(&self, _values: &mut [u64], _op: ReduceOp) -> Result<(), CommError> {
        Ok(())
    }

    fn broadcast_bytes(&self, root: usize, _bytes: &mut Vec<u8>) -> Result<(), CommError> {
        if root != 0 {
            return Err(CommError::InvalidRoot { root, size: 1 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_ops_combine() {
        assert_eq!(ReduceOp::Min.apply_f64(1.0, -2.0), -2.0);
        assert_eq!(ReduceOp::Max.apply_f64(1.0, -2.0), 1.0);
        assert_eq!(ReduceOp::Sum.apply_f64(1.0, -2.0), -1.0);
        assert_eq!(ReduceOp::Sum.apply_u64(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn min_with_infinity_is_neutral() {
        assert_eq!(ReduceOp::Min.apply_f64(f64::INFINITY, 3.5), 3.5);
        assert_eq!(ReduceOp::Min.apply_f64(f64::INFINITY, f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn self_comm_collectives_are_identity() {
        let comm = SelfComm::shared();
        let mut v = [1.0, 2.0];
        comm.all_reduce_f64(&mut v, ReduceOp::Sum).unwrap();
        assert_eq!(v, [1.0, 2.0]);
        let mut bytes = b"abc".to_vec();
        comm.broadcast_bytes(0, &mut bytes).unwrap();
        assert_eq!(bytes, b"abc");
        assert_eq!(
            comm.broadcast_bytes(1, &mut bytes),
            Err(CommError::InvalidRoot { root: 1, size: 1 })
        );
    }
}
