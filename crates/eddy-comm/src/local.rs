//! In-process rank group: one thread per rank, channels between them.
//!
//! Every ordered pair of ranks has its own unbounded channel, so the
//! messages of consecutive collectives between two ranks stay in order
//! without sequence numbers. A reduction sends this rank's contribution
//! to every peer and then receives every peer's contribution; since
//! sends never block, no ordering of ranks can deadlock.
//!
//! A rank that leaves the group (its [`LocalComm`] is dropped) while a
//! peer still expects a contribution causes that peer's collective to
//! fail with [`CommError::PeerDisconnected`]. A skipped collective
//! therefore shows up as an error rather than a hang. A mismatched
//! collective still consumes every peer's packet, so the group stays
//! aligned for the next collective.

use std::cell::Cell;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use eddy_core::{CommError, Communicator, ReduceOp};

#[derive(Debug)]
enum Packet {
    ReduceF64(ReduceOp, Vec<f64>),
    ReduceU64(ReduceOp, Vec<u64>),
    Broadcast(usize, Vec<u8>),
}

impl Packet {
    fn describe(&self) -> String {
        match self {
            Self::ReduceF64(op, v) => format!("all_reduce_f64({op}, len {})", v.len()),
            Self::ReduceU64(op, v) => format!("all_reduce_u64({op}, len {})", v.len()),
            Self::Broadcast(root, _) => format!("broadcast(root {root})"),
        }
    }
}

/// One rank's endpoint in a [`LocalGroup`].
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    // to_peer[j] delivers to rank j; from_peer[j] receives from rank j.
    // The entries at index `rank` are unused.
    to_peer: Vec<Sender<Packet>>,
    from_peer: Vec<Receiver<Packet>>,
    collectives: Cell<u64>,
}

impl LocalComm {
    /// Number of collectives this rank has completed successfully.
    pub fn collective_count(&self) -> u64 {
        self.collectives.get()
    }

    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.to_peer.len()).filter(move |&p| p != self.rank)
    }

    fn send(&self, peer: usize, packet: Packet) {
        // A departed peer is detected on the receive side.
        let _ = self.to_peer[peer].send(packet);
    }

    fn recv(&self, peer: usize) -> Result<Packet, CommError> {
        self.from_peer[peer].recv().map_err(|_| {
            tracing::debug!(rank = self.rank, peer, "peer left the group during a collective");
            CommError::PeerDisconnected { peer }
        })
    }

    fn mismatch(&self, peer: usize, expected: String, found: &Packet) -> CommError {
        CommError::Mismatch {
            peer,
            expected,
            found: found.describe(),
        }
    }

    fn completed(&self) {
        self.collectives.set(self.collectives.get() + 1);
    }
}

macro_rules! all_reduce_impl {
    ($self:ident, $values:ident, $op:ident, $variant:ident, $apply:ident) => {{
        for peer in $self.peers() {
            $self.send(peer, Packet::$variant($op, $values.to_vec()));
        }
        let mine = $values.to_vec();
        let expected = Packet::$variant($op, mine.clone()).describe();
        let mut contributions = Vec::with_capacity($self.to_peer.len());
        let mut mismatch = None;
        for peer in 0..$self.to_peer.len() {
            if peer == $self.rank {
                contributions.push(mine.clone());
                continue;
            }
            // After a mismatch, keep receiving so no peer's packet from
            // this collective is left queued for the next one.
            match $self.recv(peer)? {
                Packet::$variant(peer_op, v) if peer_op == $op && v.len() == mine.len() => {
                    contributions.push(v)
                }
                other => {
                    if mismatch.is_none() {
                        mismatch = Some($self.mismatch(peer, expected.clone(), &other));
                    }
                }
            }
        }
        if let Some(e) = mismatch {
            return Err(e);
        }
        // Fold in rank order so every rank computes a bit-identical result.
        for (i, slot) in $values.iter_mut().enumerate() {
            let mut acc = contributions[0][i];
            for c in &contributions[1..] {
                acc = $op.$apply(acc, c[i]);
            }
            *slot = acc;
        }
        tracing::trace!(rank = $self.rank, op = %$op, len = $values.len(), "all-reduce");
        $self.completed();
        Ok(())
    }};
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.to_peer.len()
    }

    fn all_reduce_f64(&self, values: &mut [f64], op: ReduceOp) -> Result<(), CommError> {
        all_reduce_impl!(self, values, op, ReduceF64, apply_f64)
    }

    fn all_reduce_u64(&self, values: &mut [u64], op: ReduceOp) -> Result<(), CommError> {
        all_reduce_impl!(self, values, op, ReduceU64, apply_u64)
    }

    fn broadcast_bytes(&self, root: usize, bytes: &mut Vec<u8>) -> Result<(), CommError> {
        let size = self.size();
        if root >= size {
            return Err(CommError::InvalidRoot { root, size });
        }
        if self.rank == root {
            for peer in self.peers() {
                self.send(peer, Packet::Broadcast(root, bytes.clone()));
            }
        } else {
            match self.recv(root)? {
                Packet::Broadcast(r, data) if r == root => *bytes = data,
                other => {
                    return Err(self.mismatch(root, format!("broadcast(root {root})"), &other))
                }
            }
        }
        tracing::trace!(rank = self.rank, root, len = bytes.len(), "broadcast");
        self.completed();
        Ok(())
    }
}

/// Factory for in-process rank groups.
pub struct LocalGroup;

impl LocalGroup {
    /// Create the `size` endpoints of a fully connected group.
    ///
    /// Endpoint `r` has rank `r`. Each must be moved to its own thread
    /// before entering a collective. A `size` of zero is treated as one.
    pub fn create(size: usize) -> Vec<LocalComm> {
        let size = size.max(1);
        // channels[from][to]
        let mut senders: Vec<Vec<Option<Sender<Packet>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for from in 0..size {
            let mut row = Vec::with_capacity(size);
            for to_rank in receivers.iter_mut() {
                let (tx, rx) = crossbeam_channel::unbounded();
                row.push(Some(tx));
                to_rank[from] = Some(rx);
            }
            senders.push(row);
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (tx_row, rx_row))| LocalComm {
                rank,
                to_peer: tx_row.into_iter().flatten().collect(),
                from_peer: rx_row.into_iter().flatten().collect(),
                collectives: Cell::new(0),
            })
            .collect()
    }

    /// Run `f` on `size` rank threads and collect the per-rank results
    /// in rank order.
    ///
    /// Fails if a rank thread cannot be spawned or panics.
    pub fn run<T, F>(size: usize, f: F) -> Result<Vec<T>, CommError>
    where
        T: Send,
        F: Fn(Arc<LocalComm>) -> T + Sync,
    {
        let comms = Self::create(size);
        let f = &f;
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(comms.len());
            for comm in comms {
                let rank = comm.rank;
                let handle = thread::Builder::new()
                    .name(format!("eddy-rank-{rank}"))
                    .spawn_scoped(scope, move || f(Arc::new(comm)))
                    .map_err(|e| CommError::Backend {
                        reason: format!("failed to spawn rank {rank}: {e}"),
                    })?;
                handles.push(handle);
            }
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, h)| {
                    h.join().map_err(|_| CommError::Backend {
                        reason: format!("rank {rank} panicked"),
                    })
                })
                .collect()
        })
    }
}
