//! Session-scoped bookkeeping for every written mesh.
//!
//! The ledger is the only record of what was written: index files are
//! generated from it at finalize time and cannot be reconstructed from
//! the output directory.

use eddy_core::BlockKind;
use indexmap::IndexMap;

/// One recorded step of one mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepRecord {
    /// Simulation time.
    pub time: f64,
    /// Simulation time step number.
    pub time_step: i64,
    /// Leaf slots in the mesh this step, empty slots included.
    pub block_count: usize,
}

/// Output state of one mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockOutputState {
    kind: Option<BlockKind>,
    file_id: u64,
    history: Vec<StepRecord>,
}

impl BlockOutputState {
    /// Kind of block latched at first observation, if any leaf has been
    /// seen yet.
    pub fn kind(&self) -> Option<BlockKind> {
        self.kind
    }

    /// File extension of every block file of this mesh.
    pub fn extension(&self) -> Option<&'static str> {
        self.kind.map(BlockKind::extension)
    }

    /// File id the next step will be written with.
    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    /// Recorded steps, oldest first. Only populated on the lead rank.
    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// Latch the block kind unless one is already latched. Returns the
    /// latched kind.
    pub fn latch_kind(&mut self, kind: BlockKind) -> BlockKind {
        *self.kind.get_or_insert(kind)
    }

    /// Advance to the next file id.
    pub fn advance(&mut self) {
        self.file_id += 1;
    }

    /// Append a step to the history.
    pub fn record(&mut self, record: StepRecord) {
        self.history.push(record);
    }
}

/// Mesh name → [`BlockOutputState`], in first-observation order.
#[derive(Clone, Debug, Default)]
pub struct OutputLedger {
    meshes: IndexMap<String, BlockOutputState>,
}

impl OutputLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `mesh`, created with file id zero on first observation.
    pub fn observe(&mut self, mesh: &str) -> &mut BlockOutputState {
        if !self.meshes.contains_key(mesh) {
            tracing::debug!(mesh, "first observation");
        }
        self.meshes.entry(mesh.to_string()).or_default()
    }

    /// State of `mesh`, if it was ever observed.
    pub fn get(&self, mesh: &str) -> Option<&BlockOutputState> {
        self.meshes.get(mesh)
    }

    /// Observed meshes in first-observation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlockOutputState)> + '_ {
        self.meshes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of observed meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Returns `true` if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_latched_kind_wins() {
        let mut ledger = OutputLedger::new();
        let s = ledger.observe("m");
        assert_eq!(s.extension(), None);
        assert_eq!(s.latch_kind(BlockKind::ImageData), BlockKind::ImageData);
        assert_eq!(s.latch_kind(BlockKind::PolyData), BlockKind::ImageData);
        assert_eq!(ledger.get("m").unwrap().extension(), Some(".vti"));
    }

    #[test]
    fn history_is_append_only_and_file_ids_advance() {
        let mut ledger = OutputLedger::new();
        for step in 0..3 {
            let s = ledger.observe("m");
            s.record(StepRecord {
                time: step as f64 * 0.5,
                time_step: step,
                block_count: 2,
            });
            s.advance();
        }
        let s = ledger.get("m").unwrap();
        assert_eq!(s.file_id(), 3);
        let steps: Vec<_> = s.history().iter().map(|r| r.time_step).collect();
        assert_eq!(steps, [0, 1, 2]);
    }

    #[test]
    fn meshes_keep_first_observation_order() {
        let mut ledger = OutputLedger::new();
        ledger.observe("b");
        ledger.observe("a");
        ledger.observe("b");
        let names: Vec<_> = ledger.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(ledger.len(), 2);
    }
}
