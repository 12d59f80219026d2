//! The distributed histogram analysis.
//!
//! One invocation runs two local passes over the mesh and two
//! collectives: an element-wise MIN over `[min, -max]` for the global
//! range, then an element-wise SUM over the bin vector. Every rank
//! issues both collectives on every invocation. A rank that fails
//! locally contributes the neutral range (`+inf`, `+inf`) and zero
//! counts, then reports its error after the second collective.

use eddy_core::{
    apply, AdaptorError, AnalysisAdaptor, AnalysisError, Association, DataAdaptor, DataObject,
    ReduceOp, SharedComm, Visit,
};

use crate::kernel::{accumulate_bins, ghost_mask, LocalRange};
use crate::state::HistogramState;

/// What to histogram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistogramConfig {
    /// Number of bins; must be positive.
    pub bins: usize,
    /// Mesh to fetch.
    pub mesh: String,
    /// Association of the array.
    pub association: Association,
    /// Array name.
    pub array: String,
}

/// Where an invocation is in its protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No invocation has started, or the state was finalized away.
    Uninitialized,
    /// First local pass: accumulating the local range.
    RangeAccumulating,
    /// Global range known.
    RangeReduced,
    /// Second local pass: counting values into bins.
    BinAccumulating,
    /// Global counts known.
    Finalized,
}

/// Distributed histogram of one array on one mesh.
pub struct Histogram {
    comm: SharedComm,
    config: HistogramConfig,
    state: Option<HistogramState>,
    phase: Phase,
}

impl Histogram {
    /// Create the analysis. Fails if `config.bins` is zero.
    pub fn new(comm: SharedComm, config: HistogramConfig) -> Result<Self, AnalysisError> {
        if config.bins == 0 {
            return Err(AnalysisError::configuration("histogram needs at least one bin"));
        }
        Ok(Self {
            comm,
            config,
            state: None,
            phase: Phase::Uninitialized,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &HistogramConfig {
        &self.config
    }

    /// Protocol phase of the latest invocation.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The global histogram of the latest invocation.
    ///
    /// Available on every rank, including ranks whose own contribution
    /// failed.
    pub fn histogram(&self) -> Result<&HistogramState, AnalysisError> {
        self.state.as_ref().ok_or_else(|| AnalysisError::DataUnavailable {
            reason: "no histogram has been computed".to_string(),
        })
    }

    /// Fetch the mesh, its array, and the matching ghost flags.
    ///
    /// `Ok(None)` means this rank has no data for the mesh this step.
    fn fetch(&self, data: &mut dyn DataAdaptor) -> Result<Option<DataObject>, AnalysisError> {
        let HistogramConfig {
            mesh: name,
            association,
            array,
            ..
        } = &self.config;

        let Some(mut mesh) = data.mesh(name, true)? else {
            tracing::debug!(mesh = %name, "no local data");
            return Ok(None);
        };

        if let Err(e) = data.add_array(&mut mesh, name, *association, array) {
            tracing::warn!(
                mesh = %name,
                error = %e,
                "failed to add {association} data array \"{array}\""
            );
        }

        let ghost_err = |source: AdaptorError| AnalysisError::GhostMetadata {
            mesh: name.clone(),
            source,
        };
        match association {
            Association::Cell => {
                if data.ghost_cell_layers(name).map_err(ghost_err)? > 0 {
                    data.add_ghost_cells_array(&mut mesh, name).map_err(ghost_err)?;
                }
            }
            Association::Point => {
                if data.ghost_node_layers(name).map_err(ghost_err)? > 0 {
                    data.add_ghost_nodes_array(&mut mesh, name).map_err(ghost_err)?;
                }
            }
            Association::Field => {}
        }
        Ok(Some(mesh))
    }

    fn local_range(&self, mesh: &DataObject) -> Result<LocalRange, AnalysisError> {
        let HistogramConfig {
            association, array, ..
        } = &self.config;
        let mut range = LocalRange::default();
        apply(mesh, |flat_index, ds| {
            match ds.attributes(*association).get(array) {
                Some(a) => range.add(a, ghost_mask(ds, *association, a.tuples())),
                None => {
                    tracing::warn!(flat_index, "dataset has no array named \"{array}\"");
                }
            }
            Visit::Continue
        })?;
        Ok(range)
    }

    fn local_counts(
        &self,
        mesh: &DataObject,
        min: f64,
        max: f64,
        counts: &mut [u64],
    ) -> Result<(), AnalysisError> {
        let HistogramConfig {
            association, array, ..
        } = &self.config;
        apply(mesh, |_, ds| {
            if let Some(a) = ds.attributes(*association).get(array) {
                accumulate_bins(counts, min, max, a, ghost_mask(ds, *association, a.tuples()));
            }
            Visit::Continue
        })?;
        Ok(())
    }
}

impl AnalysisAdaptor for Histogram {
    fn name(&self) -> &str {
        "histogram"
    }

    fn execute(&mut self, data: &mut dyn DataAdaptor) -> Result<(), AnalysisError> {
        self.state = None;
        self.phase = Phase::Uninitialized;

        let (mesh, mut failure) = match self.fetch(data) {
            Ok(mesh) => (mesh, None),
            Err(e) => (None, Some(e)),
        };

        self.phase = Phase::RangeAccumulating;
        let mut local = LocalRange::default();
        if let Some(mesh) = &mesh {
            match self.local_range(mesh) {
                Ok(r) => local = r,
                Err(e) => failure = Some(e),
            }
        }

        let mut range = [local.min, -local.max];
        self.comm.all_reduce_f64(&mut range, ReduceOp::Min)?;
        let (min, max) = (range[0], -range[1]);
        self.phase = Phase::RangeReduced;

        let mut counts = vec![0u64; self.config.bins];
        if failure.is_none() && min <= max {
            if let Some(mesh) = &mesh {
                self.phase = Phase::BinAccumulating;
                if let Err(e) = self.local_counts(mesh, min, max, &mut counts) {
                    counts.fill(0);
                    failure = Some(e);
                }
            }
        }
        self.comm.all_reduce_u64(&mut counts, ReduceOp::Sum)?;
        self.phase = Phase::Finalized;

        let state = HistogramState { min, max, counts };
        if self.comm.rank() == 0 {
            tracing::info!(
                mesh = %self.config.mesh,
                array = %self.config.array,
                "\n{state}"
            );
        }
        self.state = Some(state);

        match failure {
            Some(e) => {
                tracing::error!(
                    rank = self.comm.rank(),
                    error = %e,
                    "histogram failed on this rank"
                );
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn finalize(&mut self) -> Result<(), AnalysisError> {
        self.state = None;
        self.phase = Phase::Uninitialized;
        Ok(())
    }
}
