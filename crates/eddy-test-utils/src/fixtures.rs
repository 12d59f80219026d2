//! Reusable datasets, steps, and analyses.
//!
//! - [`cell_block`] / [`point_block`] / [`ghosted_cell_block`]: 1-D image
//!   blocks carrying a single array.
//! - [`fluid_step`]: a two-mesh step (composite `fluid`, polygonal
//!   `particles`) used across crates.
//! - [`RecordingAnalysis`]: records every call into a shared log.
//! - [`FailingAnalysis`]: fails deterministically after N executions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use eddy_core::{
    AnalysisAdaptor, AnalysisError, Association, DataAdaptor, DataArray, Dataset, Geometry,
    MultiBlock, StepData,
};

/// Composite mesh served by [`fluid_step`].
pub const FLUID_MESH: &str = "fluid";

/// Polygonal mesh served by [`fluid_step`].
pub const PARTICLE_MESH: &str = "particles";

/// A line of `values.len()` cells carrying cell array `name`.
pub fn cell_block(name: &str, values: &[f64]) -> Dataset {
    let n = values.len() as i64;
    Dataset::image([0, n, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
        .with_array(Association::Cell, DataArray::from_f64(name, values.to_vec()))
}

/// Like [`cell_block`], with a cell ghost flag array.
pub fn ghosted_cell_block(name: &str, values: &[f64], ghosts: &[u8]) -> Dataset {
    cell_block(name, values).with_array(Association::Cell, DataArray::ghost_flags(ghosts.to_vec()))
}

/// A line of `values.len()` points carrying point array `name`.
pub fn point_block(name: &str, values: &[f64]) -> Dataset {
    let n = values.len() as i64;
    Dataset::image([0, (n - 1).max(0), 0, 0, 0, 0], [0.0; 3], [1.0; 3])
        .with_array(Association::Point, DataArray::from_f64(name, values.to_vec()))
}

/// A step serving [`FLUID_MESH`] and [`PARTICLE_MESH`].
///
/// `fluid` is a two-block composite; each block has cell array
/// `pressure` and point array `temperature`, offset by `time_step`.
/// `particles` is a single triangle with point array `mass`.
pub fn fluid_step(time_step: i64, time: f64) -> StepData {
    let t = time_step as f64;
    let block = |cells: &[f64]| {
        let points: Vec<f64> = (0..=cells.len()).map(|i| t + i as f64 * 0.5).collect();
        cell_block("pressure", cells)
            .with_array(Association::Point, DataArray::from_f64("temperature", points))
    };
    let fluid = MultiBlock::from_blocks(vec![
        Some(block(&[t, t + 1.0, t + 2.0]).into()),
        Some(block(&[t + 3.0, t + 4.0]).into()),
    ]);
    let particles = Dataset::new(Geometry::Poly {
        points: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        connectivity: vec![0, 1, 2],
        offsets: vec![3],
    })
    .with_array(Association::Point, DataArray::from_f64("mass", vec![1.0, 2.0, 3.0]));
    StepData::new(time_step, time)
        .with_mesh(FLUID_MESH, fluid)
        .with_mesh(PARTICLE_MESH, particles)
}

/// One call observed by a [`RecordingAnalysis`].
#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisEvent {
    /// `execute` ran against the given step.
    Execute {
        /// Step index reported by the adaptor.
        time_step: i64,
        /// Simulation time reported by the adaptor.
        time: f64,
    },
    /// `finalize` ran.
    Finalize,
}

/// Shared event log of a [`RecordingAnalysis`].
pub type EventLog = Arc<Mutex<Vec<AnalysisEvent>>>;

/// Records every call into a log shared with the test.
pub struct RecordingAnalysis {
    name: String,
    log: EventLog,
}

impl RecordingAnalysis {
    /// Create the analysis and a handle to its log.
    pub fn new(name: impl Into<String>) -> (Self, EventLog) {
        let log = EventLog::default();
        (
            Self {
                name: name.into(),
                log: Arc::clone(&log),
            },
            log,
        )
    }

    fn push(&self, event: AnalysisEvent) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl AnalysisAdaptor for RecordingAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, data: &mut dyn DataAdaptor) -> Result<(), AnalysisError> {
        self.push(AnalysisEvent::Execute {
            time_step: data.data_time_step(),
            time: data.data_time(),
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), AnalysisError> {
        self.push(AnalysisEvent::Finalize);
        Ok(())
    }
}

/// Fails deterministically after a configurable number of successful
/// executions.
pub struct FailingAnalysis {
    pub name: String,
    pub succeed_count: usize,
    pub fail_finalize: bool,
    call_count: AtomicUsize,
}

impl FailingAnalysis {
    /// Create an analysis that succeeds `succeed_count` times then fails.
    pub fn new(name: impl Into<String>, succeed_count: usize) -> Self {
        Self {
            name: name.into(),
            succeed_count,
            fail_finalize: false,
            call_count: AtomicUsize::new(0),
        }
    }

    /// An analysis whose executions succeed but whose finalize fails.
    pub fn failing_finalize(name: impl Into<String>) -> Self {
        Self {
            fail_finalize: true,
            ..Self::new(name, usize::MAX)
        }
    }

    /// How many times `execute()` has been called.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl AnalysisAdaptor for FailingAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, _data: &mut dyn DataAdaptor) -> Result<(), AnalysisError> {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(AnalysisError::configuration(format!(
                "deliberate failure after {} successful calls",
                self.succeed_count
            )));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), AnalysisError> {
        if self.fail_finalize {
            return Err(AnalysisError::configuration("deliberate finalize failure"));
        }
        Ok(())
    }
}
