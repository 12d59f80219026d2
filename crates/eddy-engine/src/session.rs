//! The streaming session driver.
//!
//! [`Session::run`] opens the stream, executes every analysis against
//! each step, releases the step, and advances until the stream is
//! exhausted. Any execute failure ends the session on every rank: after
//! each analysis the ranks agree on a failure flag with a MAX all-reduce,
//! so a failure on one rank stops all of them at the same analysis of the
//! same step. The step is then released, the stream closed, and the
//! failure returned. Analyses are finalized only after a complete stream.
//!
//! Every rank must serve the same number of steps.

use std::time::Instant;

use eddy_core::{
    AdaptorError, AnalysisAdaptor, AnalysisError, CommError, Communicator, ReduceOp, SelfComm,
    SharedComm, StreamingAdaptor,
};
use thiserror::Error;

use crate::metrics::{SessionReport, StepMetrics};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The stream could not be opened.
    #[error("failed to open the data stream: {0}")]
    Open(#[source] AdaptorError),
    /// An analysis failed on a step.
    #[error("analysis \"{analysis}\" failed on time step {time_step}: {source}")]
    Execute {
        /// Name of the failing analysis.
        analysis: String,
        /// Time step being processed.
        time_step: i64,
        /// The failure.
        #[source]
        source: AnalysisError,
    },
    /// An analysis failed on another rank. This rank stopped at the same
    /// point without a local failure.
    #[error("analysis \"{analysis}\" failed on another rank at time step {time_step}")]
    PeerFailed {
        /// Name of the analysis the ranks stopped at.
        analysis: String,
        /// Time step being processed.
        time_step: i64,
    },
    /// The ranks could not agree on the outcome of an analysis.
    #[error("failure agreement on time step {time_step}: {source}")]
    Comm {
        /// Time step being processed.
        time_step: i64,
        /// The failure.
        #[source]
        source: CommError,
    },
    /// Releasing a step failed.
    #[error("failed to release time step {time_step}: {source}")]
    Release {
        /// Time step being released.
        time_step: i64,
        /// The failure.
        #[source]
        source: AdaptorError,
    },
    /// Advancing the stream failed.
    #[error("failed to advance past time step {time_step}: {source}")]
    Advance {
        /// Last processed time step.
        time_step: i64,
        /// The failure.
        #[source]
        source: AdaptorError,
    },
    /// Closing the stream failed.
    #[error("failed to close the data stream: {0}")]
    Close(#[source] AdaptorError),
    /// One or more analyses failed to finalize. Every analysis was
    /// finalized regardless.
    #[error("{} analyses failed to finalize", failures.len())]
    Finalize {
        /// `(analysis name, failure)` in analysis order.
        failures: Vec<(String, AnalysisError)>,
    },
}

/// Drives a set of analyses over a streaming adaptor.
pub struct Session<A> {
    adaptor: A,
    analyses: Vec<Box<dyn AnalysisAdaptor>>,
    comm: SharedComm,
}

impl<A: StreamingAdaptor> Session<A> {
    /// Create a single-rank session over `adaptor`. Analyses run in the
    /// given order.
    pub fn new(adaptor: A, analyses: Vec<Box<dyn AnalysisAdaptor>>) -> Self {
        Self {
            adaptor,
            analyses,
            comm: SelfComm::shared(),
        }
    }

    /// Run as one rank of `comm`. Every rank of the group must run a
    /// session with the same analyses in the same order.
    pub fn with_comm(mut self, comm: SharedComm) -> Self {
        self.comm = comm;
        self
    }

    /// The adaptor.
    pub fn adaptor(&self) -> &A {
        &self.adaptor
    }

    /// Consume the session, returning the adaptor.
    pub fn into_adaptor(self) -> A {
        self.adaptor
    }

    /// Release and close after a failure. Secondary errors are logged
    /// only.
    fn abandon(&mut self) {
        if let Err(e) = self.adaptor.release_data() {
            tracing::warn!(error = %e, "release after failure");
        }
        if let Err(e) = self.adaptor.close() {
            tracing::warn!(error = %e, "close after failure");
        }
    }

    fn step(&mut self, metrics: &mut StepMetrics) -> Result<(), SessionError> {
        let time_step = metrics.time_step;
        for analysis in &mut self.analyses {
            let started = Instant::now();
            let outcome = analysis.execute(&mut self.adaptor);
            let elapsed_us = started.elapsed().as_micros() as u64;
            let name = analysis.name().to_string();

            let mut failed = [u64::from(outcome.is_err())];
            let agreed = self.comm.all_reduce_u64(&mut failed, ReduceOp::Max);
            match (outcome, agreed) {
                (Err(source), _) => {
                    tracing::error!(analysis = %name, error = %source, "execute failed");
                    return Err(SessionError::Execute {
                        analysis: name,
                        time_step,
                        source,
                    });
                }
                (Ok(()), Err(source)) => {
                    tracing::error!(analysis = %name, error = %source, "failure agreement failed");
                    return Err(SessionError::Comm { time_step, source });
                }
                (Ok(()), Ok(())) if failed[0] > 0 => {
                    tracing::error!(analysis = %name, "execute failed on another rank");
                    return Err(SessionError::PeerFailed {
                        analysis: name,
                        time_step,
                    });
                }
                (Ok(()), Ok(())) => metrics.analysis_us.push((name, elapsed_us)),
            }
        }
        Ok(())
    }

    /// Run the stream to exhaustion.
    pub fn run(&mut self) -> Result<SessionReport, SessionError> {
        self.adaptor.open().map_err(SessionError::Open)?;
        let mut report = SessionReport::default();

        loop {
            let time_step = self.adaptor.data_time_step();
            let time = self.adaptor.data_time();
            let span = tracing::info_span!("step", time_step, rank = self.comm.rank());
            let _guard = span.enter();
            tracing::info!("processing time step {time_step} time {time}");

            let started = Instant::now();
            let mut metrics = StepMetrics {
                time_step,
                time,
                ..Default::default()
            };
            if let Err(e) = self.step(&mut metrics) {
                self.abandon();
                return Err(e);
            }
            if let Err(source) = self.adaptor.release_data() {
                if let Err(e) = self.adaptor.close() {
                    tracing::warn!(error = %e, "close after failure");
                }
                return Err(SessionError::Release { time_step, source });
            }
            metrics.total_us = started.elapsed().as_micros() as u64;
            tracing::debug!(total_us = metrics.total_us, "step complete");
            report.metrics.push(metrics);
            report.steps += 1;

            match self.adaptor.advance() {
                Ok(true) => {}
                Ok(false) => break,
                Err(source) => {
                    if let Err(e) = self.adaptor.close() {
                        tracing::warn!(error = %e, "close after failure");
                    }
                    return Err(SessionError::Advance { time_step, source });
                }
            }
        }

        self.adaptor.close().map_err(SessionError::Close)?;

        let mut failures = Vec::new();
        for analysis in &mut self.analyses {
            if let Err(e) = analysis.finalize() {
                tracing::error!(analysis = analysis.name(), error = %e, "finalize failed");
                failures.push((analysis.name().to_string(), e));
            }
        }
        tracing::info!("finished processing {} time steps", report.steps);
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SessionError::Finalize { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::{MemoryAdaptor, StepData};
    use eddy_test_utils::fixtures::{AnalysisEvent, FailingAnalysis, RecordingAnalysis};
    use eddy_test_utils::FaultyAdaptor;

    fn stream(n: i64) -> FaultyAdaptor<MemoryAdaptor> {
        FaultyAdaptor::new(MemoryAdaptor::new(
            (0..n).map(|s| StepData::new(s, s as f64 * 0.1)),
        ))
    }

    #[test]
    fn runs_every_analysis_on_every_step_then_finalizes() {
        let (a, log_a) = RecordingAnalysis::new("a");
        let (b, log_b) = RecordingAnalysis::new("b");
        let mut session = Session::new(stream(3), vec![Box::new(a), Box::new(b)]);
        let report = session.run().unwrap();

        assert_eq!(report.steps, 3);
        assert_eq!(report.metrics.len(), 3);
        assert_eq!(report.metrics[2].time_step, 2);
        assert_eq!(report.metrics[0].analysis_us.len(), 2);
        for log in [log_a, log_b] {
            let events = log.lock().unwrap().clone();
            assert_eq!(events.len(), 4);
            assert_eq!(events[1], AnalysisEvent::Execute { time_step: 1, time: 0.1 });
            assert_eq!(events[3], AnalysisEvent::Finalize);
        }
        assert_eq!(session.adaptor().releases(), 3);
        assert_eq!(session.adaptor().closes(), 1);
    }

    #[test]
    fn execute_failure_releases_closes_and_stops() {
        let (rec, log) = RecordingAnalysis::new("after");
        let failing = FailingAnalysis::new("flaky", 1);
        let mut session = Session::new(stream(5), vec![Box::new(failing), Box::new(rec)]);
        match session.run() {
            Err(SessionError::Execute { analysis, time_step, .. }) => {
                assert_eq!(analysis, "flaky");
                assert_eq!(time_step, 1);
            }
            other => panic!("expected execute failure, got {other:?}"),
        }
        // The analysis after the failing one ran on step 0 only and was
        // never finalized.
        let events = log.lock().unwrap().clone();
        assert_eq!(events, [AnalysisEvent::Execute { time_step: 0, time: 0.0 }]);
        assert_eq!(session.adaptor().releases(), 2);
        assert_eq!(session.adaptor().closes(), 1);
    }

    #[test]
    fn failure_on_one_rank_stops_every_rank_at_the_same_step() {
        use eddy_comm::LocalGroup;
        use eddy_core::SharedComm;

        let results = LocalGroup::run(3, |comm| {
            let rank = comm.rank();
            // Only rank 1 fails, on its second execution.
            let succeed = if rank == 1 { 1 } else { usize::MAX };
            let (rec, log) = RecordingAnalysis::new("after");
            let analyses: Vec<Box<dyn AnalysisAdaptor>> =
                vec![Box::new(FailingAnalysis::new("flaky", succeed)), Box::new(rec)];
            let shared: SharedComm = comm;
            let mut session = Session::new(stream(4), analyses).with_comm(shared);
            let outcome = session.run();
            let events = log.lock().unwrap().clone();
            let counts = (session.adaptor().releases(), session.adaptor().closes());
            (outcome.map(|r| r.steps), events, counts)
        })
        .unwrap();

        for (rank, (outcome, events, counts)) in results.into_iter().enumerate() {
            match outcome {
                Err(SessionError::Execute { analysis, time_step, .. }) => {
                    assert_eq!(rank, 1);
                    assert_eq!((analysis.as_str(), time_step), ("flaky", 1));
                }
                Err(SessionError::PeerFailed { analysis, time_step }) => {
                    assert_ne!(rank, 1);
                    assert_eq!((analysis.as_str(), time_step), ("flaky", 1));
                }
                other => panic!("rank {rank}: unexpected outcome {other:?}"),
            }
            // Nobody ran the second analysis on step 1 or finalized.
            assert_eq!(events, [AnalysisEvent::Execute { time_step: 0, time: 0.0 }]);
            assert_eq!(counts, (2, 1));
        }
    }

    #[test]
    fn finalize_failures_are_collected_after_finalizing_everything() {
        let (rec, log) = RecordingAnalysis::new("rec");
        let failing = FailingAnalysis::failing_finalize("bad");
        let mut session = Session::new(stream(2), vec![Box::new(failing), Box::new(rec)]);
        match session.run() {
            Err(SessionError::Finalize { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "bad");
            }
            other => panic!("expected finalize failure, got {other:?}"),
        }
        assert_eq!(log.lock().unwrap().last(), Some(&AnalysisEvent::Finalize));
    }

    #[test]
    fn empty_stream_fails_to_open() {
        let mut session = Session::new(stream(0), Vec::new());
        assert!(matches!(
            session.run(),
            Err(SessionError::Open(AdaptorError::EndOfStream))
        ));
    }
}
