//! Per-step timing collected by the session driver.

/// Timing of one processed step.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepMetrics {
    /// Simulation time step number.
    pub time_step: i64,
    /// Simulation time.
    pub time: f64,
    /// Wall-clock time for the whole step, analyses and release included.
    pub total_us: u64,
    /// Per-analysis execution times: `(name, microseconds)`.
    pub analysis_us: Vec<(String, u64)>,
}

impl StepMetrics {
    /// Sum of the per-analysis times.
    pub fn analyses_total_us(&self) -> u64 {
        self.analysis_us.iter().map(|(_, us)| us).sum()
    }
}

/// Outcome of a completed session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionReport {
    /// Number of steps processed.
    pub steps: u64,
    /// Metrics of every processed step, oldest first.
    pub metrics: Vec<StepMetrics>,
}

impl SessionReport {
    /// Mean wall-clock time per step, in microseconds.
    pub fn mean_step_us(&self) -> Option<u64> {
        if self.metrics.is_empty() {
            return None;
        }
        let total: u64 = self.metrics.iter().map(|m| m.total_us).sum();
        Some(total / self.metrics.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.analysis_us.is_empty());
        assert_eq!(m.analyses_total_us(), 0);
    }

    #[test]
    fn mean_step_time() {
        let report = SessionReport {
            steps: 2,
            metrics: vec![
                StepMetrics {
                    total_us: 10,
                    analysis_us: vec![("a".into(), 4), ("b".into(), 5)],
                    ..Default::default()
                },
                StepMetrics {
                    total_us: 30,
                    ..Default::default()
                },
            ],
        };
        assert_eq!(report.mean_step_us(), Some(20));
        assert_eq!(report.metrics[0].analyses_total_us(), 9);
        assert_eq!(SessionReport::default().mean_step_us(), None);
    }
}
