//! The global histogram produced by one invocation.

use std::fmt;

/// Global range and bin counts.
///
/// When no rank contributed any value, `min` is `+inf`, `max` is `-inf`
/// and every count is zero.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramState {
    /// Global minimum over non-ghost values.
    pub min: f64,
    /// Global maximum over non-ghost values.
    pub max: f64,
    /// Per-bin counts, summed over all ranks.
    pub counts: Vec<u64>,
}

impl HistogramState {
    /// Number of bins.
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Total number of values binned.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns `false` if no rank contributed any value.
    pub fn has_data(&self) -> bool {
        self.min <= self.max
    }

    /// Width of one bin, zero without data.
    pub fn bin_width(&self) -> f64 {
        if !self.has_data() || self.counts.is_empty() {
            return 0.0;
        }
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Lower and upper edge of bin `i`.
    pub fn bin_edges(&self, i: usize) -> (f64, f64) {
        let w = self.bin_width();
        (self.min + w * i as f64, self.min + w * (i + 1) as f64)
    }
}

impl fmt::Display for HistogramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_data() {
            return f.write_str("histogram: no data");
        }
        writeln!(f, "histogram: range [{}, {}], {} values", self.min, self.max, self.total())?;
        for (i, count) in self.counts.iter().enumerate() {
            let (lo, hi) = self.bin_edges(i);
            writeln!(f, "  {lo:>14.6e} - {hi:<14.6e} {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_has_no_data() {
        let s = HistogramState {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            counts: vec![0; 4],
        };
        assert!(!s.has_data());
        assert_eq!(s.bin_width(), 0.0);
        assert_eq!(s.to_string(), "histogram: no data");
    }

    #[test]
    fn edges_follow_width() {
        let s = HistogramState {
            min: 0.0,
            max: 15.0,
            counts: vec![1, 1, 1, 1],
        };
        assert_eq!(s.bin_width(), 3.75);
        assert_eq!(s.bin_edges(2), (7.5, 11.25));
        assert_eq!(s.total(), 4);
        assert_eq!(s.to_string().lines().count(), 5);
    }
}
