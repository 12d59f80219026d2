//! Local accumulation kernels.
//!
//! Both passes read an array through [`ArrayValues::get_f64`] and skip
//! every tuple whose ghost flag is nonzero. NaN values are ignored.

use eddy_core::{ArrayValues, Association, DataArray, Dataset, GHOST_ARRAY_NAME};

/// Running local `[min, max]`. Starts empty (`+inf`, `-inf`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalRange {
    /// Smallest value seen.
    pub min: f64,
    /// Largest value seen.
    pub max: f64,
}

impl Default for LocalRange {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl LocalRange {
    /// Widen the range with every non-ghost value of `array`.
    pub fn add(&mut self, array: &DataArray, ghosts: Option<&[u8]>) {
        for_each_value(array, ghosts, |v| {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        });
    }

    /// Returns `true` if no value was added.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// Bin for `value` in `[min, max]` split into `bins` equal bins.
///
/// Values equal to `max` land in the last bin; values outside the range
/// are clamped. A degenerate range puts everything in bin 0.
#[inline]
pub fn bin_index(value: f64, min: f64, max: f64, bins: usize) -> usize {
    let width = max - min;
    if bins == 0 || width <= 0.0 {
        return 0;
    }
    let idx = ((value - min) / width * bins as f64).floor();
    if idx <= 0.0 {
        0
    } else {
        (idx as usize).min(bins - 1)
    }
}

/// Add every non-ghost value of `array` to `counts`.
pub fn accumulate_bins(
    counts: &mut [u64],
    min: f64,
    max: f64,
    array: &DataArray,
    ghosts: Option<&[u8]>,
) {
    let bins = counts.len();
    if bins == 0 {
        return;
    }
    for_each_value(array, ghosts, |v| {
        counts[bin_index(v, min, max, bins)] += 1;
    });
}

/// The ghost flags co-located with an array of `tuples` tuples on `ds`.
///
/// Field arrays have no ghost mask. A mask whose length does not match
/// the array, or which is not `u8`, is ignored with a warning.
pub fn ghost_mask<'a>(
    ds: &'a Dataset,
    association: Association,
    tuples: usize,
) -> Option<&'a [u8]> {
    if association == Association::Field {
        return None;
    }
    let array = ds.attributes(association).get(GHOST_ARRAY_NAME)?;
    match array.values() {
        ArrayValues::U8(flags) if flags.len() == tuples => Some(flags),
        ArrayValues::U8(flags) => {
            tracing::warn!(
                flags = flags.len(),
                tuples,
                "ghost array length does not match data array, ignoring it"
            );
            None
        }
        other => {
            tracing::warn!(kind = other.vtk_type_name(), "ghost array is not UInt8, ignoring it");
            None
        }
    }
}

fn for_each_value(array: &DataArray, ghosts: Option<&[u8]>, mut f: impl FnMut(f64)) {
    let values = array.values();
    let nc = array.components() as usize;
    for t in 0..array.tuples() {
        if ghosts.is_some_and(|g| g[t] != 0) {
            continue;
        }
        for c in 0..nc {
            if let Some(v) = values.get_f64(t * nc + c) {
                if !v.is_nan() {
                    f(v);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn max_lands_in_last_bin() {
        assert_eq!(bin_index(9.0, 0.0, 9.0, 5), 4);
        assert_eq!(bin_index(15.0, 0.0, 15.0, 4), 3);
        assert_eq!(bin_index(0.0, 0.0, 15.0, 4), 0);
    }

    #[test]
    fn degenerate_range_uses_bin_zero() {
        assert_eq!(bin_index(3.0, 3.0, 3.0, 8), 0);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(bin_index(-5.0, 0.0, 1.0, 4), 0);
        assert_eq!(bin_index(50.0, 0.0, 1.0, 4), 3);
    }

    #[test]
    fn ghosts_excluded_from_range_and_bins() {
        let a = DataArray::from_f64("a", vec![-100.0, 1.0, 2.0, 100.0]);
        let ghosts = [1u8, 0, 0, 2];
        let mut r = LocalRange::default();
        r.add(&a, Some(&ghosts));
        assert_eq!((r.min, r.max), (1.0, 2.0));
        let mut counts = [0u64; 2];
        accumulate_bins(&mut counts, r.min, r.max, &a, Some(&ghosts));
        assert_eq!(counts, [1, 1]);
    }

    #[test]
    fn multi_component_tuples_contribute_every_component() {
        let a = DataArray::with_components("v", 2, ArrayValues::F32(vec![0.0, 1.0, 5.0, 6.0]));
        let mut r = LocalRange::default();
        r.add(&a, Some(&[0, 1]));
        assert_eq!((r.min, r.max), (0.0, 1.0));
    }

    #[test]
    fn mismatched_mask_is_ignored() {
        let ds = Dataset::image([0, 2, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
            .with_array(Association::Cell, DataArray::ghost_flags(vec![1, 1, 1]));
        assert!(ghost_mask(&ds, Association::Cell, 2).is_none());
        assert!(ghost_mask(&ds, Association::Cell, 3).is_some());
        assert!(ghost_mask(&ds, Association::Field, 3).is_none());
        assert!(ghost_mask(&ds, Association::Point, 3).is_none());
    }

    #[test]
    fn nan_values_are_skipped() {
        let a = DataArray::from_f64("a", vec![f64::NAN, 2.0]);
        let mut r = LocalRange::default();
        r.add(&a, None);
        assert_eq!((r.min, r.max), (2.0, 2.0));
    }

    proptest! {
        #[test]
        fn bins_always_in_range(
            v in -1e9f64..1e9,
            lo in -1e6f64..1e6,
            width in 0.0f64..1e6,
            bins in 1usize..64,
        ) {
            let idx = bin_index(v, lo, lo + width, bins);
            prop_assert!(idx < bins);
        }

        #[test]
        fn counts_sum_to_non_ghost_values(
            pairs in prop::collection::vec((-1e3f64..1e3, 0u8..3), 0..200),
            bins in 1usize..16,
        ) {
            let values: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let ghosts: Vec<u8> = pairs.iter().map(|p| p.1).collect();
            let a = DataArray::from_f64("a", values);
            let mut r = LocalRange::default();
            r.add(&a, Some(&ghosts));
            let mut counts = vec![0u64; bins];
            accumulate_bins(&mut counts, r.min, r.max, &a, Some(&ghosts));
            let expected = ghosts.iter().filter(|&&g| g == 0).count() as u64;
            prop_assert_eq!(counts.iter().sum::<u64>(), expected);
        }
    }
}
