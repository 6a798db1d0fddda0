// src/processing/stats.rs
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::raster::IndexMap;

/// Summary statistics over the valid (non-NaN) pixels of an index map.
///
/// `std` is the population standard deviation. A map without valid pixels
/// reports zeros and `valid_pixels == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub valid_pixels: usize,
}

impl IndexStatistics {
    pub fn compute(map: &IndexMap) -> Self {
        let (min, max) = match map.valid_values().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => return Self::default(),
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };

        // Two passes in f64 to keep the variance stable on large rasters
        let (count, sum) = map
            .valid_values()
            .fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v as f64));
        let mean = sum / count as f64;
        let variance = map
            .valid_values()
            .map(|v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Self {
            min: min as f64,
            max: max as f64,
            mean,
            std: variance.sqrt(),
            valid_pixels: count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.valid_pixels == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    #[test]
    fn ignores_nan_pixels() {
        let map = Raster::new((2, 2), vec![1.0, f32::NAN, 3.0, 2.0]).unwrap();
        let stats = IndexStatistics::compute(&map);
        assert_eq!(stats.valid_pixels, 3);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert!((stats.mean - 2.0).abs() < 1e-9);
        assert!((stats.std - (2.0f64 / 3.0).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn all_nan_is_empty() {
        let stats = IndexStatistics::compute(&Raster::filled((3, 3), f32::NAN));
        assert!(stats.is_empty());
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn single_value_has_zero_spread() {
        let stats = IndexStatistics::compute(&Raster::filled((1, 1), 0.4f32));
        assert_eq!(stats.min, stats.max);
        assert_eq!(stats.std, 0.0);
    }
}
