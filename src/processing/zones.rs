//! Zone classification of index maps.
//!
//! A classifier holds an ordered list of left-open, right-closed intervals
//! `(lower, upper]`. The first interval may be unbounded below and the last
//! unbounded above. Intervals must be contiguous, so every value inside the
//! covered range lands in exactly one zone; values outside a bounded end are
//! clamped into the nearest zone.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::raster::IndexMap;

/// One labelled interval of a zone partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub label: String,
    /// Exclusive lower bound; `None` is unbounded.
    #[serde(default)]
    pub lower: Option<f32>,
    /// Inclusive upper bound; `None` is unbounded.
    #[serde(default)]
    pub upper: Option<f32>,
}

impl ZoneBand {
    pub fn new(label: &str, lower: Option<f32>, upper: Option<f32>) -> Self {
        Self {
            label: label.to_string(),
            lower,
            upper,
        }
    }
}

/// Agronomic NDVI zones: bare soil or sparse, medium, high and very high vigour.
pub fn default_ndvi_zones() -> Vec<ZoneBand> {
    vec![
        ZoneBand::new("soil", None, Some(0.2)),
        ZoneBand::new("medium", Some(0.2), Some(0.5)),
        ZoneBand::new("high", Some(0.5), Some(0.8)),
        ZoneBand::new("very_high", Some(0.8), None),
    ]
}

/// Share of valid pixels in one zone, in percent rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneShare {
    pub label: String,
    pub percent: f64,
}

/// Per-zone percentages in partition order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneStatistics {
    shares: Vec<ZoneShare>,
}

impl ZoneStatistics {
    pub fn shares(&self) -> &[ZoneShare] {
        &self.shares
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.shares
            .iter()
            .find(|share| share.label == label)
            .map(|share| share.percent)
    }

    pub fn total(&self) -> f64 {
        self.shares.iter().map(|share| share.percent).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    bands: Vec<ZoneBand>,
}

impl ZoneClassifier {
    /// Validates that `bands` form a gap-free, non-overlapping partition.
    pub fn new(bands: Vec<ZoneBand>) -> Result<Self> {
        if bands.is_empty() {
            return Err(AnalysisError::Config("zone list is empty".into()));
        }

        for (i, band) in bands.iter().enumerate() {
            if band.label.trim().is_empty() {
                return Err(AnalysisError::Config(format!("zone {} has an empty label", i)));
            }
            if bands[..i].iter().any(|other| other.label == band.label) {
                return Err(AnalysisError::Config(format!(
                    "duplicate zone label '{}'",
                    band.label
                )));
            }
            if let (Some(lower), Some(upper)) = (band.lower, band.upper) {
                if !(lower < upper) {
                    return Err(AnalysisError::Config(format!(
                        "zone '{}' is empty: ({}, {}]",
                        band.label, lower, upper
                    )));
                }
            }
            if i > 0 && band.lower.is_none() {
                return Err(AnalysisError::Config(format!(
                    "only the first zone may be unbounded below, not '{}'",
                    band.label
                )));
            }
            if i + 1 < bands.len() && band.upper.is_none() {
                return Err(AnalysisError::Config(format!(
                    "only the last zone may be unbounded above, not '{}'",
                    band.label
                )));
            }
        }

        for pair in bands.windows(2) {
            if pair[0].upper != pair[1].lower {
                return Err(AnalysisError::Config(format!(
                    "zones '{}' and '{}' are not contiguous ({:?} vs {:?})",
                    pair[0].label, pair[1].label, pair[0].upper, pair[1].lower
                )));
            }
        }

        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[ZoneBand] {
        &self.bands
    }

    /// Zone position for a finite value, after clamping into the covered range.
    pub fn zone_of(&self, value: f32) -> usize {
        self.bands
            .iter()
            .position(|band| band.upper.map_or(true, |upper| value <= upper))
            .unwrap_or(self.bands.len() - 1)
    }

    /// Percentage of finite pixels per zone. A map with no valid pixel
    /// reports zero for every zone.
    pub fn classify(&self, map: &IndexMap) -> ZoneStatistics {
        let zones = self.bands.len();
        let counts = map
            .data()
            .par_iter()
            .filter(|v| v.is_finite())
            .fold(
                || vec![0usize; zones],
                |mut acc, &v| {
                    acc[self.zone_of(v)] += 1;
                    acc
                },
            )
            .reduce(
                || vec![0usize; zones],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        let valid: usize = counts.iter().sum();
        let shares = self
            .bands
            .iter()
            .zip(counts)
            .map(|(band, count)| ZoneShare {
                label: band.label.clone(),
                percent: if valid == 0 {
                    0.0
                } else {
                    round2(count as f64 * 100.0 / valid as f64)
                },
            })
            .collect();

        ZoneStatistics { shares }
    }
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self {
            bands: default_ndvi_zones(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    #[test]
    fn boundaries_are_right_closed() {
        let classifier = ZoneClassifier::default();
        assert_eq!(classifier.zone_of(0.2), 0);
        assert_eq!(classifier.zone_of(0.2001), 1);
        assert_eq!(classifier.zone_of(0.8), 2);
        assert_eq!(classifier.zone_of(5.0), 3);
        assert_eq!(classifier.zone_of(-3.0), 0);
    }

    #[test]
    fn percentages_sum_to_hundred() {
        let data: Vec<f32> = (0..97).map(|i| i as f32 / 48.0 - 1.0).collect();
        let map = Raster::new((97, 1), data).unwrap();
        let stats = ZoneClassifier::default().classify(&map);
        assert!((stats.total() - 100.0).abs() <= 0.1);
    }

    #[test]
    fn nan_pixels_are_excluded() {
        let map = Raster::new((4, 1), vec![0.1, f32::NAN, 0.9, f32::NAN]).unwrap();
        let stats = ZoneClassifier::default().classify(&map);
        assert_eq!(stats.get("soil"), Some(50.0));
        assert_eq!(stats.get("very_high"), Some(50.0));
        assert_eq!(stats.get("medium"), Some(0.0));

        let empty = Raster::filled((2, 2), f32::NAN);
        assert_eq!(ZoneClassifier::default().classify(&empty).total(), 0.0);
    }

    #[test]
    fn infinite_pixels_are_excluded() {
        let map = Raster::new((4, 1), vec![0.1, f32::INFINITY, 0.9, f32::NEG_INFINITY]).unwrap();
        let stats = ZoneClassifier::default().classify(&map);
        assert_eq!(stats.get("soil"), Some(50.0));
        assert_eq!(stats.get("very_high"), Some(50.0));
        assert_eq!(stats.total(), 100.0);
    }

    #[test]
    fn rejects_gaps_and_overlaps() {
        let gap = vec![
            ZoneBand::new("a", None, Some(0.2)),
            ZoneBand::new("b", Some(0.3), None),
        ];
        assert!(ZoneClassifier::new(gap).is_err());

        let inverted = vec![ZoneBand::new("a", Some(0.5), Some(0.1))];
        assert!(ZoneClassifier::new(inverted).is_err());

        let open_middle = vec![
            ZoneBand::new("a", None, None),
            ZoneBand::new("b", Some(0.3), None),
        ];
        assert!(ZoneClassifier::new(open_middle).is_err());

        assert!(ZoneClassifier::new(Vec::new()).is_err());
        assert!(ZoneClassifier::new(default_ndvi_zones()).is_ok());
    }

    #[test]
    fn rounds_to_two_decimals() {
        let map = Raster::new((3, 1), vec![0.1, 0.3, 0.6]).unwrap();
        let stats = ZoneClassifier::default().classify(&map);
        assert_eq!(stats.get("soil"), Some(33.33));
    }
}
