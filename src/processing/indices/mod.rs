// src/processing/indices/mod.rs
pub mod ndvi;
pub mod vari;
pub mod savi;
pub mod evi;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::raster::{Band, IndexMap, Raster, RasterBandSet};

// Re-export indices
pub use ndvi::NDVI;
pub use vari::VARI;
pub use savi::SAVI;
pub use evi::EVI;

/// Added to every denominator to avoid division by zero.
pub const EPSILON: f32 = 1e-8;

/// Trait for spectral index calculators
pub trait IndexCalculator: Send + Sync {
    /// Calculate the index from the band set
    fn calculate(&self, bands: &RasterBandSet) -> Result<IndexMap>;

    /// Bands the formula reads
    fn required_bands(&self) -> &'static [Band];

    /// Return the name of the index
    fn name(&self) -> &str;

    /// NDVI, SAVI and EVI cannot be computed without a near-infrared band
    fn requires_nir(&self) -> bool {
        self.required_bands().contains(&Band::Nir)
    }
}

/// The indices produced for every analysed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VegetationIndex {
    Ndvi,
    Vari,
    Savi,
    Evi,
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 4] = [
        VegetationIndex::Ndvi,
        VegetationIndex::Vari,
        VegetationIndex::Savi,
        VegetationIndex::Evi,
    ];

    /// Lowercase key used in artifact maps and payloads.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Vari => "vari",
            Self::Savi => "savi",
            Self::Evi => "evi",
        }
    }

    /// Calculator with the standard coefficients.
    pub fn calculator(&self) -> Box<dyn IndexCalculator> {
        match self {
            Self::Ndvi => Box::new(NDVI::new(None)),
            Self::Vari => Box::new(VARI::new(None)),
            Self::Savi => Box::new(SAVI::new(SAVI::DEFAULT_SOIL_FACTOR, None)),
            Self::Evi => Box::new(EVI::new(None)),
        }
    }
}

impl fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `denominator + EPSILON`, replaced by `EPSILON` if the sum cancels to zero so
/// finite inputs always give finite outputs.
#[inline]
pub(crate) fn stable_denominator(denominator: f32) -> f32 {
    let d = denominator + EPSILON;
    if d == 0.0 {
        EPSILON
    } else {
        d
    }
}

pub(crate) fn require_nir(bands: &RasterBandSet) -> Result<&Raster<f32>> {
    bands
        .nir()
        .ok_or_else(|| AnalysisError::MissingBand(Band::Nir.to_string()))
}
