// src/processing/indices/ndvi.rs
use rayon::prelude::*;

use super::{require_nir, stable_denominator, IndexCalculator};
use crate::error::{AnalysisError, Result};
use crate::raster::{Band, IndexMap, Raster, RasterBandSet};

/// Normalized Difference Vegetation Index (NDVI) calculator
pub struct NDVI {
    name: String,
}

impl NDVI {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(|| "NDVI".to_string()),
        }
    }

    /// NDVI straight from a red and a near-infrared band of the same shape.
    pub fn from_bands(nir: &Raster<f32>, red: &Raster<f32>) -> Result<IndexMap> {
        if nir.shape() != red.shape() {
            return Err(AnalysisError::DimensionMismatch {
                expected: red.shape(),
                actual: nir.shape(),
            });
        }
        let nir_band = nir.data();
        let red_band = red.data();

        // Preallocate result buffer
        let mut result_data = vec![0.0f32; red.len()];

        // NaN inputs stay NaN through the arithmetic and the clamp
        result_data.par_iter_mut().enumerate().for_each(|(i, result)| {
            let nir_val = nir_band[i];
            let red_val = red_band[i];

            // NDVI = (NIR - RED) / (NIR + RED)
            let ndvi = (nir_val - red_val) / stable_denominator(nir_val + red_val);
            *result = ndvi.clamp(-1.0, 1.0);
        });

        Raster::new(red.shape(), result_data)
    }
}

impl IndexCalculator for NDVI {
    fn calculate(&self, bands: &RasterBandSet) -> Result<IndexMap> {
        Self::from_bands(require_nir(bands)?, bands.red())
    }

    fn required_bands(&self) -> &'static [Band] {
        &[Band::Nir, Band::Red]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
