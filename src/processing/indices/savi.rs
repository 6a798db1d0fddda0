// src/processing/indices/savi.rs
use rayon::prelude::*;

use super::{require_nir, stable_denominator, IndexCalculator};
use crate::error::Result;
use crate::raster::{Band, IndexMap, Raster, RasterBandSet};

/// Soil Adjusted Vegetation Index (SAVI) calculator
pub struct SAVI {
    soil_factor: f32,
    name: String,
}

impl SAVI {
    /// Soil brightness correction for intermediate vegetation cover
    pub const DEFAULT_SOIL_FACTOR: f32 = 0.5;

    pub fn new(soil_factor: f32, name: Option<String>) -> Self {
        Self {
            soil_factor,
            name: name.unwrap_or_else(|| "SAVI".to_string()),
        }
    }
}

impl IndexCalculator for SAVI {
    fn calculate(&self, bands: &RasterBandSet) -> Result<IndexMap> {
        let nir = require_nir(bands)?;
        let red = bands.red();
        let nir_band = nir.data();
        let red_band = red.data();

        let mut result_data = vec![0.0f32; red.len()];

        // Extract soil adjustment factor
        let l = self.soil_factor;

        // Left unclipped: the natural range exceeds [-1, 1] for some inputs
        result_data.par_iter_mut().enumerate().for_each(|(i, result)| {
            let nir_val = nir_band[i];
            let red_val = red_band[i];

            // SAVI = ((NIR - RED) / (NIR + RED + L)) * (1 + L)
            *result = ((nir_val - red_val) / stable_denominator(nir_val + red_val + l)) * (1.0 + l);
        });

        Raster::new(red.shape(), result_data)
    }

    fn required_bands(&self) -> &'static [Band] {
        &[Band::Nir, Band::Red]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
