// src/processing/indices/evi.rs
use rayon::prelude::*;

use super::{require_nir, stable_denominator, IndexCalculator};
use crate::error::Result;
use crate::raster::{Band, IndexMap, Raster, RasterBandSet};

/// Enhanced Vegetation Index (EVI) calculator
pub struct EVI {
    name: String,
}

// EVI coefficients from MODIS documentation
const G: f32 = 2.5; // Gain factor
const L: f32 = 1.0; // Canopy background adjustment
const C1: f32 = 6.0; // Aerosol resistance (red)
const C2: f32 = 7.5; // Aerosol resistance (blue)

impl EVI {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(|| "EVI".to_string()),
        }
    }
}

impl IndexCalculator for EVI {
    fn calculate(&self, bands: &RasterBandSet) -> Result<IndexMap> {
        let nir = require_nir(bands)?;
        let red = bands.red();
        let nir_band = nir.data();
        let red_band = red.data();
        let blue_band = bands.blue().data();

        let mut result_data = vec![0.0f32; red.len()];

        result_data.par_iter_mut().enumerate().for_each(|(i, result)| {
            let nir_val = nir_band[i];
            let red_val = red_band[i];
            let blue_val = blue_band[i];

            let denominator = nir_val + C1 * red_val - C2 * blue_val + L;
            *result = G * (nir_val - red_val) / stable_denominator(denominator);
        });

        Raster::new(red.shape(), result_data)
    }

    fn required_bands(&self) -> &'static [Band] {
        &[Band::Nir, Band::Red, Band::Blue]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
