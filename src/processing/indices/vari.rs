// src/processing/indices/vari.rs
use rayon::prelude::*;

use super::{stable_denominator, IndexCalculator};
use crate::error::Result;
use crate::raster::{Band, IndexMap, Raster, RasterBandSet};

/// Visible Atmospherically Resistant Index (VARI) calculator.
///
/// Works from the visible bands alone, so it is available for imagery
/// without a near-infrared channel.
pub struct VARI {
    name: String,
}

impl VARI {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(|| "VARI".to_string()),
        }
    }
}

impl IndexCalculator for VARI {
    fn calculate(&self, bands: &RasterBandSet) -> Result<IndexMap> {
        let red = bands.red();
        let red_band = red.data();
        let green_band = bands.green().data();
        let blue_band = bands.blue().data();

        let mut result_data = vec![0.0f32; red.len()];

        result_data.par_iter_mut().enumerate().for_each(|(i, result)| {
            let red_val = red_band[i];
            let green_val = green_band[i];
            let blue_val = blue_band[i];

            // VARI = (GREEN - RED) / (GREEN + RED - BLUE)
            let vari = (green_val - red_val) / stable_denominator(green_val + red_val - blue_val);
            *result = vari.clamp(-1.0, 1.0);
        });

        Raster::new(red.shape(), result_data)
    }

    fn required_bands(&self) -> &'static [Band] {
        &[Band::Green, Band::Red, Band::Blue]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
