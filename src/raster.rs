// src/raster.rs
use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Spectral bands used by the index engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Red,
    Green,
    Blue,
    Nir,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Red, Band::Green, Band::Blue, Band::Nir];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Red => "red",
            Band::Green => "green",
            Band::Blue => "blue",
            Band::Nir => "nir",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row-major 2D grid. Shape is `(width, height)`, matching GDAL buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    shape: (usize, usize),
    data: Vec<T>,
}

/// Per-pixel vegetation index values; NaN marks undefined pixels.
pub type IndexMap = Raster<f32>;

impl<T> Raster<T> {
    pub fn new(shape: (usize, usize), data: Vec<T>) -> Result<Self> {
        if data.len() != shape.0 * shape.1 {
            return Err(AnalysisError::DimensionMismatch {
                expected: shape,
                actual: (data.len(), 1),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn filled(shape: (usize, usize), value: T) -> Self
    where
        T: Clone,
    {
        Self {
            shape,
            data: vec![value; shape.0 * shape.1],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.shape.0
    }

    pub fn height(&self) -> usize {
        self.shape.1
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.shape.0 || y >= self.shape.1 {
            return None;
        }
        self.data.get(y * self.shape.0 + x)
    }
}

impl Raster<f32> {
    /// Iterator over the finite (valid) pixel values.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| v.is_finite())
    }
}

/// One image's extracted data.
///
/// All float bands share one shape; the visualization raster is display-only
/// and may have its own resolution.
#[derive(Debug, Clone)]
pub struct RasterBandSet {
    visualization: RgbImage,
    red: Raster<f32>,
    green: Raster<f32>,
    blue: Raster<f32>,
    nir: Option<Raster<f32>>,
}

impl RasterBandSet {
    pub fn new(
        visualization: RgbImage,
        red: Raster<f32>,
        green: Raster<f32>,
        blue: Raster<f32>,
        nir: Option<Raster<f32>>,
    ) -> Result<Self> {
        let expected = red.shape();
        let others = [Some(&green), Some(&blue), nir.as_ref()];
        for band in others.into_iter().flatten() {
            if band.shape() != expected {
                return Err(AnalysisError::DimensionMismatch {
                    expected,
                    actual: band.shape(),
                });
            }
        }

        Ok(Self {
            visualization,
            red,
            green,
            blue,
            nir,
        })
    }

    pub fn visualization(&self) -> &RgbImage {
        &self.visualization
    }

    pub fn red(&self) -> &Raster<f32> {
        &self.red
    }

    pub fn green(&self) -> &Raster<f32> {
        &self.green
    }

    pub fn blue(&self) -> &Raster<f32> {
        &self.blue
    }

    pub fn nir(&self) -> Option<&Raster<f32>> {
        self.nir.as_ref()
    }

    /// Shape shared by every float band.
    pub fn shape(&self) -> (usize, usize) {
        self.red.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(Raster::new((2, 2), vec![0.0f32; 3]).is_err());
        let r = Raster::new((3, 2), vec![0.0f32; 6]).unwrap();
        assert_eq!(r.width(), 3);
        assert_eq!(r.height(), 2);
    }

    #[test]
    fn get_is_row_major() {
        let r = Raster::new((2, 2), vec![1, 2, 3, 4]).unwrap();
        assert_eq!(r.get(1, 0), Some(&2));
        assert_eq!(r.get(0, 1), Some(&3));
        assert_eq!(r.get(2, 0), None);
    }

    #[test]
    fn band_set_requires_matching_shapes() {
        let vis = RgbImage::new(4, 4);
        let band = Raster::filled((2, 2), 0.1f32);
        let odd = Raster::filled((3, 2), 0.1f32);

        assert!(RasterBandSet::new(vis.clone(), band.clone(), band.clone(), band.clone(), None).is_ok());
        let err = RasterBandSet::new(vis, band.clone(), band.clone(), band, Some(odd)).unwrap_err();
        assert!(matches!(err, AnalysisError::DimensionMismatch { .. }));
    }
}
