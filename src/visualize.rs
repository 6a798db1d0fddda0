//! Rendering of index maps into display artifacts.
//!
//! Each renderer returns a `Result` so the caller decides whether a failed
//! artifact becomes a placeholder or aborts the job.

use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use itertools::{Itertools, MinMaxResult};
use rayon::prelude::*;
use thiserror::Error;

use crate::io::writer::{encode_gray_jpeg, encode_jpeg, encode_png};
use crate::processing::resample::resample_nearest;
use crate::raster::IndexMap;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("cannot render an empty raster")]
    EmptyRaster,

    #[error("raster of {width}x{height} pixels cannot be rendered")]
    ShapeMismatch { width: usize, height: usize },
}

/// Problem-zone highlight settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    /// Pixels whose index is strictly below this are highlighted.
    pub threshold: f32,
    pub color: [u8; 3],
    /// Weight of `color` in the blend, in [0, 1].
    pub opacity: f32,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            color: [255, 0, 0],
            opacity: 0.4,
        }
    }
}

fn dimensions(map: &IndexMap) -> Result<(u32, u32), RenderError> {
    if map.is_empty() {
        return Err(RenderError::EmptyRaster);
    }
    let (width, height) = map.shape();
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(RenderError::ShapeMismatch { width, height }),
    }
}

/// Linear stretch of the valid value range onto [0, 255]. Undefined pixels
/// and constant maps render black.
pub fn grayscale(map: &IndexMap) -> Result<GrayImage, RenderError> {
    let (width, height) = dimensions(map)?;
    let (min, max) = match map.valid_values().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
        _ => (0.0, 0.0),
    };
    let span = max - min;

    let pixels: Vec<u8> = map
        .data()
        .par_iter()
        .map(|&v| {
            if span > 0.0 && v.is_finite() {
                (255.0 * (v - min) / span) as u8
            } else {
                0
            }
        })
        .collect();

    GrayImage::from_raw(width, height, pixels).ok_or(RenderError::ShapeMismatch {
        width: map.width(),
        height: map.height(),
    })
}

/// Red to yellow to green ramp: red rises to full yellow at the midpoint,
/// then red fades out.
pub fn ramp(level: u8) -> [u8; 3] {
    let i = level as u16;
    if i < 128 {
        [255, (i * 2) as u8, 0]
    } else {
        [(255 - (i - 128) * 2) as u8, 255, 0]
    }
}

/// Colour overlay for map compositing. Values are clipped to [0, 1] before the
/// ramp; undefined pixels are fully transparent.
pub fn colorize(map: &IndexMap) -> Result<RgbaImage, RenderError> {
    let (width, height) = dimensions(map)?;
    let mut image = RgbaImage::new(width, height);

    image
        .par_chunks_mut(4)
        .zip(map.data().par_iter())
        .for_each(|(px, &v)| {
            if !v.is_finite() {
                px.copy_from_slice(&[0, 0, 0, 0]);
            } else {
                let [r, g, b] = ramp((v.clamp(0.0, 1.0) * 255.0) as u8);
                px.copy_from_slice(&[r, g, b, 255]);
            }
        });

    Ok(image)
}

/// Desaturate `visualization` and blend the highlight colour onto pixels whose
/// index is below the threshold. The map is resized to the visualization with
/// nearest-neighbour sampling first.
pub fn problem_zones(
    visualization: &RgbImage,
    map: &IndexMap,
    highlight: &Highlight,
) -> Result<RgbImage, RenderError> {
    dimensions(map)?;
    let (width, height) = visualization.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyRaster);
    }

    let resized = resample_nearest(map, (width as usize, height as usize)).map_err(|_| {
        RenderError::ShapeMismatch {
            width: map.width(),
            height: map.height(),
        }
    })?;

    let opacity = highlight.opacity.clamp(0.0, 1.0);
    let [cr, cg, cb] = highlight.color.map(|c| c as f32 * opacity);
    let mut output = RgbImage::new(width, height);

    for ((out, src), &v) in output
        .pixels_mut()
        .zip(visualization.pixels())
        .zip(resized.data())
    {
        let Luma([gray]) = luma(src);
        let g = gray as f32;
        *out = if v.is_finite() && v < highlight.threshold {
            let keep = 1.0 - opacity;
            Rgb([
                (g * keep + cr).round() as u8,
                (g * keep + cg).round() as u8,
                (g * keep + cb).round() as u8,
            ])
        } else {
            Rgb([gray, gray, gray])
        };
    }

    Ok(output)
}

/// ITU-R BT.601 luma.
fn luma(px: &Rgb<u8>) -> Luma<u8> {
    let [r, g, b] = px.0;
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    Luma([y.round().clamp(0.0, 255.0) as u8])
}

pub fn grayscale_jpeg(map: &IndexMap) -> Result<Vec<u8>, RenderError> {
    Ok(encode_gray_jpeg(&grayscale(map)?)?)
}

pub fn colorize_png(map: &IndexMap) -> Result<Vec<u8>, RenderError> {
    Ok(encode_png(&colorize(map)?)?)
}

pub fn problem_zones_jpeg(
    visualization: &RgbImage,
    map: &IndexMap,
    highlight: &Highlight,
) -> Result<Vec<u8>, RenderError> {
    Ok(encode_jpeg(&problem_zones(visualization, map, highlight)?)?)
}

pub fn rgb_jpeg(visualization: &RgbImage) -> Result<Vec<u8>, RenderError> {
    if visualization.width() == 0 || visualization.height() == 0 {
        return Err(RenderError::EmptyRaster);
    }
    Ok(encode_jpeg(visualization)?)
}
