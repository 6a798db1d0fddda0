//! Raster resampling onto a different pixel grid.
//!
//! Undefined (NaN) pixels are excluded from averages rather than treated as
//! zero; an output pixel covering only undefined input stays undefined.

use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::raster::Raster;

/// Area-weighted resampling. Each output pixel is the coverage-weighted mean
/// of the input pixels it overlaps, which is plain box averaging when
/// downsizing.
pub fn resample_area(src: &Raster<f32>, target: (usize, usize)) -> Result<Raster<f32>> {
    if src.shape() == target {
        return Ok(src.clone());
    }
    let (src_w, src_h) = src.shape();
    let (dst_w, dst_h) = target;
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return Ok(Raster::filled(target, f32::NAN));
    }

    let scale_x = src_w as f64 / dst_w as f64;
    let scale_y = src_h as f64 / dst_h as f64;
    let data = src.data();

    let mut out = vec![f32::NAN; dst_w * dst_h];
    out.par_chunks_mut(dst_w).enumerate().for_each(|(oy, row)| {
        let y0 = oy as f64 * scale_y;
        let y1 = y0 + scale_y;
        for (ox, cell) in row.iter_mut().enumerate() {
            let x0 = ox as f64 * scale_x;
            let x1 = x0 + scale_x;

            let mut sum = 0.0f64;
            let mut weight = 0.0f64;
            for sy in (y0.floor() as usize)..(y1.ceil() as usize).min(src_h) {
                let wy = overlap(y0, y1, sy as f64);
                if wy <= 0.0 {
                    continue;
                }
                for sx in (x0.floor() as usize)..(x1.ceil() as usize).min(src_w) {
                    let wx = overlap(x0, x1, sx as f64);
                    let v = data[sy * src_w + sx];
                    if wx <= 0.0 || !v.is_finite() {
                        continue;
                    }
                    sum += v as f64 * wx * wy;
                    weight += wx * wy;
                }
            }
            if weight > 0.0 {
                *cell = (sum / weight) as f32;
            }
        }
    });

    Raster::new(target, out)
}

/// Nearest-neighbour resampling; never invents intermediate values.
pub fn resample_nearest<T: Copy + Send + Sync>(
    src: &Raster<T>,
    target: (usize, usize),
) -> Result<Raster<T>> {
    let (src_w, src_h) = src.shape();
    let (dst_w, dst_h) = target;
    if src_w == 0 || src_h == 0 {
        return Err(AnalysisError::DimensionMismatch {
            expected: target,
            actual: src.shape(),
        });
    }

    let scale_x = src_w as f64 / dst_w.max(1) as f64;
    let scale_y = src_h as f64 / dst_h.max(1) as f64;
    let data = src.data();

    let out: Vec<T> = (0..dst_w * dst_h)
        .into_par_iter()
        .map(|i| {
            let (ox, oy) = (i % dst_w, i / dst_w);
            let sx = (((ox as f64 + 0.5) * scale_x) as usize).min(src_w - 1);
            let sy = (((oy as f64 + 0.5) * scale_y) as usize).min(src_h - 1);
            data[sy * src_w + sx]
        })
        .collect();

    Raster::new(target, out)
}

/// Length of `[a, b)` intersected with the unit cell `[cell, cell + 1)`.
fn overlap(a: f64, b: f64, cell: f64) -> f64 {
    (b.min(cell + 1.0) - a.max(cell)).max(0.0)
}
