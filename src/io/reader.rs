// src/io/reader.rs
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use tiff::decoder::{Decoder, DecodingResult};

use crate::error::{AnalysisError, Result};
use crate::raster::Raster;

fn decode_error(format: &'static str, e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Decode {
        format,
        reason: e.to_string(),
    }
}

/// Decode any PNG/JPEG payload into an RGB raster.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes).map_err(|e| decode_error("image", e))?;
    Ok(image.to_rgb8())
}

/// Decode a single-band TIFF into a float raster.
///
/// Pixels equal to `nodata` become NaN. A two-sample image is read as value
/// plus mask, with a zero mask marking the pixel undefined.
pub fn decode_tiff(bytes: &[u8], nodata: Option<f32>) -> Result<Raster<f32>> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| decode_error("tiff", e))?;
    let (width, height) = decoder.dimensions().map_err(|e| decode_error("tiff", e))?;
    let (width, height) = (width as usize, height as usize);

    let values: Vec<f32> = match decoder.read_image().map_err(|e| decode_error("tiff", e))? {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        _ => return Err(decode_error("tiff", "unsupported pixel type")),
    };

    let pixels = width * height;
    if pixels == 0 || values.len() % pixels != 0 {
        return Err(AnalysisError::DimensionMismatch {
            expected: (width, height),
            actual: (values.len(), 1),
        });
    }

    let samples = values.len() / pixels;
    let data = values
        .chunks_exact(samples)
        .map(|px| {
            let value = px[0];
            let masked = samples == 2 && px[1] == 0.0;
            if masked || nodata == Some(value) {
                f32::NAN
            } else {
                value
            }
        })
        .collect();

    Raster::new((width, height), data)
}

pub fn from_base64(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| decode_error("base64", e))
}
