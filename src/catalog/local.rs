//! Offline catalog over GeoTIFF scenes listed in a JSON manifest.
//!
//! Bands must be single-band rasters in geographic coordinates (EPSG:4326).
//! Paths in the manifest are relative to the manifest's directory.
//!
//! ```json
//! { "scenes": [ { "id": "S2B_20240602", "date": "2024-06-02", "cloud_pct": 1.4,
//!                 "bands": { "red": "b04.tif", "green": "b03.tif",
//!                            "blue": "b02.tif", "nir": "b08.tif" } } ] }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Band, CatalogClient, DateRange, SceneMeta};
use crate::area::BBox;
use crate::error::{AnalysisError, Result};
use crate::processing::resample::resample_area;
use crate::raster::Raster;
use crate::utils::cache::RasterCache;

#[derive(Debug, Clone, Deserialize)]
struct ManifestScene {
    id: String,
    date: NaiveDate,
    cloud_pct: f64,
    bands: BTreeMap<Band, PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    scenes: Vec<ManifestScene>,
    /// Raw value mapped to full brightness in the visualization.
    #[serde(default = "default_vis_max")]
    vis_max: f32,
}

fn default_vis_max() -> f32 {
    3000.0
}

pub struct LocalCatalogClient {
    root: PathBuf,
    manifest: Manifest,
    cache: RasterCache,
}

impl LocalCatalogClient {
    pub fn open<P: AsRef<Path>>(manifest_path: P) -> Result<Self> {
        let path = manifest_path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| AnalysisError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!(scenes = manifest.scenes.len(), "loaded scene manifest");

        Ok(Self {
            root,
            manifest,
            cache: RasterCache::new(),
        })
    }

    fn scene(&self, scene_id: &str) -> Result<&ManifestScene> {
        self.manifest
            .scenes
            .iter()
            .find(|s| s.id == scene_id)
            .ok_or_else(|| AnalysisError::SourceUnavailable(format!("unknown scene {}", scene_id)))
    }

    fn footprint(&self, path: &Path) -> Result<BBox> {
        let dataset = self.cache.get_dataset(self.root.join(path))?;
        let dataset = dataset.lock();
        let gt = dataset.geo_transform().map_err(gdal_error)?;
        let (cols, rows) = dataset.raster_size();
        let (x0, y0) = (gt[0], gt[3]);
        let (x1, y1) = (gt[0] + cols as f64 * gt[1], gt[3] + rows as f64 * gt[5]);

        Ok(BBox {
            min_lon: x0.min(x1),
            min_lat: y0.min(y1),
            max_lon: x0.max(x1),
            max_lat: y0.max(y1),
        })
    }

    /// Read the pixel window covering `bbox`; nodata becomes NaN.
    fn read_window(&self, path: &Path, bbox: &BBox) -> Result<Raster<f32>> {
        let dataset = self.cache.get_dataset(self.root.join(path))?;
        let dataset = dataset.lock();
        let gt = dataset.geo_transform().map_err(gdal_error)?;
        let (cols, rows) = dataset.raster_size();

        let col = |lon: f64| ((lon - gt[0]) / gt[1]).clamp(0.0, cols as f64);
        let row = |lat: f64| ((lat - gt[3]) / gt[5]).clamp(0.0, rows as f64);
        let (c0, c1) = (col(bbox.min_lon).floor(), col(bbox.max_lon).ceil());
        let (r0, r1) = {
            let (a, b) = (row(bbox.max_lat), row(bbox.min_lat));
            (a.min(b).floor(), a.max(b).ceil())
        };
        let size = ((c1 - c0) as usize, (r1 - r0) as usize);
        if size.0 == 0 || size.1 == 0 {
            return Err(AnalysisError::SourceUnavailable(format!(
                "{} does not cover the requested area",
                path.display()
            )));
        }

        let band = dataset.rasterband(1).map_err(gdal_error)?;
        let nodata = band.no_data_value();
        let buffer = band
            .read_as::<f32>((c0 as isize, r0 as isize), size, size, None)
            .map_err(gdal_error)?;
        let (_, mut data) = buffer.into_shape_and_vec();
        if let Some(nodata) = nodata {
            data.iter_mut()
                .filter(|v| (**v as f64) == nodata)
                .for_each(|v| *v = f32::NAN);
        }

        Raster::new(size, data)
    }
}

fn gdal_error(e: gdal::errors::GdalError) -> AnalysisError {
    AnalysisError::SourceUnavailable(e.to_string())
}

impl CatalogClient for LocalCatalogClient {
    fn query_collection(&self, bbox: &BBox, range: &DateRange, max_cloud_pct: f64) -> Result<Vec<SceneMeta>> {
        let mut scenes = Vec::new();
        for scene in &self.manifest.scenes {
            if !range.contains(scene.date) || scene.cloud_pct > max_cloud_pct {
                continue;
            }
            let Some(red) = scene.bands.get(&Band::Red) else {
                warn!(scene = %scene.id, "manifest scene has no red band");
                continue;
            };
            if self.footprint(red)?.intersects(bbox) {
                scenes.push(SceneMeta {
                    id: scene.id.clone(),
                    date: scene.date,
                    cloud_pct: scene.cloud_pct,
                });
            }
        }
        Ok(scenes)
    }

    fn fetch_visualization(&self, scene_id: &str, bbox: &BBox, size: (u32, u32)) -> Result<RgbImage> {
        let scene = self.scene(scene_id)?;
        let target = (size.0 as usize, size.1 as usize);
        let mut channels = Vec::with_capacity(3);
        for band in [Band::Red, Band::Green, Band::Blue] {
            let path = scene
                .bands
                .get(&band)
                .ok_or_else(|| AnalysisError::MissingBand(band.to_string()))?;
            channels.push(resample_area(&self.read_window(path, bbox)?, target)?);
        }

        let vis_max = self.manifest.vis_max;
        let byte = |v: f32| {
            if v.is_finite() {
                (v / vis_max * 255.0).clamp(0.0, 255.0) as u8
            } else {
                0
            }
        };
        Ok(RgbImage::from_fn(size.0, size.1, |x, y| {
            let i = y as usize * target.0 + x as usize;
            Rgb([
                byte(channels[0].data()[i]),
                byte(channels[1].data()[i]),
                byte(channels[2].data()[i]),
            ])
        }))
    }

    fn fetch_bands(&self, scene_id: &str, bbox: &BBox, bands: &[Band]) -> Result<BTreeMap<Band, Raster<f32>>> {
        let scene = self.scene(scene_id)?;
        let mut out = BTreeMap::new();
        for &band in bands {
            if let Some(path) = scene.bands.get(&band) {
                out.insert(band, self.read_window(path, bbox)?);
            }
        }
        Ok(out)
    }
}
