//! Imagery catalog boundary and scene resolution.
//!
//! [`CatalogClient`] is the seam to an external catalog (a STAC API, or a
//! local GeoTIFF manifest with the `gdal` feature). [`ImageSource`] sits on top
//! of a client and turns catalog hits into aligned [`RasterBandSet`]s.

pub mod stac;
pub mod stac_models;

#[cfg(feature = "gdal")]
pub mod local;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Months, NaiveDate};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::area::BBox;
use crate::error::{AnalysisError, Result};
use crate::processing::resample::resample_area;
pub use crate::raster::Band;
use crate::raster::{Raster, RasterBandSet};

/// Catalog metadata for one acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    pub id: String,
    pub date: NaiveDate,
    pub cloud_pct: f64,
}

/// Inclusive acquisition date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AnalysisError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two ISO `YYYY-MM-DD` dates.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| AnalysisError::InvalidDateRange(format!("'{}': {}", s, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// The `months` months up to and including `end`.
    pub fn trailing_months(end: NaiveDate, months: u32) -> Result<Self> {
        let start = end
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| AnalysisError::InvalidDateRange(format!("{} months before {}", months, end)))?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start, self.end)
    }
}

/// How many scenes an analysis draws from the filtered collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Only the least cloudy scene.
    SingleBest,
    /// Every scene passing the cloud filter.
    #[default]
    Collection,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleBest => f.write_str("single_best"),
            Self::Collection => f.write_str("collection"),
        }
    }
}

/// An external optical-imagery catalog.
///
/// Implementations surface transport failures as
/// [`AnalysisError::SourceUnavailable`] and never retry.
pub trait CatalogClient: Send + Sync {
    /// Scenes intersecting `bbox` within `range` whose cloud cover does not
    /// exceed `max_cloud_pct`.
    fn query_collection(&self, bbox: &BBox, range: &DateRange, max_cloud_pct: f64) -> Result<Vec<SceneMeta>>;

    /// Display-stretched 8-bit true-colour raster of `size` pixels.
    fn fetch_visualization(&self, scene_id: &str, bbox: &BBox, size: (u32, u32)) -> Result<RgbImage>;

    /// Raw per-band samples over `bbox`. Bands the scene lacks are omitted
    /// from the map rather than reported as errors.
    fn fetch_bands(&self, scene_id: &str, bbox: &BBox, bands: &[Band]) -> Result<BTreeMap<Band, Raster<f32>>>;
}

/// Scene selection and band extraction over a [`CatalogClient`].
pub struct ImageSource {
    client: Box<dyn CatalogClient>,
    max_cloud_pct: f64,
    vis_size: u32,
    reflectance_scale: f32,
}

impl ImageSource {
    pub const DEFAULT_MAX_CLOUD_PCT: f64 = 5.0;
    pub const DEFAULT_VIS_SIZE: u32 = 512;
    pub const DEFAULT_REFLECTANCE_SCALE: f32 = 10_000.0;

    pub fn new(client: Box<dyn CatalogClient>) -> Self {
        Self {
            client,
            max_cloud_pct: Self::DEFAULT_MAX_CLOUD_PCT,
            vis_size: Self::DEFAULT_VIS_SIZE,
            reflectance_scale: Self::DEFAULT_REFLECTANCE_SCALE,
        }
    }

    pub fn with_max_cloud_pct(mut self, max_cloud_pct: f64) -> Self {
        self.max_cloud_pct = max_cloud_pct;
        self
    }

    pub fn with_vis_size(mut self, vis_size: u32) -> Self {
        self.vis_size = vis_size.max(1);
        self
    }

    /// Raw digital numbers are divided by `scale`; `1.0` leaves them as is.
    pub fn with_reflectance_scale(mut self, scale: f32) -> Self {
        self.reflectance_scale = if scale > 0.0 { scale } else { 1.0 };
        self
    }

    pub fn max_cloud_pct(&self) -> f64 {
        self.max_cloud_pct
    }

    /// Cloud-filtered scenes in date order. Single-best mode keeps only the
    /// least cloudy one, the earliest on ties.
    pub fn select(&self, bbox: &BBox, range: &DateRange, mode: RetrievalMode) -> Result<Vec<SceneMeta>> {
        let mut scenes = self.filtered_collection(bbox, range)?;

        if mode == RetrievalMode::SingleBest {
            let best = scenes
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.cloud_pct.total_cmp(&b.cloud_pct))
                .map(|(i, _)| i)
                .unwrap_or(0);
            scenes = vec![scenes.swap_remove(best)];
        }

        info!(mode = %mode, count = scenes.len(), "selected scenes");
        Ok(scenes)
    }

    /// Query the catalog and re-apply the cloud and date filters, failing with
    /// `NoImageryFound` when nothing qualifies.
    pub fn filtered_collection(&self, bbox: &BBox, range: &DateRange) -> Result<Vec<SceneMeta>> {
        debug!(range = %range, max_cloud_pct = self.max_cloud_pct, "querying catalog");
        let mut scenes: Vec<SceneMeta> = self
            .client
            .query_collection(bbox, range, self.max_cloud_pct)?
            .into_iter()
            .filter(|s| s.cloud_pct <= self.max_cloud_pct && range.contains(s.date))
            .collect();

        if scenes.is_empty() {
            return Err(AnalysisError::NoImageryFound {
                start: range.start.to_string(),
                end: range.end.to_string(),
                max_cloud_pct: self.max_cloud_pct,
            });
        }

        scenes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        info!(count = scenes.len(), "catalog returned qualifying scenes");
        Ok(scenes)
    }

    /// Fetch the visualization and the scientific bands of one scene and align
    /// every band to the red band's grid.
    pub fn resolve(&self, scene: &SceneMeta, bbox: &BBox) -> Result<RasterBandSet> {
        let visualization = self
            .client
            .fetch_visualization(&scene.id, bbox, bbox.pixel_dims(self.vis_size))?;
        let mut bands = self.fetch_scaled(scene, bbox, &Band::ALL)?;

        let red = take_band(&mut bands, Band::Red)?;
        let target = red.shape();
        let green = resample_area(&take_band(&mut bands, Band::Green)?, target)?;
        let blue = resample_area(&take_band(&mut bands, Band::Blue)?, target)?;
        let nir = match bands.remove(&Band::Nir) {
            Some(nir) => Some(resample_area(&nir, target)?),
            None => {
                debug!(scene = %scene.id, "scene has no near-infrared band");
                None
            }
        };

        RasterBandSet::new(visualization, red, green, blue, nir)
    }

    /// Red and near-infrared only, aligned to red. Used by the NDVI history.
    pub fn resolve_red_nir(&self, scene: &SceneMeta, bbox: &BBox) -> Result<(Raster<f32>, Raster<f32>)> {
        let mut bands = self.fetch_scaled(scene, bbox, &[Band::Red, Band::Nir])?;
        let red = take_band(&mut bands, Band::Red)?;
        let nir = resample_area(&take_band(&mut bands, Band::Nir)?, red.shape())?;
        Ok((red, nir))
    }

    fn fetch_scaled(&self, scene: &SceneMeta, bbox: &BBox, wanted: &[Band]) -> Result<BTreeMap<Band, Raster<f32>>> {
        let mut bands = self.client.fetch_bands(&scene.id, bbox, wanted)?;
        if self.reflectance_scale != 1.0 {
            let scale = self.reflectance_scale;
            for raster in bands.values_mut() {
                raster.data_mut().iter_mut().for_each(|v| *v /= scale);
            }
        }
        Ok(bands)
    }
}

fn take_band(bands: &mut BTreeMap<Band, Raster<f32>>, band: Band) -> Result<Raster<f32>> {
    bands
        .remove(&band)
        .ok_or_else(|| AnalysisError::MissingBand(band.to_string()))
}
