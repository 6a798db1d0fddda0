// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::stac::{StacCatalogClient, StacSettings};
use crate::catalog::{CatalogClient, ImageSource};
use crate::error::AnalysisError;
use crate::pipeline::SceneAnalyzer;
use crate::processing::zones::{default_ndvi_zones, ZoneBand, ZoneClassifier};
use crate::visualize::Highlight;

/// Where imagery comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogConfig {
    /// A STAC API plus its raster data API.
    Stac(StacSettings),
    /// GeoTIFF scenes listed in a manifest; needs the `gdal` feature.
    Local { manifest: PathBuf },
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig::Stac(StacSettings::default())
    }
}

impl CatalogConfig {
    pub fn build_client(&self) -> crate::error::Result<Box<dyn CatalogClient>> {
        match self {
            CatalogConfig::Stac(settings) => Ok(Box::new(StacCatalogClient::new(settings.clone())?)),
            #[cfg(feature = "gdal")]
            CatalogConfig::Local { manifest } => {
                Ok(Box::new(crate::catalog::local::LocalCatalogClient::open(manifest)?))
            }
            #[cfg(not(feature = "gdal"))]
            CatalogConfig::Local { .. } => Err(AnalysisError::Config(
                "local catalogs need a build with the `gdal` feature".into(),
            )),
        }
    }
}

/// Analysis settings, loaded from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Scenes with more cloud cover than this percentage are ignored.
    #[serde(default = "default_max_cloud_pct")]
    pub max_cloud_pct: f64,

    /// Longest side of the visualization raster, in pixels.
    #[serde(default = "default_vis_size")]
    pub vis_size: u32,

    /// Raw band values are divided by this before index math.
    #[serde(default = "default_reflectance_scale")]
    pub reflectance_scale: f32,

    /// Entries kept in each owner's recent-analyses list.
    #[serde(default = "default_summary_cap")]
    pub summary_cap: usize,

    #[serde(default = "default_problem_threshold")]
    pub problem_threshold: f32,

    #[serde(default = "default_problem_color")]
    pub problem_color: [u8; 3],

    #[serde(default = "default_problem_opacity")]
    pub problem_opacity: f32,

    #[serde(default = "default_ndvi_zones")]
    pub zones: Vec<ZoneBand>,

    /// Worker threads for per-image processing.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_source_label")]
    pub source_label: String,

    #[serde(default = "default_resolution")]
    pub resolution: String,
}

fn default_max_cloud_pct() -> f64 {
    ImageSource::DEFAULT_MAX_CLOUD_PCT
}

fn default_vis_size() -> u32 {
    ImageSource::DEFAULT_VIS_SIZE
}

fn default_reflectance_scale() -> f32 {
    ImageSource::DEFAULT_REFLECTANCE_SCALE
}

fn default_summary_cap() -> usize {
    50
}

fn default_problem_threshold() -> f32 {
    0.2
}

fn default_problem_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_problem_opacity() -> f32 {
    0.4
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_source_label() -> String {
    "Sentinel-2 L2A".to_string()
}

fn default_resolution() -> String {
    "10m".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            max_cloud_pct: default_max_cloud_pct(),
            vis_size: default_vis_size(),
            reflectance_scale: default_reflectance_scale(),
            summary_cap: default_summary_cap(),
            problem_threshold: default_problem_threshold(),
            problem_color: default_problem_color(),
            problem_opacity: default_problem_opacity(),
            zones: default_ndvi_zones(),
            workers: default_workers(),
            source_label: default_source_label(),
            resolution: default_resolution(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, mid-analysis.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0.0..=100.0).contains(&self.max_cloud_pct) {
            return Err(AnalysisError::Config(format!(
                "max_cloud_pct must be within 0..=100, got {}",
                self.max_cloud_pct
            )));
        }
        if self.vis_size == 0 || self.summary_cap == 0 {
            return Err(AnalysisError::Config("vis_size and summary_cap must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.problem_opacity) {
            return Err(AnalysisError::Config(format!(
                "problem_opacity must be within 0..=1, got {}",
                self.problem_opacity
            )));
        }
        ZoneClassifier::new(self.zones.clone())?;
        Ok(())
    }

    pub fn highlight(&self) -> Highlight {
        Highlight {
            threshold: self.problem_threshold,
            color: self.problem_color,
            opacity: self.problem_opacity,
        }
    }

    pub fn scene_analyzer(&self) -> crate::error::Result<SceneAnalyzer> {
        Ok(SceneAnalyzer::new(ZoneClassifier::new(self.zones.clone())?, self.highlight()))
    }

    /// Image source over `client` with this config's selection settings.
    pub fn image_source(&self, client: Box<dyn CatalogClient>) -> ImageSource {
        ImageSource::new(client)
            .with_max_cloud_pct(self.max_cloud_pct)
            .with_vis_size(self.vis_size)
            .with_reflectance_scale(self.reflectance_scale)
    }
}
