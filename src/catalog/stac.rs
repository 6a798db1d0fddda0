//! Blocking STAC client with tiler-backed raster fetches.
//!
//! Scene search goes through a STAC API (`POST /search`), raster access
//! through a titiler-style data API that crops an item's assets to a bounding
//! box: PNG for the display stretch, GeoTIFF for raw band samples.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use image::RgbImage;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::stac_models::{StacItemCollection, StacLink, StacSearchParams};
use super::{Band, CatalogClient, DateRange, SceneMeta};
use crate::area::BBox;
use crate::error::{AnalysisError, Result};
use crate::io::reader::{decode_rgb, decode_tiff};
use crate::raster::Raster;

/// Asset keys of the four bands in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandAssets {
    #[serde(default = "default_red_asset")]
    pub red: String,
    #[serde(default = "default_green_asset")]
    pub green: String,
    #[serde(default = "default_blue_asset")]
    pub blue: String,
    #[serde(default = "default_nir_asset")]
    pub nir: Option<String>,
}

fn default_red_asset() -> String {
    "B04".to_string()
}

fn default_green_asset() -> String {
    "B03".to_string()
}

fn default_blue_asset() -> String {
    "B02".to_string()
}

fn default_nir_asset() -> Option<String> {
    Some("B08".to_string())
}

impl Default for BandAssets {
    fn default() -> Self {
        Self {
            red: default_red_asset(),
            green: default_green_asset(),
            blue: default_blue_asset(),
            nir: default_nir_asset(),
        }
    }
}

impl BandAssets {
    pub fn asset(&self, band: Band) -> Option<&str> {
        match band {
            Band::Red => Some(&self.red),
            Band::Green => Some(&self.green),
            Band::Blue => Some(&self.blue),
            Band::Nir => self.nir.as_deref(),
        }
    }
}

/// Endpoints and collection layout of a STAC catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StacSettings {
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_data_api_url")]
    pub data_api_url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub assets: BandAssets,

    /// Display stretch applied to the true-colour PNG, in raw units.
    #[serde(default = "default_vis_rescale")]
    pub vis_rescale: (f64, f64),

    /// Ground sample distance of the band grid, in metres.
    #[serde(default = "default_band_resolution_m")]
    pub band_resolution_m: f64,

    /// Longest side of a fetched band, in pixels.
    #[serde(default = "default_max_band_size")]
    pub max_band_size: u32,

    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Upper bound on scenes collected across pages.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_url() -> String {
    "https://planetarycomputer.microsoft.com/api/stac/v1/search".to_string()
}

fn default_data_api_url() -> String {
    "https://planetarycomputer.microsoft.com/api/data/v1".to_string()
}

fn default_collection() -> String {
    "sentinel-2-l2a".to_string()
}

fn default_vis_rescale() -> (f64, f64) {
    (0.0, 3000.0)
}

fn default_band_resolution_m() -> f64 {
    10.0
}

fn default_max_band_size() -> u32 {
    2048
}

fn default_page_limit() -> u32 {
    100
}

fn default_max_items() -> usize {
    500
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for StacSettings {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            data_api_url: default_data_api_url(),
            collection: default_collection(),
            assets: BandAssets::default(),
            vis_rescale: default_vis_rescale(),
            band_resolution_m: default_band_resolution_m(),
            max_band_size: default_max_band_size(),
            page_limit: default_page_limit(),
            max_items: default_max_items(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Band grid size for `bbox` at `resolution_m`, longest side capped at `max`.
pub fn band_grid(bbox: &BBox, resolution_m: f64, max: u32) -> (u32, u32) {
    let (_, lat) = bbox.center();
    let ground_w = bbox.width_deg() * METRES_PER_DEGREE * lat.to_radians().cos();
    let ground_h = bbox.height_deg() * METRES_PER_DEGREE;
    let longest = (ground_w.max(ground_h) / resolution_m.max(f64::EPSILON)).ceil();
    bbox.pixel_dims((longest as u32).clamp(1, max.max(1)))
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::SourceUnavailable(format!("{}: {}", context, e))
}

pub struct StacCatalogClient {
    settings: StacSettings,
    client: Client,
}

impl StacCatalogClient {
    pub fn new(settings: StacSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| unavailable("building HTTP client", e))?;

        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &StacSettings {
        &self.settings
    }

    fn search_params(&self, bbox: &BBox, range: &DateRange, max_cloud_pct: f64) -> StacSearchParams {
        StacSearchParams {
            collections: vec![self.settings.collection.clone()],
            bbox: bbox.to_array().to_vec(),
            datetime: format!("{}T00:00:00Z/{}T23:59:59Z", range.start, range.end),
            limit: Some(self.settings.page_limit),
            query: Some(json!({ "eo:cloud_cover": { "lte": max_cloud_pct } })),
            token: None,
        }
    }

    fn post_search(&self, url: &str, body: &serde_json::Value) -> Result<StacItemCollection> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| unavailable("STAC search request", e))?;
        let response = check_status(response, "STAC search")?;
        response.json().map_err(|e| unavailable("parsing STAC response", e))
    }

    /// Fetch the page behind a `next` link. `body` is the request body for
    /// POST links, see [`next_request_body`].
    fn follow_next(&self, link: &StacLink, body: &serde_json::Value) -> Result<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();
        if method == "POST" {
            return self.post_search(&link.href, body);
        }

        let response = self
            .client
            .get(&link.href)
            .send()
            .map_err(|e| unavailable("STAC pagination", e))?;
        let response = check_status(response, "STAC pagination")?;
        response.json().map_err(|e| unavailable("parsing STAC response", e))
    }

    fn crop_url(&self, bbox: &BBox, size: (u32, u32), extension: &str) -> String {
        format!(
            "{}/item/crop/{},{},{},{}/{}x{}.{}",
            self.settings.data_api_url.trim_end_matches('/'),
            bbox.min_lon,
            bbox.min_lat,
            bbox.max_lon,
            bbox.max_lat,
            size.0,
            size.1,
            extension
        )
    }

    fn get_bytes(&self, url: &str, query: &[(&str, String)], context: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| unavailable(context, e))?;
        let response = check_status(response, context)?;
        let bytes = response.bytes().map_err(|e| unavailable(context, e))?;
        Ok(bytes.to_vec())
    }
}

/// Body for the request behind `link`: the link body merged over the previous
/// body when `merge` is set, the link body alone otherwise.
fn next_request_body(link: &StacLink, previous: &serde_json::Value) -> serde_json::Value {
    match (&link.body, link.merge.unwrap_or(false)) {
        (Some(next), true) => {
            let mut merged = previous.clone();
            if let (Some(base), Some(extra)) = (merged.as_object_mut(), next.as_object()) {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
            merged
        }
        (Some(next), false) => next.clone(),
        (None, _) => previous.clone(),
    }
}

fn check_status(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(AnalysisError::SourceUnavailable(format!(
        "{} returned HTTP {}: {}",
        context,
        status,
        body.chars().take(300).collect::<String>()
    )))
}

impl CatalogClient for StacCatalogClient {
    fn query_collection(&self, bbox: &BBox, range: &DateRange, max_cloud_pct: f64) -> Result<Vec<SceneMeta>> {
        let params = self.search_params(bbox, range, max_cloud_pct);
        let mut body = serde_json::to_value(&params)?;
        let mut page = self.post_search(&self.settings.search_url, &body)?;
        let mut scenes = Vec::new();

        loop {
            for item in page.features.drain(..) {
                let date = item
                    .properties
                    .datetime
                    .as_deref()
                    .and_then(|dt| dt.get(..10))
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
                match (date, item.properties.eo_cloud_cover) {
                    (Some(date), Some(cloud_pct)) => scenes.push(SceneMeta {
                        id: item.id,
                        date,
                        cloud_pct,
                    }),
                    _ => warn!(item = %item.id, "skipping item without datetime or cloud cover"),
                }
            }

            if scenes.len() >= self.settings.max_items {
                scenes.truncate(self.settings.max_items);
                break;
            }
            let Some(link) = page.next_link().cloned() else {
                break;
            };
            body = next_request_body(&link, &body);
            page = self.follow_next(&link, &body)?;
            if page.is_empty() {
                break;
            }
        }

        debug!(count = scenes.len(), "STAC search finished");
        Ok(scenes)
    }

    fn fetch_visualization(&self, scene_id: &str, bbox: &BBox, size: (u32, u32)) -> Result<RgbImage> {
        let assets = &self.settings.assets;
        let (lo, hi) = self.settings.vis_rescale;
        let query = vec![
            ("collection", self.settings.collection.clone()),
            ("item", scene_id.to_string()),
            ("assets", assets.red.clone()),
            ("assets", assets.green.clone()),
            ("assets", assets.blue.clone()),
            ("rescale", format!("{},{}", lo, hi)),
            ("nodata", "0".to_string()),
        ];
        let bytes = self.get_bytes(&self.crop_url(bbox, size, "png"), &query, "visualization fetch")?;
        decode_rgb(&bytes)
    }

    fn fetch_bands(&self, scene_id: &str, bbox: &BBox, bands: &[Band]) -> Result<BTreeMap<Band, Raster<f32>>> {
        let size = band_grid(bbox, self.settings.band_resolution_m, self.settings.max_band_size);
        let url = self.crop_url(bbox, size, "tif");
        let mut out = BTreeMap::new();

        for &band in bands {
            let Some(asset) = self.settings.assets.asset(band) else {
                debug!(band = %band, "no asset configured");
                continue;
            };
            let query = vec![
                ("collection", self.settings.collection.clone()),
                ("item", scene_id.to_string()),
                ("assets", asset.to_string()),
            ];
            let bytes = self.get_bytes(&url, &query, &format!("{} band fetch", band))?;
            // Zero is the L2A fill value
            out.insert(band, decode_tiff(&bytes, Some(0.0))?);
        }

        Ok(out)
    }
}
