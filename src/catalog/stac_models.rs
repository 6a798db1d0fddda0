//! Serde models for STAC Item Search (`POST /search`), limited to the fields
//! scene selection needs.

use serde::{Deserialize, Serialize};

/// Body for `POST /search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacSearchParams {
    pub collections: Vec<String>,

    /// `[west, south, east, north]`
    pub bbox: Vec<f64>,

    /// RFC 3339 interval, `start/end`.
    pub datetime: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Property filters (STAC query extension).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<serde_json::Value>,

    /// Pagination token (next page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A page of search results (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    /// The `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    pub id: String,
    pub properties: StacItemProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime.
    #[serde(default)]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension).
    #[serde(rename = "eo:cloud_cover", default)]
    pub eo_cloud_cover: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,

    /// `"next"` links from POST searches usually carry `POST`.
    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub body: Option<serde_json::Value>,

    /// Merge `body` into the previous request body.
    #[serde(default)]
    pub merge: Option<bool>,
}
