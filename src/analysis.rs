//! Analysis records: the persisted result of one request and the lightweight
//! summary kept in each owner's recent-analyses list.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::area::{AreaOfInterest, BBox};
use crate::catalog::{DateRange, RetrievalMode};
use crate::processing::{IndexStatistics, VegetationIndex, ZoneStatistics};

/// Keys of the non-index artifacts in [`ImageResult::images`].
pub const RGB_IMAGE: &str = "rgb";
pub const NDVI_OVERLAY_IMAGE: &str = "ndvi_overlay";
pub const PROBLEM_ZONES_IMAGE: &str = "problem_zones";

/// Everything derived from one scene.
///
/// `images` holds base64 artifacts: the true-colour JPEG under `rgb`, one
/// grayscale JPEG per index under the index key, the transparent NDVI overlay
/// PNG and the problem-zone JPEG. An artifact that failed to render is an
/// empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub scene_id: String,
    pub date: NaiveDate,
    pub cloud_percentage: f64,
    pub images: BTreeMap<String, String>,
    pub statistics: BTreeMap<VegetationIndex, IndexStatistics>,
    pub zoning: BTreeMap<VegetationIndex, ZoneStatistics>,
}

impl ImageResult {
    pub fn mean(&self, index: VegetationIndex) -> Option<f64> {
        self.statistics
            .get(&index)
            .filter(|s| !s.is_empty())
            .map(|s| s.mean)
    }
}

/// An image dropped from a collection run, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedImage {
    pub scene_id: String,
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub source: String,
    pub resolution: String,
    pub retrieval_mode: RetrievalMode,
    pub max_cloud_pct: f64,
    #[serde(default)]
    pub skipped: Vec<SkippedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub timestamp: DateTime<Utc>,
    pub area_of_interest: AreaOfInterest,
    pub bbox: BBox,
    pub date_range: DateRange,
    pub image_count: usize,
    /// Sorted by acquisition date.
    pub results_per_image: Vec<ImageResult>,
    pub metadata: AnalysisMetadata,
}

/// Index means averaged over the images of an analysis; zero when no image
/// carried the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub ndvi_mean: f64,
    pub vari_mean: f64,
    pub evi_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnalysisSummary {
    pub analysis_id: String,
    pub timestamp: DateTime<Utc>,
    pub area_of_interest: AreaOfInterest,
    pub date_range: DateRange,
    pub image_count: usize,
    pub statistics_summary: StatisticsSummary,
}

impl UserAnalysisSummary {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let average = |index: VegetationIndex| {
            let means: Vec<f64> = result
                .results_per_image
                .iter()
                .filter_map(|r| r.mean(index))
                .collect();
            if means.is_empty() {
                0.0
            } else {
                means.iter().sum::<f64>() / means.len() as f64
            }
        };

        Self {
            analysis_id: result.analysis_id.clone(),
            timestamp: result.timestamp,
            area_of_interest: result.area_of_interest.clone(),
            date_range: result.date_range,
            image_count: result.image_count,
            statistics_summary: StatisticsSummary {
                ndvi_mean: average(VegetationIndex::Ndvi),
                vari_mean: average(VegetationIndex::Vari),
                evi_mean: average(VegetationIndex::Evi),
            },
        }
    }
}

/// Lifecycle of one analysis.
///
/// `Requested -> InProgress -> Stored | Failed`, then `Stored -> Deleted`.
/// `Failed` and `Deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Requested,
    InProgress,
    Stored,
    Failed,
    Deleted,
}

impl AnalysisState {
    pub fn can_transition_to(self, next: AnalysisState) -> bool {
        use AnalysisState::*;
        matches!(
            (self, next),
            (Requested, InProgress) | (Requested, Failed) | (InProgress, Stored) | (InProgress, Failed) | (Stored, Deleted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisState::Failed | AnalysisState::Deleted)
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisState::Requested => "requested",
            AnalysisState::InProgress => "in_progress",
            AnalysisState::Stored => "stored",
            AnalysisState::Failed => "failed",
            AnalysisState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}
