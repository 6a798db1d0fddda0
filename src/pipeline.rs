// src/pipeline.rs
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::analysis::{ImageResult, NDVI_OVERLAY_IMAGE, PROBLEM_ZONES_IMAGE, RGB_IMAGE};
use crate::catalog::SceneMeta;
use crate::error::{AnalysisError, Result};
use crate::io::writer::to_base64;
use crate::processing::{IndexStatistics, VegetationIndex, ZoneClassifier};
use crate::raster::RasterBandSet;
use crate::visualize::{self, Highlight, RenderError};

/// Per-scene work: indices, statistics, zoning and rendering.
pub struct SceneAnalyzer {
    classifier: ZoneClassifier,
    highlight: Highlight,
}

impl SceneAnalyzer {
    pub fn new(classifier: ZoneClassifier, highlight: Highlight) -> Self {
        Self {
            classifier,
            highlight,
        }
    }

    /// Indices that need a band the scene lacks are left out of the result.
    /// Any other failure aborts the scene. Rendering failures only blank the
    /// affected artifact.
    pub fn analyze(&self, scene: &SceneMeta, bands: &RasterBandSet) -> Result<ImageResult> {
        let mut images = BTreeMap::new();
        let mut statistics = BTreeMap::new();
        let mut zoning = BTreeMap::new();

        images.insert(
            RGB_IMAGE.to_string(),
            artifact(&scene.id, RGB_IMAGE, visualize::rgb_jpeg(bands.visualization())),
        );

        for index in VegetationIndex::ALL {
            let map = match index.calculator().calculate(bands) {
                Ok(map) => map,
                Err(AnalysisError::MissingBand(band)) => {
                    warn!(scene = %scene.id, index = %index, band = %band, "index skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };

            statistics.insert(index, IndexStatistics::compute(&map));
            images.insert(
                index.key().to_string(),
                artifact(&scene.id, index.key(), visualize::grayscale_jpeg(&map)),
            );

            if index == VegetationIndex::Ndvi {
                zoning.insert(index, self.classifier.classify(&map));
                images.insert(
                    NDVI_OVERLAY_IMAGE.to_string(),
                    artifact(&scene.id, NDVI_OVERLAY_IMAGE, visualize::colorize_png(&map)),
                );
                images.insert(
                    PROBLEM_ZONES_IMAGE.to_string(),
                    artifact(
                        &scene.id,
                        PROBLEM_ZONES_IMAGE,
                        visualize::problem_zones_jpeg(bands.visualization(), &map, &self.highlight),
                    ),
                );
            }
        }

        debug!(scene = %scene.id, indices = statistics.len(), "scene analysed");
        Ok(ImageResult {
            scene_id: scene.id.clone(),
            date: scene.date,
            cloud_percentage: scene.cloud_pct,
            images,
            statistics,
            zoning,
        })
    }
}

impl Default for SceneAnalyzer {
    fn default() -> Self {
        Self::new(ZoneClassifier::default(), Highlight::default())
    }
}

/// Base64 of a rendered artifact, or an empty placeholder if rendering failed.
fn artifact(scene_id: &str, name: &str, rendered: std::result::Result<Vec<u8>, RenderError>) -> String {
    match rendered {
        Ok(bytes) => to_base64(&bytes),
        Err(e) => {
            warn!(scene = %scene_id, artifact = name, error = %e, "rendering failed, using placeholder");
            String::new()
        }
    }
}
