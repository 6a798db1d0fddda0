//! Monthly NDVI time series over an area.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::area::BBox;
use crate::catalog::{DateRange, ImageSource, SceneMeta};
use crate::error::{AnalysisError, Result};
use crate::processing::indices::NDVI;
use crate::processing::{IndexStatistics, ParallelProcessor};

/// Mean NDVI of the least cloudy scene of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyNdvi {
    /// `YYYY-MM`
    pub month: String,
    pub scene_id: String,
    pub cloud_percentage: f64,
    pub mean_ndvi: f64,
}

/// Least cloudy scene per `YYYY-MM`, earliest on ties, in month order.
pub fn best_per_month(scenes: Vec<SceneMeta>) -> BTreeMap<String, SceneMeta> {
    let mut months: BTreeMap<String, SceneMeta> = BTreeMap::new();
    for scene in scenes {
        let month = scene.date.format("%Y-%m").to_string();
        let better = months.get(&month).map_or(true, |best| {
            scene.cloud_pct < best.cloud_pct || (scene.cloud_pct == best.cloud_pct && scene.date < best.date)
        });
        if better {
            months.insert(month, scene);
        }
    }
    months
}

/// Query the collection once, then compute the mean NDVI of each month's best
/// scene. Months whose scene fails are skipped; if every month fails the
/// call fails with `NoUsableImagery`.
pub fn ndvi_history(
    source: &ImageSource,
    processor: &ParallelProcessor,
    bbox: &BBox,
    range: &DateRange,
) -> Result<Vec<MonthlyNdvi>> {
    let months = best_per_month(source.filtered_collection(bbox, range)?);
    let attempted = months.len();

    let outcomes = processor.process(months.into_iter().collect(), |(month, scene)| {
        let mean = source
            .resolve_red_nir(&scene, bbox)
            .and_then(|(red, nir)| NDVI::from_bands(&nir, &red))
            .map(|map| IndexStatistics::compute(&map));
        (month, scene, mean)
    });

    let mut history: Vec<MonthlyNdvi> = outcomes
        .into_iter()
        .filter_map(|(_, (month, scene, stats))| match stats {
            Ok(stats) if !stats.is_empty() => Some(MonthlyNdvi {
                month,
                scene_id: scene.id,
                cloud_percentage: scene.cloud_pct,
                mean_ndvi: stats.mean,
            }),
            Ok(_) => {
                warn!(month = %month, scene = %scene.id, "no valid NDVI pixels");
                None
            }
            Err(e) => {
                warn!(month = %month, scene = %scene.id, error = %e, "month skipped");
                None
            }
        })
        .collect();

    if history.is_empty() {
        return Err(AnalysisError::NoUsableImagery { attempted });
    }

    history.sort_by(|a, b| a.month.cmp(&b.month));
    info!(months = history.len(), "NDVI history computed");
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scene(id: &str, date: &str, cloud: f64) -> SceneMeta {
        SceneMeta {
            id: id.into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            cloud_pct: cloud,
        }
    }

    #[test]
    fn keeps_least_cloudy_scene_per_month() {
        let months = best_per_month(vec![
            scene("a", "2024-05-03", 4.0),
            scene("b", "2024-05-20", 1.0),
            scene("c", "2024-06-01", 2.0),
            scene("d", "2024-06-15", 2.0),
        ]);

        let picked: Vec<_> = months.values().map(|s| s.id.as_str()).collect();
        assert_eq!(picked, vec!["b", "c"]);
        assert_eq!(months.keys().next().map(String::as_str), Some("2024-05"));
    }
}
