// src/batch.rs
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::area::AreaOfInterest;
use crate::catalog::{DateRange, RetrievalMode};
use crate::store::{AnalysisStore, RecordStore};

#[derive(Deserialize, Serialize, Debug)]
pub struct BatchConfig {
    #[serde(default)]
    pub global: GlobalParams,
    pub requests: Vec<BatchRequest>,
}

/// Defaults applied to every request that does not override them.
#[derive(Deserialize, Serialize, Debug)]
pub struct GlobalParams {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            mode: RetrievalMode::default(),
            radius_km: default_radius_km(),
        }
    }
}

fn default_owner() -> String {
    "default".to_string()
}

fn default_radius_km() -> f64 {
    1.0
}

/// One analysis. A polygon wins over a point when both are given.
#[derive(Deserialize, Serialize, Debug)]
pub struct BatchRequest {
    pub owner: Option<String>,
    /// `[lon, lat]`
    pub point: Option<[f64; 2]>,
    pub radius_km: Option<f64>,
    pub polygon: Option<Vec<[f64; 2]>>,
    pub start: String,
    pub end: String,
    pub mode: Option<RetrievalMode>,
}

/// What happened to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub owner: String,
    pub result: std::result::Result<String, String>,
}

impl BatchRequest {
    fn run<S: RecordStore>(&self, global: &GlobalParams, store: &AnalysisStore<S>) -> crate::error::Result<String> {
        let owner = self.owner.as_deref().unwrap_or(&global.owner);
        let area = AreaOfInterest::from_parts(
            self.point.map(|[lon, lat]| (lon, lat)),
            self.radius_km.unwrap_or(global.radius_km),
            self.polygon.clone(),
        )?;
        let range = DateRange::parse(&self.start, &self.end)?;
        let mode = self.mode.unwrap_or(global.mode);
        Ok(store.perform(owner, &area, &range, mode)?.analysis_id)
    }
}

pub fn load_batch<P: AsRef<Path>>(config_path: P) -> Result<BatchConfig> {
    let path = config_path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("reading batch file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing batch file {}", path.display()))
}

/// Run every request of the batch file in order. A failing request is
/// reported and the rest still run.
pub fn process_batch<P: AsRef<Path>, S: RecordStore>(
    config_path: P,
    store: &AnalysisStore<S>,
) -> Result<Vec<BatchOutcome>> {
    let config = load_batch(config_path)?;
    Ok(run_batch(&config, store))
}

pub fn run_batch<S: RecordStore>(config: &BatchConfig, store: &AnalysisStore<S>) -> Vec<BatchOutcome> {
    let total = config.requests.len();
    info!(requests = total, "starting batch");

    let outcomes: Vec<BatchOutcome> = config
        .requests
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let owner = request.owner.clone().unwrap_or_else(|| config.global.owner.clone());
            let result = request.run(&config.global, store).map_err(|e| e.to_string());
            match &result {
                Ok(id) => info!("[{}/{}] {} -> analysis {}", i + 1, total, owner, id),
                Err(e) => error!("[{}/{}] {} failed: {}", i + 1, total, owner, e),
            }
            BatchOutcome { owner, result }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(succeeded = total - failed, failed, "batch complete");
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_defaults_fill_in() {
        let config: BatchConfig = serde_json::from_str(
            r#"{"requests": [{"point": [12.5, 41.9], "start": "2024-06-01", "end": "2024-06-30"}]}"#,
        )
        .unwrap();
        assert_eq!(config.global.owner, "default");
        assert_eq!(config.global.mode, RetrievalMode::Collection);
        assert_eq!(config.global.radius_km, 1.0);
        assert_eq!(config.requests[0].point, Some([12.5, 41.9]));
    }

    #[test]
    fn request_overrides_are_parsed() {
        let config: BatchConfig = serde_json::from_str(
            r#"{
                "global": {"owner": "farm", "mode": "single_best"},
                "requests": [{
                    "owner": "alice",
                    "polygon": [[0.0, 0.0], [0.01, 0.0], [0.01, 0.01]],
                    "start": "2024-01-01",
                    "end": "2024-03-31",
                    "mode": "collection"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.global.mode, RetrievalMode::SingleBest);
        assert_eq!(config.requests[0].mode, Some(RetrievalMode::Collection));
        assert_eq!(config.requests[0].polygon.as_ref().map(Vec::len), Some(3));
    }
}
