// src/store/analyses.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::RecordStore;
use crate::analysis::{
    AnalysisMetadata, AnalysisResult, AnalysisState, SkippedImage, UserAnalysisSummary,
};
use crate::area::AreaOfInterest;
use crate::catalog::{DateRange, ImageSource, RetrievalMode};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::history::{self, MonthlyNdvi};
use crate::pipeline::SceneAnalyzer;
use crate::processing::ParallelProcessor;

const SUMMARY_KEY: &str = "analyses";
const FIELDS_KEY: &str = "fields";

fn record_key(analysis_id: &str) -> String {
    format!("analysis/{}", analysis_id)
}

/// A named area of interest kept for reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedField {
    pub id: String,
    pub name: String,
    pub area_of_interest: AreaOfInterest,
    pub created: DateTime<Utc>,
}

/// Runs analyses and owns every owner's persisted records.
///
/// Writes for one owner are serialized by a per-owner lock; different owners
/// never wait on each other.
pub struct AnalysisStore<S: RecordStore> {
    records: S,
    source: ImageSource,
    analyzer: SceneAnalyzer,
    processor: ParallelProcessor,
    summary_cap: usize,
    source_label: String,
    resolution: String,
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: RecordStore> AnalysisStore<S> {
    pub const DEFAULT_SUMMARY_CAP: usize = 50;

    pub fn new(records: S, source: ImageSource, analyzer: SceneAnalyzer) -> Self {
        Self {
            records,
            source,
            analyzer,
            processor: ParallelProcessor::default(),
            summary_cap: Self::DEFAULT_SUMMARY_CAP,
            source_label: "Sentinel-2 L2A".to_string(),
            resolution: "10m".to_string(),
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store wired from `config`, with the catalog client the config names.
    pub fn from_config(records: S, config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let source = config.image_source(config.catalog.build_client()?);
        Self::with_source(records, source, config)
    }

    /// Store over an already built source, with the rest taken from `config`.
    pub fn with_source(records: S, source: ImageSource, config: &AnalysisConfig) -> Result<Self> {
        Ok(Self::new(records, source, config.scene_analyzer()?)
            .with_summary_cap(config.summary_cap)
            .with_workers(config.workers)
            .with_metadata(&config.source_label, &config.resolution))
    }

    pub fn with_summary_cap(mut self, cap: usize) -> Self {
        self.summary_cap = cap.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.processor = ParallelProcessor::new(Some(workers));
        self
    }

    pub fn with_metadata(mut self, source_label: &str, resolution: &str) -> Self {
        self.source_label = source_label.to_string();
        self.resolution = resolution.to_string();
        self
    }

    pub fn records(&self) -> &S {
        &self.records
    }

    fn owner_lock(&self, owner: &str) -> Arc<Mutex<()>> {
        let mut locks = self.owner_locks.lock();
        Arc::clone(locks.entry(owner.to_string()).or_default())
    }

    /// Run the full pipeline over the selected scenes and persist the result.
    ///
    /// In collection mode a scene that fails is recorded in
    /// `metadata.skipped` and the rest carry on; the call fails only when no
    /// scene succeeds. In single-best mode the scene's error is returned.
    /// Nothing is written unless the analysis succeeds.
    pub fn perform(
        &self,
        owner: &str,
        area: &AreaOfInterest,
        range: &DateRange,
        mode: RetrievalMode,
    ) -> Result<AnalysisResult> {
        let mut state = AnalysisState::Requested;
        advance(&mut state, AnalysisState::InProgress, owner);

        match self.run(owner, area, range, mode) {
            Ok(result) => {
                advance(&mut state, AnalysisState::Stored, owner);
                Ok(result)
            }
            Err(e) => {
                advance(&mut state, AnalysisState::Failed, owner);
                warn!(owner, error = %e, "analysis failed");
                Err(e)
            }
        }
    }

    /// Multi-date analysis over every qualifying scene.
    pub fn perform_analysis(&self, owner: &str, area: &AreaOfInterest, range: &DateRange) -> Result<AnalysisResult> {
        self.perform(owner, area, range, RetrievalMode::Collection)
    }

    fn run(
        &self,
        owner: &str,
        area: &AreaOfInterest,
        range: &DateRange,
        mode: RetrievalMode,
    ) -> Result<AnalysisResult> {
        let bbox = area.bbox();
        let scenes = self.source.select(bbox, range, mode)?;
        let attempted = scenes.len();

        let outcomes = self.processor.process(scenes, |scene| {
            let outcome = self
                .source
                .resolve(&scene, bbox)
                .and_then(|bands| self.analyzer.analyze(&scene, &bands));
            (scene, outcome)
        });

        let mut results = Vec::with_capacity(attempted);
        let mut skipped = Vec::new();
        for (_, (scene, outcome)) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) if mode == RetrievalMode::SingleBest => return Err(e),
                Err(e) => {
                    let failure = AnalysisError::PartialBandFailure {
                        image_id: scene.id.clone(),
                        reason: e.to_string(),
                    };
                    warn!(owner, error = %failure, "image skipped");
                    skipped.push(SkippedImage {
                        scene_id: scene.id,
                        date: scene.date,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if results.is_empty() {
            return Err(AnalysisError::NoUsableImagery { attempted });
        }
        results.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.scene_id.cmp(&b.scene_id)));
        skipped.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.scene_id.cmp(&b.scene_id)));

        let lock = self.owner_lock(owner);
        let _guard = lock.lock();

        let timestamp = Utc::now();
        let analysis_id = self.allocate_id(owner, timestamp)?;
        let result = AnalysisResult {
            analysis_id: analysis_id.clone(),
            timestamp,
            area_of_interest: area.clone(),
            bbox: *bbox,
            date_range: *range,
            image_count: results.len(),
            results_per_image: results,
            metadata: AnalysisMetadata {
                source: self.source_label.clone(),
                resolution: self.resolution.clone(),
                retrieval_mode: mode,
                max_cloud_pct: self.source.max_cloud_pct(),
                skipped,
            },
        };

        let key = record_key(&analysis_id);
        self.records.put(owner, &key, &serde_json::to_string(&result)?)?;

        // The record only counts as stored once the summary list names it
        if let Err(e) = self.prepend_summary(owner, &result) {
            if let Err(cleanup) = self.records.delete(owner, &key) {
                warn!(owner, analysis_id = %analysis_id, error = %cleanup, "failed to roll back record");
            }
            return Err(e);
        }

        info!(
            owner,
            analysis_id = %analysis_id,
            images = result.image_count,
            skipped = result.metadata.skipped.len(),
            "analysis stored"
        );
        Ok(result)
    }

    /// Millisecond timestamp, bumped past any id the owner already uses.
    /// Callers hold the owner lock.
    fn allocate_id(&self, owner: &str, timestamp: DateTime<Utc>) -> Result<String> {
        let mut candidate = timestamp.timestamp_millis();
        while self.records.get(owner, &record_key(&candidate.to_string()))?.is_some() {
            candidate += 1;
        }
        Ok(candidate.to_string())
    }

    pub fn get(&self, owner: &str, analysis_id: &str) -> Result<AnalysisResult> {
        match self.records.get(owner, &record_key(analysis_id))? {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(not_found(owner, analysis_id)),
        }
    }

    /// Prune the analysis from the summary list, then remove its record. A
    /// failed record delete puts the list back. A record missing from the
    /// list is still deleted; a missing record is `NotFound`.
    pub fn delete(&self, owner: &str, analysis_id: &str) -> Result<()> {
        let lock = self.owner_lock(owner);
        let _guard = lock.lock();

        let summaries = self.load_summaries(owner)?;
        let pruned: Vec<UserAnalysisSummary> = summaries
            .iter()
            .filter(|s| s.analysis_id != analysis_id)
            .cloned()
            .collect();
        let listed = pruned.len() < summaries.len();
        if listed {
            self.save_summaries(owner, &pruned)?;
        }

        let existed = match self.records.delete(owner, &record_key(analysis_id)) {
            Ok(existed) => existed,
            Err(e) => {
                if listed {
                    if let Err(restore) = self.save_summaries(owner, &summaries) {
                        warn!(owner, analysis_id, error = %restore, "failed to restore summary list");
                    }
                }
                return Err(e);
            }
        };
        if existed && !listed {
            debug!(owner, analysis_id, "deleted record was not in the summary list");
        }

        if !existed {
            return Err(not_found(owner, analysis_id));
        }
        debug!(owner, analysis_id, state = %AnalysisState::Deleted, "analysis deleted");
        Ok(())
    }

    /// Most recent first.
    pub fn list_summaries(&self, owner: &str) -> Result<Vec<UserAnalysisSummary>> {
        self.load_summaries(owner)
    }

    fn load_summaries(&self, owner: &str) -> Result<Vec<UserAnalysisSummary>> {
        match self.records.get(owner, SUMMARY_KEY)? {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_summaries(&self, owner: &str, summaries: &[UserAnalysisSummary]) -> Result<()> {
        self.records.put(owner, SUMMARY_KEY, &serde_json::to_string(summaries)?)
    }

    fn prepend_summary(&self, owner: &str, result: &AnalysisResult) -> Result<()> {
        let mut summaries = self.load_summaries(owner)?;
        summaries.insert(0, UserAnalysisSummary::from_result(result));
        summaries.truncate(self.summary_cap);
        self.save_summaries(owner, &summaries)
    }

    pub fn save_field(&self, owner: &str, name: &str, area: &AreaOfInterest) -> Result<SavedField> {
        let lock = self.owner_lock(owner);
        let _guard = lock.lock();

        let mut fields = self.list_fields(owner)?;
        let created = Utc::now();
        let mut id = created.timestamp_millis();
        while fields.iter().any(|f| f.id == id.to_string()) {
            id += 1;
        }

        let field = SavedField {
            id: id.to_string(),
            name: name.trim().to_string(),
            area_of_interest: area.clone(),
            created,
        };
        fields.insert(0, field.clone());
        self.records.put(owner, FIELDS_KEY, &serde_json::to_string(&fields)?)?;
        debug!(owner, field = %field.id, "field saved");
        Ok(field)
    }

    /// Most recent first.
    pub fn list_fields(&self, owner: &str) -> Result<Vec<SavedField>> {
        match self.records.get(owner, FIELDS_KEY)? {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn delete_field(&self, owner: &str, field_id: &str) -> Result<()> {
        let lock = self.owner_lock(owner);
        let _guard = lock.lock();

        let mut fields = self.list_fields(owner)?;
        let before = fields.len();
        fields.retain(|f| f.id != field_id);
        if fields.len() == before {
            return Err(not_found(owner, field_id));
        }
        self.records.put(owner, FIELDS_KEY, &serde_json::to_string(&fields)?)
    }

    /// Monthly NDVI over `area`; not persisted.
    pub fn ndvi_history(&self, area: &AreaOfInterest, range: &DateRange) -> Result<Vec<MonthlyNdvi>> {
        history::ndvi_history(&self.source, &self.processor, area.bbox(), range)
    }
}

fn not_found(owner: &str, id: &str) -> AnalysisError {
    AnalysisError::NotFound {
        owner: owner.to_string(),
        id: id.to_string(),
    }
}

fn advance(state: &mut AnalysisState, next: AnalysisState, owner: &str) {
    debug_assert!(state.can_transition_to(next), "{} -> {}", state, next);
    debug!(owner, from = %state, to = %next, "analysis state");
    *state = next;
}
