// tests/pipeline_tests.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use image::RgbImage;

use vegscan::analysis::{NDVI_OVERLAY_IMAGE, PROBLEM_ZONES_IMAGE, RGB_IMAGE};
use vegscan::area::BBox;
use vegscan::batch::{run_batch, BatchConfig};
use vegscan::catalog::{Band, SceneMeta};
use vegscan::error::Result;
use vegscan::pipeline::SceneAnalyzer;
use vegscan::processing::VegetationIndex;
use vegscan::raster::Raster;
use vegscan::{
    AnalysisError, AnalysisStore, AreaOfInterest, CatalogClient, DateRange, FileStore, ImageSource,
    MemoryStore, RecordStore, RetrievalMode,
};

/// Catalog serving constant 4x4 bands: NDVI 0.5 everywhere.
#[derive(Default)]
struct FakeCatalog {
    scenes: Vec<SceneMeta>,
    failing: HashSet<String>,
    without_nir: bool,
    calls: Arc<AtomicUsize>,
}

impl CatalogClient for FakeCatalog {
    fn query_collection(&self, _: &BBox, _: &DateRange, _: f64) -> Result<Vec<SceneMeta>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scenes.clone())
    }

    fn fetch_visualization(&self, _: &str, _: &BBox, size: (u32, u32)) -> Result<RgbImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(size.0, size.1, image::Rgb([90, 140, 60])))
    }

    fn fetch_bands(&self, scene_id: &str, _: &BBox, bands: &[Band]) -> Result<BTreeMap<Band, Raster<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(scene_id) {
            return Err(AnalysisError::SourceUnavailable(format!("{} timed out", scene_id)));
        }
        let mut out = BTreeMap::new();
        for &band in bands {
            let value = match band {
                Band::Red => 1000.0,
                Band::Green => 1500.0,
                Band::Blue => 500.0,
                Band::Nir if self.without_nir => continue,
                Band::Nir => 3000.0,
            };
            out.insert(band, Raster::filled((4, 4), value));
        }
        Ok(out)
    }
}

/// Memory store that counts writes.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    puts: AtomicUsize,
}

impl RecordStore for CountingStore {
    fn put(&self, owner: &str, key: &str, payload: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(owner, key, payload)
    }

    fn get(&self, owner: &str, key: &str) -> Result<Option<String>> {
        self.inner.get(owner, key)
    }

    fn delete(&self, owner: &str, key: &str) -> Result<bool> {
        self.inner.delete(owner, key)
    }
}

/// Memory store whose writes to `put_fails` and deletes under
/// `delete_fails` return a persistence error.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    put_fails: Option<&'static str>,
    delete_fails: Option<&'static str>,
}

impl RecordStore for FaultyStore {
    fn put(&self, owner: &str, key: &str, payload: &str) -> Result<()> {
        if self.put_fails == Some(key) {
            return Err(AnalysisError::Persistence("disk full".into()));
        }
        self.inner.put(owner, key, payload)
    }

    fn get(&self, owner: &str, key: &str) -> Result<Option<String>> {
        self.inner.get(owner, key)
    }

    fn delete(&self, owner: &str, key: &str) -> Result<bool> {
        if self.delete_fails.is_some_and(|prefix| key.starts_with(prefix)) {
            return Err(AnalysisError::Persistence("read-only".into()));
        }
        self.inner.delete(owner, key)
    }
}

fn scene(id: &str, date: &str, cloud: f64) -> SceneMeta {
    SceneMeta {
        id: id.into(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        cloud_pct: cloud,
    }
}

fn june_scenes() -> Vec<SceneMeta> {
    vec![
        scene("S2A_0620", "2024-06-20", 2.0),
        scene("S2B_0605", "2024-06-05", 0.5),
        scene("S2A_0612", "2024-06-12", 4.0),
    ]
}

fn store_with<S: RecordStore>(records: S, catalog: FakeCatalog) -> AnalysisStore<S> {
    let source = ImageSource::new(Box::new(catalog)).with_vis_size(8);
    AnalysisStore::new(records, source, SceneAnalyzer::default()).with_workers(2)
}

fn area() -> AreaOfInterest {
    AreaOfInterest::point_radius(12.49, 41.89, 0.3).unwrap()
}

fn june() -> DateRange {
    DateRange::parse("2024-06-01", "2024-06-30").unwrap()
}

#[test]
fn collection_analysis_covers_every_scene_in_date_order() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    );

    let result = store.perform_analysis("alice", &area(), &june()).unwrap();

    assert_eq!(result.image_count, 3);
    let ids: Vec<_> = result.results_per_image.iter().map(|r| r.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["S2B_0605", "S2A_0612", "S2A_0620"]);
    assert_eq!(result.metadata.resolution, "10m");
    assert_eq!(result.metadata.retrieval_mode, RetrievalMode::Collection);

    let first = &result.results_per_image[0];
    let ndvi = first.mean(VegetationIndex::Ndvi).unwrap();
    assert!((ndvi - 0.5).abs() < 1e-4);
    for key in [RGB_IMAGE, NDVI_OVERLAY_IMAGE, PROBLEM_ZONES_IMAGE, "ndvi", "vari", "savi", "evi"] {
        assert!(!first.images[key].is_empty(), "missing artifact {}", key);
    }
    let zones = &first.zoning[&VegetationIndex::Ndvi];
    assert_eq!(zones.get("medium"), Some(100.0));
}

#[test]
fn single_best_uses_least_cloudy_scene() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    );

    let result = store
        .perform("alice", &area(), &june(), RetrievalMode::SingleBest)
        .unwrap();

    assert_eq!(result.image_count, 1);
    assert_eq!(result.results_per_image[0].scene_id, "S2B_0605");
}

#[test]
fn empty_catalog_is_no_imagery_without_writes() {
    let store = store_with(CountingStore::default(), FakeCatalog::default());

    let err = store.perform_analysis("alice", &area(), &june()).unwrap_err();

    assert!(matches!(err, AnalysisError::NoImageryFound { .. }));
    assert_eq!(store.records().puts.load(Ordering::SeqCst), 0);
    assert!(store.list_summaries("alice").unwrap().is_empty());
}

#[test]
fn two_point_polygon_fails_before_any_catalog_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            calls: Arc::clone(&calls),
            ..Default::default()
        },
    );
    let config: BatchConfig = serde_json::from_str(
        r#"{"requests": [{"owner": "alice", "polygon": [[12.0, 41.0], [12.1, 41.1]],
            "start": "2024-06-01", "end": "2024-06-30"}]}"#,
    )
    .unwrap();

    let outcomes = run_batch(&config, &store);

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(store.records().is_empty());
    assert!(matches!(
        AreaOfInterest::polygon(vec![[12.0, 41.0], [12.1, 41.1]]),
        Err(AnalysisError::InvalidGeometry(_))
    ));
}

#[test]
fn delete_then_get_is_not_found() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    );
    let result = store.perform_analysis("alice", &area(), &june()).unwrap();

    store.delete("alice", &result.analysis_id).unwrap();

    assert!(matches!(
        store.get("alice", &result.analysis_id),
        Err(AnalysisError::NotFound { .. })
    ));
}

#[test]
fn failed_summary_write_leaves_no_record() {
    let store = store_with(
        FaultyStore {
            put_fails: Some("analyses"),
            ..Default::default()
        },
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    );

    let err = store.perform_analysis("alice", &area(), &june()).unwrap_err();

    assert!(matches!(err, AnalysisError::Persistence(_)));
    assert!(store.records().inner.is_empty());
    assert!(store.list_summaries("alice").unwrap().is_empty());
}

#[test]
fn failed_record_delete_keeps_summary_listed() {
    let store = store_with(
        FaultyStore {
            delete_fails: Some("analysis/"),
            ..Default::default()
        },
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    );
    let stored = store.perform_analysis("alice", &area(), &june()).unwrap();

    let err = store.delete("alice", &stored.analysis_id).unwrap_err();

    assert!(matches!(err, AnalysisError::Persistence(_)));
    assert!(store.get("alice", &stored.analysis_id).is_ok());
    let listed: Vec<String> = store
        .list_summaries("alice")
        .unwrap()
        .into_iter()
        .map(|s| s.analysis_id)
        .collect();
    assert_eq!(listed, vec![stored.analysis_id]);
}

#[test]
fn summaries_are_capped_and_most_recent_first() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    )
    .with_summary_cap(3);

    let ids: Vec<String> = (0..5)
        .map(|_| store.perform_analysis("alice", &area(), &june()).unwrap().analysis_id)
        .collect();

    let listed: Vec<String> = store
        .list_summaries("alice")
        .unwrap()
        .into_iter()
        .map(|s| s.analysis_id)
        .collect();
    assert_eq!(listed, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);

    // Records that fell off the list are still retrievable
    assert!(store.get("alice", &ids[0]).is_ok());
}

#[test]
fn stored_payload_round_trips_statistics_and_zoning() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            ..Default::default()
        },
    );
    let result = store.perform_analysis("alice", &area(), &june()).unwrap();

    let loaded = store.get("alice", &result.analysis_id).unwrap();

    assert_eq!(loaded.area_of_interest, result.area_of_interest);
    for (stored, original) in loaded.results_per_image.iter().zip(&result.results_per_image) {
        assert_eq!(stored.statistics, original.statistics);
        assert_eq!(stored.zoning, original.zoning);
    }
}

#[test]
fn failing_image_is_skipped_in_collection_mode() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            failing: HashSet::from(["S2A_0612".to_string()]),
            ..Default::default()
        },
    );

    let result = store.perform_analysis("alice", &area(), &june()).unwrap();

    assert_eq!(result.image_count, 2);
    assert_eq!(result.metadata.skipped.len(), 1);
    assert_eq!(result.metadata.skipped[0].scene_id, "S2A_0612");
    assert!(result.metadata.skipped[0].reason.contains("timed out"));
}

#[test]
fn all_images_failing_is_no_usable_imagery() {
    let store = store_with(
        CountingStore::default(),
        FakeCatalog {
            scenes: june_scenes(),
            failing: june_scenes().into_iter().map(|s| s.id).collect(),
            ..Default::default()
        },
    );

    let err = store.perform_analysis("alice", &area(), &june()).unwrap_err();

    assert!(matches!(err, AnalysisError::NoUsableImagery { attempted: 3 }));
    assert_eq!(store.records().puts.load(Ordering::SeqCst), 0);
}

#[test]
fn single_best_failure_is_surfaced() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            failing: HashSet::from(["S2B_0605".to_string()]),
            ..Default::default()
        },
    );

    let err = store
        .perform("alice", &area(), &june(), RetrievalMode::SingleBest)
        .unwrap_err();

    assert!(matches!(err, AnalysisError::SourceUnavailable(_)));
}

#[test]
fn scenes_without_nir_keep_vari_only() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: june_scenes(),
            without_nir: true,
            ..Default::default()
        },
    );

    let result = store.perform_analysis("alice", &area(), &june()).unwrap();

    let image = &result.results_per_image[0];
    let indices: Vec<_> = image.statistics.keys().copied().collect();
    assert_eq!(indices, vec![VegetationIndex::Vari]);
    assert!(image.zoning.is_empty());
    assert!(!image.images.contains_key(NDVI_OVERLAY_IMAGE));

    let summary = &store.list_summaries("alice").unwrap()[0];
    assert_eq!(summary.statistics_summary.ndvi_mean, 0.0);
    assert!(summary.statistics_summary.vari_mean > 0.0);
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = || FakeCatalog {
        scenes: june_scenes(),
        ..Default::default()
    };

    let analysis_id = {
        let store = store_with(FileStore::new(dir.path()).unwrap(), catalog());
        store.save_field("alice", "Vineyard", &area()).unwrap();
        store.perform_analysis("alice", &area(), &june()).unwrap().analysis_id
    };

    let reopened = store_with(FileStore::new(dir.path()).unwrap(), catalog());
    assert_eq!(reopened.get("alice", &analysis_id).unwrap().image_count, 3);
    assert_eq!(reopened.list_summaries("alice").unwrap().len(), 1);
    assert_eq!(reopened.list_fields("alice").unwrap()[0].name, "Vineyard");
    assert!(reopened.list_summaries("bob").unwrap().is_empty());
}

#[test]
fn history_reports_one_value_per_month() {
    let store = store_with(
        MemoryStore::new(),
        FakeCatalog {
            scenes: vec![
                scene("may_a", "2024-05-03", 3.0),
                scene("may_b", "2024-05-21", 1.0),
                scene("jun_a", "2024-06-09", 0.0),
            ],
            ..Default::default()
        },
    );
    let range = DateRange::parse("2024-05-01", "2024-06-30").unwrap();

    let history = store.ndvi_history(&area(), &range).unwrap();

    let months: Vec<_> = history.iter().map(|m| (m.month.as_str(), m.scene_id.as_str())).collect();
    assert_eq!(months, vec![("2024-05", "may_b"), ("2024-06", "jun_a")]);
    assert!(history.iter().all(|m| (m.mean_ndvi - 0.5).abs() < 1e-4));
}
