// src/processing/mod.rs
pub mod indices;
pub mod parallel;
pub mod resample;
pub mod stats;
pub mod zones;

// Re-export main components
pub use indices::{IndexCalculator, VegetationIndex};
pub use parallel::ParallelProcessor;
pub use stats::IndexStatistics;
pub use zones::{ZoneBand, ZoneClassifier, ZoneStatistics};
