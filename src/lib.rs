// src/lib.rs
pub mod analysis;
pub mod area;
pub mod batch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod io;
pub mod pipeline;
pub mod processing;
pub mod raster;
pub mod store;
pub mod utils;
pub mod visualize;

pub use analysis::{AnalysisResult, ImageResult, UserAnalysisSummary};
pub use area::{AreaOfInterest, BBox};
pub use catalog::{CatalogClient, DateRange, ImageSource, RetrievalMode};
pub use error::{AnalysisError, Result};
pub use store::{AnalysisStore, FileStore, MemoryStore, RecordStore};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
