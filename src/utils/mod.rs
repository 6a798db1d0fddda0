// src/utils/mod.rs
#[cfg(feature = "gdal")]
pub mod cache;

#[cfg(feature = "gdal")]
pub use cache::RasterCache;
