//! Preparation of the SpaceNet building-footprint dataset for
//! instance-segmentation training.
//!
//! Rasters are converted to PNG, and the per-city building annotations
//! (GeoJSON in geographic coordinates, or CSV tables of pixel-space WKT)
//! are normalized into VIA-style region indexes, one per city and split,
//! then merged into `<split>/via_region_data.json`.

pub mod compile;
pub mod config;
pub mod dataset;
pub mod error;
pub mod georef;
pub mod merge;
pub mod pipeline;
pub mod raster;
pub mod record;
pub mod tabular;
pub mod wkt;

mod progress;

pub use compile::CityCompiler;
pub use config::{AnnotationSource, CityConfig, ParseMode, PipelineConfig};
pub use dataset::Split;
pub use error::{PrepError, Result};
pub use georef::GeoTransform;
pub use raster::{default_reader, RasterReader, TiffReader};
pub use record::{AnnotationIndex, AnnotationRecord, PolygonRegion};
