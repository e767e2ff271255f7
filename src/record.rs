//! Per-image annotation records in the VIA region-data layout read by the
//! training framework's dataset loader.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PrepError, Result};

pub const SOURCE_EXTENSION: &str = ".tif";
pub const CONVERTED_EXTENSION: &str = ".png";

/// Every footprint belongs to the single "building" class.
pub const BUILDING_CATEGORY: u32 = 0;

/// Output filename -> record, for one city or one merged split.
///
/// A `BTreeMap` keeps the written JSON stable across runs.
pub type AnnotationIndex = BTreeMap<String, AnnotationRecord>;

/// One building footprint in pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolygonRegion {
    pub all_points_x: Vec<i64>,
    pub all_points_y: Vec<i64>,
}

impl PolygonRegion {
    pub fn push(&mut self, x: i64, y: i64) {
        self.all_points_x.push(x);
        self.all_points_y.push(y);
    }

    pub fn len(&self) -> usize {
        self.all_points_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_points_x.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAttributes {
    pub name: String,
    pub all_points_x: Vec<i64>,
    pub all_points_y: Vec<i64>,
    pub category: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub shape_attributes: ShapeAttributes,
    #[serde(default)]
    pub region_attributes: Map<String, Value>,
}

impl From<PolygonRegion> for Region {
    fn from(polygon: PolygonRegion) -> Self {
        Region {
            shape_attributes: ShapeAttributes {
                name: "polygon".to_string(),
                all_points_x: polygon.all_points_x,
                all_points_y: polygon.all_points_y,
                category: BUILDING_CATEGORY,
            },
            region_attributes: Map::new(),
        }
    }
}

/// Annotation record for one converted image.
///
/// `file_ref`, `base64_img_data` and `file_attributes` are always empty but
/// must be present for the downstream loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub file_ref: String,
    pub size: u64,
    pub filename: String,
    pub base64_img_data: String,
    pub file_attributes: Map<String, Value>,
    #[serde(with = "region_map")]
    pub regions: Vec<Region>,
}

impl AnnotationRecord {
    pub fn new(filename: String, size: u64, regions: Vec<PolygonRegion>) -> Self {
        AnnotationRecord {
            file_ref: String::new(),
            size,
            filename,
            base64_img_data: String::new(),
            file_attributes: Map::new(),
            regions: regions.into_iter().map(Region::from).collect(),
        }
    }
}

/// Regions are written as `{"0": .., "1": .., ..}`; the keys are the
/// zero-based positions, contiguous and in order.
mod region_map {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Region;

    pub fn serialize<S: Serializer>(regions: &[Region], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(regions.len()))?;
        for (i, region) in regions.iter().enumerate() {
            map.serialize_entry(&i.to_string(), region)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Region>, D::Error> {
        let raw = BTreeMap::<String, Region>::deserialize(deserializer)?;
        let mut indexed = Vec::with_capacity(raw.len());
        for (key, region) in raw {
            let index: usize = key
                .parse()
                .map_err(|_| D::Error::custom(format!("region key {key:?} is not an index")))?;
            indexed.push((index, region));
        }
        indexed.sort_by_key(|(index, _)| *index);
        for (expected, (index, _)) in indexed.iter().enumerate() {
            if *index != expected {
                return Err(D::Error::custom(format!(
                    "region keys are not contiguous: expected {expected}, found {index}"
                )));
            }
        }
        Ok(indexed.into_iter().map(|(_, region)| region).collect())
    }
}

/// Swap the raster extension for the converted-image extension.
pub fn png_name(source_name: &str) -> Result<String> {
    let stem = source_name
        .strip_suffix(SOURCE_EXTENSION)
        .ok_or_else(|| PrepError::MissingExtension {
            name: source_name.to_string(),
            extension: SOURCE_EXTENSION.to_string(),
        })?;
    Ok(format!("{stem}{CONVERTED_EXTENSION}"))
}

/// Build the record for `raster_path`, reading its byte size from disk.
pub fn build_record(raster_path: &Path, regions: Vec<PolygonRegion>) -> Result<AnnotationRecord> {
    let source_name = raster_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PrepError::ImageId {
            name: raster_path.display().to_string(),
        })?;
    let filename = png_name(source_name)?;
    let size = fs::metadata(raster_path)
        .map_err(|e| PrepError::io(raster_path, e))?
        .len();
    debug!("{} -> {} ({} bytes, {} regions)", source_name, filename, size, regions.len());
    Ok(AnnotationRecord::new(filename, size, regions))
}

/// Write an index as compact JSON.
pub fn write_index(path: &Path, index: &AnnotationIndex) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
    }
    info!("Writing {} records to {}", index.len(), path.display());

    let file = File::create(path).map_err(|e| PrepError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, index).map_err(|source| PrepError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| PrepError::io(path, e))?;
    Ok(())
}

pub fn read_index(path: &Path) -> Result<AnnotationIndex> {
    let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PrepError::Json {
        path: path.to_path_buf(),
        source,
    })
}
