//! SpaceNet building-solution tables: one CSV row per building polygon,
//! many rows per image.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::ParseMode;
use crate::error::{PrepError, Result};
use crate::record::PolygonRegion;
use crate::wkt;

#[derive(Debug, Deserialize)]
struct BuildingRow {
    #[serde(rename = "ImageId")]
    image_id: String,
    #[serde(rename = "PolygonWKT_Pix")]
    polygon_wkt_pix: String,
}

/// Pixel-space WKT values grouped by `ImageId`, in file order.
#[derive(Debug, Default)]
pub struct BuildingTable {
    rows: HashMap<String, Vec<String>>,
}

impl BuildingTable {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Reading building table {}", path.display());
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// `path` is only used for error context.
    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let mut table = BuildingTable::default();
        let mut count = 0usize;
        for result in csv_reader.deserialize() {
            let row: BuildingRow = result.map_err(|source| PrepError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            table.rows.entry(row.image_id).or_default().push(row.polygon_wkt_pix);
            count += 1;
        }
        info!("{} building rows for {} images", count, table.image_count());
        Ok(table)
    }

    pub fn image_count(&self) -> usize {
        self.rows.len()
    }

    /// Raw WKT values for `image_key`; empty when the image has no rows.
    pub fn polygons(&self, image_key: &str) -> &[String] {
        self.rows.get(image_key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pixel regions for one image.
    ///
    /// The first row carrying the empty sentinel ends the scan and discards
    /// every region collected so far for the image, so the record comes out
    /// with no regions even if other rows held polygons.
    pub fn regions(&self, image_key: &str, mode: ParseMode) -> Result<Vec<PolygonRegion>> {
        let mut regions = Vec::new();
        for (row, raw) in self.polygons(image_key).iter().enumerate() {
            match wkt::parse_pixel_polygon(raw) {
                Ok(Some(region)) => regions.push(region),
                Ok(None) => {
                    if !regions.is_empty() {
                        debug!("{}: EMPTY row {} drops {} earlier regions", image_key, row, regions.len());
                    }
                    regions.clear();
                    break;
                }
                Err(source) => {
                    let err = PrepError::Parse {
                        image_id: image_key.to_string(),
                        row,
                        raw: raw.clone(),
                        source,
                    };
                    match mode {
                        ParseMode::Strict => return Err(err),
                        ParseMode::Lenient => warn!("skipping polygon: {err}"),
                    }
                }
            }
        }
        Ok(regions)
    }
}
