//! Per-city annotation compiler: one [`AnnotationIndex`] per city and split.

use std::fs;
use std::path::{Path, PathBuf};

use geojson::GeoJson;
use log::{debug, info, warn};

use crate::config::{AnnotationSource, CityConfig, ParseMode};
use crate::dataset::{image_number, Split};
use crate::error::{PrepError, Result};
use crate::georef::first_ring;
use crate::progress::progress_bar;
use crate::raster::RasterReader;
use crate::record::{build_record, write_index, AnnotationIndex, AnnotationRecord, PolygonRegion};
use crate::tabular::BuildingTable;

enum LoadedSource {
    GeoJson,
    Tabular(BuildingTable),
}

/// Footprints of one image as found in its source, before they are
/// normalized to pixel regions.
enum Footprints {
    Pixel(Vec<PolygonRegion>),
    Geographic(Vec<Vec<(f64, f64)>>),
}

impl Footprints {
    /// The raster is opened only for geographic footprints, and only when
    /// there is at least one of them.
    fn into_regions(self, raster: &Path, reader: &dyn RasterReader) -> Result<Vec<PolygonRegion>> {
        match self {
            Footprints::Pixel(regions) => Ok(regions),
            Footprints::Geographic(rings) if rings.is_empty() => Ok(Vec::new()),
            Footprints::Geographic(rings) => {
                let gt = reader.georeference(raster)?;
                Ok(rings.iter().map(|ring| gt.project_ring(ring)).collect())
            }
        }
    }
}

/// Polygon rings of a GeoJSON sidecar; `None` when the file does not exist.
fn read_sidecar(path: &Path) -> Result<Option<Vec<Vec<(f64, f64)>>>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PrepError::io(path, e)),
    };
    let document = text.parse::<GeoJson>().map_err(|source| PrepError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    let geometries: Vec<geojson::Value> = match document {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry.map(|g| g.value))
            .collect(),
        GeoJson::Feature(feature) => feature.geometry.map(|g| g.value).into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry.value],
    };

    let mut rings = Vec::with_capacity(geometries.len());
    for value in &geometries {
        match first_ring(value) {
            Some(ring) => rings.push(ring),
            None => warn!("{}: skipping a geometry without a polygon ring", path.display()),
        }
    }
    Ok(Some(rings))
}

/// `<output_root>/<split>/AOI_<id>_<name>_region_data.json`
pub fn city_index_path(output_root: &Path, split: Split, city: &CityConfig) -> PathBuf {
    split.dir(output_root).join(city.index_file_name())
}

pub struct CityCompiler<'a> {
    city: &'a CityConfig,
    source: LoadedSource,
    reader: &'a dyn RasterReader,
    mode: ParseMode,
}

impl<'a> CityCompiler<'a> {
    /// Loads the city's building table up front when it has one.
    pub fn new(city: &'a CityConfig, reader: &'a dyn RasterReader, mode: ParseMode) -> Result<Self> {
        let source = match &city.annotations {
            AnnotationSource::GeoJson { .. } => LoadedSource::GeoJson,
            AnnotationSource::Tabular { csv } => LoadedSource::Tabular(BuildingTable::load(csv)?),
        };
        Ok(CityCompiler {
            city,
            source,
            reader,
            mode,
        })
    }

    fn footprints(&self, file: &str) -> Result<Footprints> {
        let number = image_number(file)?;
        match &self.source {
            LoadedSource::GeoJson => {
                let sidecar = self
                    .city
                    .annotations
                    .sidecar_path(&number)
                    .ok_or_else(|| PrepError::Config {
                        message: format!("AOI_{} has no GeoJSON directory", self.city.tag()),
                    })?;
                match read_sidecar(&sidecar)? {
                    Some(rings) => Ok(Footprints::Geographic(rings)),
                    None => {
                        warn!("{}: sidecar {} not found, no regions", file, sidecar.display());
                        Ok(Footprints::Geographic(Vec::new()))
                    }
                }
            }
            LoadedSource::Tabular(table) => {
                let key = self.city.image_key(&number);
                let regions = table.regions(&key, self.mode)?;
                if table.polygons(&key).is_empty() {
                    debug!("{}: no rows for {}", file, key);
                }
                Ok(Footprints::Pixel(regions))
            }
        }
    }

    /// Record for one raster in the city's image directory.
    pub fn compile_image(&self, file: &str) -> Result<AnnotationRecord> {
        let raster = self.city.image_dir.join(file);
        let regions = self.footprints(file)?.into_regions(&raster, self.reader)?;
        if regions.iter().any(PolygonRegion::is_empty) {
            warn!("{}: footprint without vertices", file);
        }
        let vertices: usize = regions.iter().map(PolygonRegion::len).sum();
        debug!("{}: {} regions, {} vertices", file, regions.len(), vertices);
        build_record(&raster, regions)
    }

    pub fn compile(&self, files: &[String], split: Split) -> Result<AnnotationIndex> {
        info!("Compiling {} {} images for AOI_{}", files.len(), split, self.city.tag());
        let bar = progress_bar(files.len(), format!("AOI_{} {}", self.city.tag(), split));

        let mut index = AnnotationIndex::new();
        let mut regions = 0usize;
        let mut empty = 0usize;
        for file in files {
            bar.set_message(file.clone());
            let record = self.compile_image(file)?;
            regions += record.regions.len();
            if record.regions.is_empty() {
                empty += 1;
            }
            index.insert(record.filename.clone(), record);
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "AOI_{} {}: {} records, {} regions, {} without buildings",
            self.city.tag(),
            split,
            index.len(),
            regions,
            empty
        );
        Ok(index)
    }

    pub fn compile_and_write(&self, files: &[String], split: Split, output_root: &Path) -> Result<PathBuf> {
        let index = self.compile(files, split)?;
        let path = city_index_path(output_root, split, self.city);
        write_index(&path, &index)?;
        Ok(path)
    }
}
