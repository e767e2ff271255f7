use std::path::Path;

use gdal::Dataset;
use log::{debug, info, warn};

use super::{BandStack, RasterReader};
use crate::error::{PrepError, Result};
use crate::georef::GeoTransform;

/// GDAL-backed reader for rasters the TIFF decoder cannot handle
/// (planar layouts, compression codecs outside the `tiff` crate).
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalReader;

fn open_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        return Err(PrepError::MissingSource {
            path: path.to_path_buf(),
        });
    }
    info!("Opening dataset: {}", path.display());
    let ds = Dataset::open(path).map_err(|e| PrepError::raster(path, e.to_string()))?;
    let (w, h) = ds.raster_size();
    debug!("Dataset size: {} x {} pixels", w, h);

    if ds.spatial_ref().is_err() {
        warn!("No spatial reference found in {}", path.display());
    }
    Ok(ds)
}

impl RasterReader for GdalReader {
    fn georeference(&self, path: &Path) -> Result<GeoTransform> {
        let ds = open_dataset(path)?;
        let gt = ds
            .geo_transform()
            .map_err(|e| PrepError::raster(path, e.to_string()))?;
        info!(
            "Geotransform: origin=({:.6}, {:.6}), pixel_size=({:.9}, {:.9})",
            gt[0], gt[3], gt[1], gt[5]
        );
        let gt = GeoTransform(gt);
        gt.check_north_up(&path.display().to_string());
        Ok(gt)
    }

    fn read_bands(&self, path: &Path, count: usize) -> Result<BandStack> {
        let ds = open_dataset(path)?;
        let (width, height) = ds.raster_size();
        let band_count = ds.raster_count() as usize;
        if band_count < count {
            return Err(PrepError::raster(
                path,
                format!("need {count} bands, raster has {band_count}"),
            ));
        }

        let mut bands = Vec::with_capacity(count);
        for b in 1..=count {
            debug!("Reading band {} of {}", b, band_count);
            let band = ds
                .rasterband(b as _)
                .map_err(|e| PrepError::raster(path, e.to_string()))?;
            let buffer = band
                .read_band_as::<f64>()
                .map_err(|e| PrepError::raster(path, e.to_string()))?;
            bands.push(buffer.data().to_vec());
        }

        Ok(BandStack {
            width: width as u32,
            height: height as u32,
            bands,
        })
    }
}
