//! Raster access: georeference lookup for the GeoJSON city and band
//! extraction for PNG conversion.

use std::fs;
use std::path::Path;

use image::{ImageBuffer, RgbImage};
use log::{debug, info};

use crate::error::{PrepError, Result};
use crate::georef::GeoTransform;
use crate::progress::progress_bar;
use crate::record::png_name;

mod tiff_reader;
pub use tiff_reader::{geotransform_from_tags, TiffReader};

#[cfg(feature = "gdal")]
mod gdal_reader;
#[cfg(feature = "gdal")]
pub use gdal_reader::GdalReader;

#[cfg(test)]
mod test_support;

/// Band-separated pixel values of one raster.
#[derive(Debug, Clone, PartialEq)]
pub struct BandStack {
    pub width: u32,
    pub height: u32,
    pub bands: Vec<Vec<f64>>,
}

/// Source of raster metadata and pixels.
pub trait RasterReader {
    fn georeference(&self, path: &Path) -> Result<GeoTransform>;

    /// First `count` bands, each `width * height` values in row-major order.
    fn read_bands(&self, path: &Path, count: usize) -> Result<BandStack>;
}

#[cfg(feature = "gdal")]
pub type DefaultReader = GdalReader;
#[cfg(not(feature = "gdal"))]
pub type DefaultReader = TiffReader;

/// GDAL when built with the `gdal` feature, the pure-Rust TIFF reader otherwise.
pub fn default_reader() -> Box<dyn RasterReader> {
    Box::new(DefaultReader::default())
}

/// Min-max stretch to [0, 1]. A constant band becomes all zeros.
pub fn normalize_band(band: &mut [f64]) {
    if band.is_empty() {
        return;
    }
    let min = band.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = band.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if max > min {
        let range = max - min;
        for v in band.iter_mut() {
            *v = (*v - min) / range;
        }
    } else {
        band.fill(0.0);
    }
}

/// Stack the first three bands into an 8-bit RGB image.
///
/// Stretched values in [0, 1] are scaled by 255 and truncated; raw values
/// are clamped into the byte range.
pub fn bands_to_rgb(stack: &BandStack, normalize: bool) -> Result<RgbImage> {
    if stack.bands.len() < 3 {
        return Err(PrepError::Config {
            message: format!("need 3 bands for RGB output, got {}", stack.bands.len()),
        });
    }

    let mut bands: Vec<Vec<f64>> = stack.bands[..3].to_vec();
    if normalize {
        for band in bands.iter_mut() {
            normalize_band(band);
        }
    }
    let scale = if normalize { 255.0 } else { 1.0 };
    let to_byte = |v: f64| (v * scale).clamp(0.0, 255.0) as u8;

    let width = stack.width as usize;
    let mut img: RgbImage = ImageBuffer::new(stack.width, stack.height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let idx = y as usize * width + x as usize;
        *pixel = image::Rgb([
            to_byte(bands[0][idx]),
            to_byte(bands[1][idx]),
            to_byte(bands[2][idx]),
        ]);
    }
    Ok(img)
}

pub fn convert_to_png(
    reader: &dyn RasterReader,
    src: &Path,
    dst: &Path,
    normalize: bool,
) -> Result<()> {
    debug!("Converting {} -> {}", src.display(), dst.display());
    let stack = reader.read_bands(src, 3)?;
    let img = bands_to_rgb(&stack, normalize)?;
    img.save(dst).map_err(|source| PrepError::Image {
        path: dst.to_path_buf(),
        source,
    })
}

/// Convert `files` from `src_dir` into PNGs under `dst_dir`.
pub fn convert_split(
    reader: &dyn RasterReader,
    files: &[String],
    src_dir: &Path,
    dst_dir: &Path,
    normalize: bool,
) -> Result<usize> {
    fs::create_dir_all(dst_dir).map_err(|e| PrepError::io(dst_dir, e))?;
    info!(
        "Converting {} rasters from {} to {} (normalize={})",
        files.len(),
        src_dir.display(),
        dst_dir.display(),
        normalize
    );

    let bar = progress_bar(files.len(), format!("Converting to {}", dst_dir.display()));
    for file in files {
        let dst = dst_dir.join(png_name(file)?);
        convert_to_png(reader, &src_dir.join(file), &dst, normalize)?;
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(files.len())
}
