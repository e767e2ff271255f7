use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, info};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::{BandStack, RasterReader};
use crate::error::{PrepError, Result};
use crate::georef::GeoTransform;

/// Reads GeoTIFF tags and chunky (pixel-interleaved) sample data.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffReader;

impl TiffReader {
    fn open(path: &Path) -> Result<Decoder<BufReader<File>>> {
        info!("Opening raster: {}", path.display());
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        Decoder::new(BufReader::new(file)).map_err(|e| PrepError::raster(path, e.to_string()))
    }
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag, path: &Path) -> Result<Option<Vec<f64>>> {
    let value = decoder
        .find_tag(tag)
        .map_err(|e| PrepError::raster(path, e.to_string()))?;
    value
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(|e| PrepError::raster(path, e.to_string()))
}

/// GDAL-ordered geotransform from GeoTIFF model tags.
///
/// `ModelTransformationTag` wins when present; otherwise the first tie point
/// and the pixel scale define a north-up transform.
pub fn geotransform_from_tags(
    transformation: Option<&[f64]>,
    pixel_scale: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
) -> Option<GeoTransform> {
    if let Some(m) = transformation.filter(|m| m.len() >= 8) {
        return Some(GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]]));
    }

    match (pixel_scale, tiepoint) {
        (Some(scale), Some(tp)) if scale.len() >= 2 && tp.len() >= 6 => {
            let (sx, sy) = (scale[0], scale[1]);
            let origin_x = tp[3] - tp[0] * sx;
            let origin_y = tp[4] + tp[1] * sy;
            Some(GeoTransform::north_up(origin_x, origin_y, sx, -sy))
        }
        _ => None,
    }
}

const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Inline value of `key` in a GeoKey directory.
///
/// The directory is a 4-short header (version, revision, minor, key count)
/// followed by one `[key, location, count, value]` entry per key. Keys
/// stored in other tags (non-zero location) are not resolved.
pub fn geo_key(directory: &[u16], key: u16) -> Option<u16> {
    let count = usize::from(*directory.get(3)?);
    directory
        .get(4..)?
        .chunks_exact(4)
        .take(count)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

/// Rasters whose tie points address pixel centres get their origin moved
/// back half a pixel onto the corner, the way GDAL reports them.
pub fn corner_origin(gt: GeoTransform, directory: Option<&[u16]>) -> GeoTransform {
    let raster_type = directory.and_then(|d| geo_key(d, GT_RASTER_TYPE_GEO_KEY));
    if raster_type != Some(RASTER_PIXEL_IS_POINT) {
        return gt;
    }
    let [x0, px_w, row_rot, y0, col_rot, px_h] = gt.0;
    debug!("PixelIsPoint raster, shifting origin half a pixel");
    GeoTransform([
        x0 - 0.5 * (px_w + row_rot),
        px_w,
        row_rot,
        y0 - 0.5 * (col_rot + px_h),
        col_rot,
        px_h,
    ])
}

fn into_f64(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
    }
}

impl RasterReader for TiffReader {
    fn georeference(&self, path: &Path) -> Result<GeoTransform> {
        let mut decoder = Self::open(path)?;
        let transformation = f64_tag(&mut decoder, Tag::ModelTransformationTag, path)?;
        let scale = f64_tag(&mut decoder, Tag::ModelPixelScaleTag, path)?;
        let tiepoint = f64_tag(&mut decoder, Tag::ModelTiepointTag, path)?;

        let geo_keys = decoder
            .find_tag(Tag::GeoKeyDirectoryTag)
            .and_then(|v| v.map(|v| v.into_u16_vec()).transpose())
            .map_err(|e| PrepError::raster(path, e.to_string()))?;

        let gt = geotransform_from_tags(transformation.as_deref(), scale.as_deref(), tiepoint.as_deref())
            .ok_or_else(|| PrepError::raster(path, "no GeoTIFF model tags"))?;
        let gt = corner_origin(gt, geo_keys.as_deref());
        let (origin_x, origin_y) = gt.origin();
        let (pixel_width, pixel_height) = gt.pixel_size();
        info!(
            "Geotransform: origin=({:.6}, {:.6}), pixel_size=({:.9}, {:.9})",
            origin_x, origin_y, pixel_width, pixel_height
        );
        gt.check_north_up(&path.display().to_string());
        Ok(gt)
    }

    fn read_bands(&self, path: &Path, count: usize) -> Result<BandStack> {
        let mut decoder = Self::open(path)?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PrepError::raster(path, e.to_string()))?;
        let samples = into_f64(
            decoder
                .read_image()
                .map_err(|e| PrepError::raster(path, e.to_string()))?,
        );

        let pixels = width as usize * height as usize;
        if pixels == 0 || samples.len() % pixels != 0 {
            return Err(PrepError::raster(
                path,
                format!("{} samples do not tile a {}x{} image", samples.len(), width, height),
            ));
        }
        let available = samples.len() / pixels;
        debug!("{}: {}x{} pixels, {} bands", path.display(), width, height, available);
        if available < count {
            return Err(PrepError::raster(
                path,
                format!("need {count} bands, raster has {available}"),
            ));
        }

        let bands = (0..count)
            .map(|b| samples.iter().skip(b).step_by(available).copied().collect())
            .collect();
        Ok(BandStack { width, height, bands })
    }
}
