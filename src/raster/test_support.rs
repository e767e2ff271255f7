use std::fs::File;
use std::path::Path;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

#[derive(Debug, Clone, Copy)]
pub enum RasterType {
    PixelIsArea = 1,
    PixelIsPoint = 2,
}

/// 2x2 RGB16 GeoTIFF: 0.5 unit pixels, tie point (0, 0) -> (10, 20).
pub fn write_geotiff(path: &Path, raster_type: RasterType) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder.new_image::<colortype::RGB16>(2, 2).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[0.5f64, 0.5, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 10.0, 20.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &[1u16, 1, 0, 1, 1025, 0, 1, raster_type as u16][..])
        .unwrap();
    let data: Vec<u16> = vec![
        1, 2, 3, 10, 20, 30, //
        100, 200, 300, 1000, 2000, 3000,
    ];
    image.write_data(&data).unwrap();
}
