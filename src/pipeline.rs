//! End-to-end drivers behind the CLI subcommands.

use std::path::PathBuf;

use log::info;

use crate::compile::{city_index_path, CityCompiler};
use crate::config::{CityConfig, PipelineConfig};
use crate::dataset::{list_rasters, train_val_split, Split};
use crate::error::Result;
use crate::merge::merge_split;
use crate::raster::{convert_split, RasterReader};
use crate::record::SOURCE_EXTENSION;

/// Train and val file names for one city. Annotation and conversion both
/// call this, so they see the same split.
pub fn city_split(config: &PipelineConfig, city: &CityConfig) -> Result<(Vec<String>, Vec<String>)> {
    let files = list_rasters(&city.image_dir, SOURCE_EXTENSION)?;
    let (train, val) = train_val_split(&files, config.val_fraction, config.seed);
    info!(
        "AOI_{}: {} rasters, {} train / {} val",
        city.tag(),
        files.len(),
        train.len(),
        val.len()
    );
    Ok((train, val))
}

/// Compile every city for train and val, then merge each split.
/// Returns the merged index paths.
pub fn annotate(config: &PipelineConfig, reader: &dyn RasterReader) -> Result<Vec<PathBuf>> {
    for city in &config.cities {
        let (train, val) = city_split(config, city)?;
        let compiler = CityCompiler::new(city, reader, config.parse_mode)?;
        compiler.compile_and_write(&train, Split::Train, &config.output_root)?;
        compiler.compile_and_write(&val, Split::Val, &config.output_root)?;
    }

    [Split::Train, Split::Val]
        .into_iter()
        .map(|split| merge(config, split))
        .collect()
}

/// Merge the already written per-city indexes of one split.
pub fn merge(config: &PipelineConfig, split: Split) -> Result<PathBuf> {
    let paths: Vec<PathBuf> = config
        .cities
        .iter()
        .map(|city| city_index_path(&config.output_root, split, city))
        .collect();
    merge_split(&paths, &split.dir(&config.output_root))
}

/// Convert train/val rasters, plus test rasters where configured.
pub fn convert(config: &PipelineConfig, reader: &dyn RasterReader) -> Result<usize> {
    let mut converted = 0;
    for city in &config.cities {
        let (train, val) = city_split(config, city)?;
        for (split, files) in [(Split::Train, &train), (Split::Val, &val)] {
            converted += convert_split(
                reader,
                files,
                &city.image_dir,
                &split.dir(&config.output_root),
                city.normalize,
            )?;
        }

        if let Some(test_dir) = &city.test_dir {
            let test = list_rasters(test_dir, SOURCE_EXTENSION)?;
            converted += convert_split(
                reader,
                &test,
                test_dir,
                &Split::Test.dir(&config.output_root),
                city.normalize,
            )?;
        }
        info!("Done converting AOI_{} images", city.tag());
    }
    Ok(converted)
}
