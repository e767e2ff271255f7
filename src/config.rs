//! Dataset layout: which cities exist, where their rasters and annotations
//! live, and how each one is processed.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

pub const DEFAULT_SEED: u64 = 560;
pub const DEFAULT_VAL_FRACTION: f64 = 0.2;

/// Placeholder substituted with the image number in GeoJSON sidecar names.
pub const ID_PLACEHOLDER: &str = "{id}";

/// What to do with a WKT row that does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Log the row and leave it out of the image's regions.
    #[default]
    Lenient,
    /// Abort the city.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum AnnotationSource {
    /// One GeoJSON file per image, geographic coordinates.
    GeoJson { dir: PathBuf, template: String },
    /// One CSV for the whole city, pixel-space WKT.
    Tabular { csv: PathBuf },
}

impl AnnotationSource {
    pub fn sidecar_path(&self, image_number: &str) -> Option<PathBuf> {
        match self {
            AnnotationSource::GeoJson { dir, template } => {
                Some(dir.join(template.replace(ID_PLACEHOLDER, image_number)))
            }
            AnnotationSource::Tabular { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityConfig {
    pub id: u32,
    pub name: String,
    pub image_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_dir: Option<PathBuf>,
    /// Min-max stretch each band during conversion.
    #[serde(default)]
    pub normalize: bool,
    pub annotations: AnnotationSource,
}

impl CityConfig {
    /// `2_Vegas` for city 2, Vegas.
    pub fn tag(&self) -> String {
        format!("{}_{}", self.id, self.name)
    }

    /// `ImageId` value used in the building CSV, e.g. `AOI_2_Vegas_img137`.
    pub fn image_key(&self, image_number: &str) -> String {
        format!("AOI_{}_img{}", self.tag(), image_number)
    }

    /// Per-city index file name, e.g. `AOI_2_Vegas_region_data.json`.
    pub fn index_file_name(&self) -> String {
        format!("AOI_{}_region_data.json", self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub output_root: PathBuf,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_val_fraction")]
    pub val_fraction: f64,
    #[serde(default)]
    pub parse_mode: ParseMode,
    pub cities: Vec<CityConfig>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_val_fraction() -> f64 {
    DEFAULT_VAL_FRACTION
}

fn tabular_city(root: &Path, id: u32, name: &str) -> CityConfig {
    let train = root.join(format!("AOI_{id}_{name}_Train"));
    CityConfig {
        id,
        name: name.to_string(),
        image_dir: train.join("RGB-PanSharpen"),
        test_dir: Some(root.join(format!("AOI_{id}_{name}_Test_public/RGB-PanSharpen"))),
        normalize: true,
        annotations: AnnotationSource::Tabular {
            csv: train
                .join("summaryData")
                .join(format!("AOI_{id}_{name}_Train_Building_Solutions.csv")),
        },
    }
}

impl PipelineConfig {
    /// The five SpaceNet building cities laid out under `root`.
    pub fn spacenet(root: &Path) -> Self {
        let rio_train = root.join("AOI_1_Rio_Train");
        let rio = CityConfig {
            id: 1,
            name: "Rio".to_string(),
            image_dir: rio_train.join("RGB-PanSharpen"),
            test_dir: Some(root.join("AOI_1_Rio_Test_public/RGB-PanSharpen")),
            normalize: false,
            annotations: AnnotationSource::GeoJson {
                dir: rio_train.join("geojson"),
                template: format!("Geo_AOI_1_RIO_img{ID_PLACEHOLDER}.geojson"),
            },
        };

        PipelineConfig {
            output_root: root.to_path_buf(),
            seed: DEFAULT_SEED,
            val_fraction: DEFAULT_VAL_FRACTION,
            parse_mode: ParseMode::Lenient,
            cities: vec![
                rio,
                tabular_city(root, 2, "Vegas"),
                tabular_city(root, 3, "Paris"),
                tabular_city(root, 4, "Shanghai"),
                tabular_city(root, 5, "Khartoum"),
            ],
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        let config: PipelineConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| PrepError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(PrepError::Config { message });

        if !(0.0..1.0).contains(&self.val_fraction) {
            return fail(format!("val_fraction must be in [0, 1), got {}", self.val_fraction));
        }
        if self.cities.is_empty() {
            return fail("no cities configured".to_string());
        }

        let mut tags = HashSet::new();
        for city in &self.cities {
            if !tags.insert(city.tag()) {
                return fail(format!("city {} is configured twice", city.tag()));
            }
            if let AnnotationSource::GeoJson { template, .. } = &city.annotations {
                if !template.contains(ID_PLACEHOLDER) {
                    return fail(format!(
                        "GeoJSON template {template:?} for {} lacks {ID_PLACEHOLDER}",
                        city.tag()
                    ));
                }
            }
        }
        Ok(())
    }
}
