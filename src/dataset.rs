//! Image listing, image identity and the deterministic train/val split.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    pub fn dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.as_str())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorted names of the files in `dir` whose extension is `ext`
/// (given with or without the leading dot).
pub fn list_rasters(dir: &Path, ext: &str) -> Result<Vec<String>> {
    let ext = ext.trim_start_matches('.');
    let entries = fs::read_dir(dir).map_err(|e| PrepError::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PrepError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if Path::new(&name).extension().and_then(|e| e.to_str()) == Some(ext) {
            names.push(name);
        }
    }
    names.sort();
    debug!("{} files with .{} in {}", names.len(), ext, dir.display());
    Ok(names)
}

/// Numeric id after the last `img` marker, e.g. `137` for
/// `RGB-PanSharpen_AOI_2_Vegas_img137.tif`.
pub fn image_number(file_name: &str) -> Result<String> {
    let bad = || PrepError::ImageId {
        name: file_name.to_string(),
    };
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let start = stem.rfind("img").ok_or_else(bad)? + "img".len();
    let digits = &stem[start..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    Ok(digits.to_string())
}

/// Shuffle with a seeded RNG and cut off the validation share.
///
/// `ceil(val_fraction * n)` files go to validation, the rest to training.
/// The same files and seed always give the same split.
pub fn train_val_split(
    files: &[String],
    val_fraction: f64,
    seed: u64,
) -> (Vec<String>, Vec<String>) {
    let mut shuffled = files.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let n_val = ((files.len() as f64) * val_fraction).ceil() as usize;
    let n_val = n_val.min(files.len());
    let val = shuffled.split_off(files.len() - n_val);
    debug!("split {} files: {} train, {} val (seed {})", files.len(), shuffled.len(), val.len(), seed);
    (shuffled, val)
}

const RIO_RAW_PREFIX: &str = "3band_AOI_1_RIO_img";
const RIO_CANONICAL_PREFIX: &str = "RGB-PanSharpen_AOI_1_Rio_img";

/// Rio rasters ship as `3band_AOI_1_RIO_img<N>.tif`; the pipeline expects
/// the `RGB-PanSharpen_AOI_1_Rio_img<N>.tif` naming of the other cities.
pub fn rio_canonical_name(raw: &str) -> Option<String> {
    let suffix = raw.strip_prefix(RIO_RAW_PREFIX)?;
    Some(format!("{RIO_CANONICAL_PREFIX}{suffix}"))
}

/// Move every raw Rio raster in `dir` into `dir/RGB-PanSharpen` under its
/// canonical name. Returns how many files were moved.
pub fn rename_rio(dir: &Path) -> Result<usize> {
    let target = dir.join("RGB-PanSharpen");
    fs::create_dir_all(&target).map_err(|e| PrepError::io(&target, e))?;

    let mut moved = 0;
    for name in list_rasters(dir, "tif")? {
        let Some(canonical) = rio_canonical_name(&name) else {
            debug!("leaving {} in place", name);
            continue;
        };
        let from = dir.join(&name);
        let to = target.join(&canonical);
        fs::rename(&from, &to).map_err(|e| PrepError::io(&from, e))?;
        moved += 1;
    }
    info!("Moved {} Rio rasters into {}", moved, target.display());
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("RGB-PanSharpen_AOI_2_Vegas_img{i}.tif")).collect()
    }

    #[test]
    fn image_number_from_spacenet_name() {
        assert_eq!(image_number("RGB-PanSharpen_AOI_2_Vegas_img137.tif").unwrap(), "137");
        assert_eq!(image_number("RGB-PanSharpen_AOI_5_Khartoum_img1.png").unwrap(), "1");
    }

    #[test]
    fn image_number_requires_digits() {
        assert!(image_number("RGB-PanSharpen_AOI_2_Vegas.tif").is_err());
        assert!(image_number("RGB-PanSharpen_AOI_2_Vegas_imgX1.tif").is_err());
        assert!(image_number("img.tif").is_err());
    }

    #[test]
    fn split_sizes_follow_ceiling() {
        let (train, val) = train_val_split(&names(11), 0.2, 560);
        assert_eq!(val.len(), 3);
        assert_eq!(train.len(), 8);

        let (train, val) = train_val_split(&[], 0.2, 560);
        assert!(train.is_empty() && val.is_empty());
    }

    #[test]
    fn split_is_deterministic_and_disjoint() {
        let files = names(50);
        let first = train_val_split(&files, 0.2, 560);
        let second = train_val_split(&files, 0.2, 560);
        assert_eq!(first, second);

        let (train, val) = first;
        let mut all: Vec<_> = train.iter().chain(val.iter()).cloned().collect();
        all.sort();
        let mut expected = files.clone();
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn list_rasters_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("create temp dir");
        for name in ["b_img2.tif", "a_img1.tif", "notes.txt", "c_img3.tif.aux.xml"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(list_rasters(dir.path(), ".tif").unwrap(), vec!["a_img1.tif", "b_img2.tif"]);
        assert_eq!(list_rasters(dir.path(), "tif").unwrap().len(), 2);
    }

    #[test]
    fn list_rasters_missing_dir() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = list_rasters(&dir.path().join("nope"), "tif").unwrap_err();
        assert!(matches!(err, PrepError::MissingSource { .. }));
    }

    #[test]
    fn rio_names_are_canonicalised() {
        assert_eq!(
            rio_canonical_name("3band_AOI_1_RIO_img4711.tif").as_deref(),
            Some("RGB-PanSharpen_AOI_1_Rio_img4711.tif")
        );
        assert_eq!(rio_canonical_name("8band_AOI_1_RIO_img1.tif"), None);
    }

    #[test]
    fn rename_rio_moves_only_raw_rasters() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("3band_AOI_1_RIO_img1.tif"), b"x").unwrap();
        fs::write(dir.path().join("3band_AOI_1_RIO_img2.tif"), b"y").unwrap();
        fs::write(dir.path().join("8band_AOI_1_RIO_img1.tif"), b"z").unwrap();

        assert_eq!(rename_rio(dir.path()).unwrap(), 2);
        let moved = list_rasters(&dir.path().join("RGB-PanSharpen"), "tif").unwrap();
        assert_eq!(
            moved,
            vec!["RGB-PanSharpen_AOI_1_Rio_img1.tif", "RGB-PanSharpen_AOI_1_Rio_img2.tif"]
        );
        assert!(dir.path().join("8band_AOI_1_RIO_img1.tif").exists());
    }
}
