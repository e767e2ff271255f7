use std::path::PathBuf;

use thiserror::Error;

/// Failure while tokenizing or parsing a pixel-space WKT polygon.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{reason} at byte {offset}")]
pub struct WktError {
    pub offset: usize,
    pub reason: String,
}

impl WktError {
    pub(crate) fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required source file does not exist: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("bad polygon for {image_id} (row {row}): {source}; raw text: {raw:?}")]
    Parse {
        image_id: String,
        row: usize,
        raw: String,
        #[source]
        source: WktError,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("GeoJSON error in {}: {source}", path.display())]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("raster error in {}: {message}", path.display())]
    Raster { path: PathBuf, message: String },

    #[error("image encode error for {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("file name {name:?} does not end with {extension:?}")]
    MissingExtension { name: String, extension: String },

    #[error("cannot derive a numeric image id from {name:?}")]
    ImageId { name: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl PrepError {
    /// Wrap an I/O error, promoting `NotFound` to [`PrepError::MissingSource`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PrepError::MissingSource { path }
        } else {
            PrepError::Io { path, source }
        }
    }

    pub fn raster(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PrepError::Raster {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
