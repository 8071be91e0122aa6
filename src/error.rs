//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Carries the pipeline's failure taxonomy (configuration, missing data, empty
//! imagery, pixel budget) and converts underlying I/O, encoder and GDAL errors.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data unavailable: band(s) `{band}` missing from `{dataset}` for the requested region")]
    DataUnavailable { dataset: String, band: String },

    #[error("No imagery available in `{collection}` between {start} and {end} for the requested region")]
    NoImageryAvailable {
        collection: String,
        start: String,
        end: String,
    },

    #[error("Too many pixels: {pixels} exceeds the budget of {max_pixels}")]
    ResourceLimitExceeded { pixels: u64, max_pixels: u64 },

    #[error(
        "Area mismatch: forest + non-forest = {classified_ha:.3} ha, region = {region_ha:.3} ha"
    )]
    AreaMismatch { classified_ha: f64, region_ha: f64 },

    #[error("Export `{description}` failed: {reason}")]
    Export { description: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JPEG error: {0}")]
    Jpeg(#[from] jpeg_encoder::EncodingError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn export<E: std::fmt::Display>(description: &str, e: E) -> Self {
        Error::Export {
            description: description.to_string(),
            reason: e.to_string(),
        }
    }
}
