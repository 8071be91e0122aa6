use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const HANSEN_GFC_DATASET: &str = "UMD/hansen/global_forest_change_2021_v1_9";
pub const SENTINEL2_SR_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";
pub const CLOUD_COVERAGE_KEY: &str = "CLOUD_COVERAGE_ASSESSMENT";

/// Pipeline parameters suitable for config files; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub center_lon: f64,
    pub center_lat: f64,
    /// Buffer radius around the centre in metres
    pub radius_m: f64,
    /// Minimum baseline canopy cover (percent) counted as forest
    pub forest_threshold: f64,
    /// Resolution of classification, aggregation and classification export
    pub classification_scale: f64,
    /// Resolution of the reference imagery and NDVI exports
    pub reference_scale: f64,
    /// Ceiling on pixels touched by one aggregation or export
    pub max_pixels: u64,
    /// Trailing window for reference imagery, in calendar months
    pub window_months: u32,
    /// End of the reference window; None lets the caller supply the clock
    pub reference_time: Option<DateTime<Utc>>,

    pub forest_dataset: String,
    pub cover_band: String,
    pub loss_band: String,
    pub gain_band: String,

    pub reference_collection: String,
    pub reference_bands: Vec<String>,
    pub nir_band: String,
    pub red_band: String,
    pub sort_key: String,

    pub classification_name: String,
    pub imagery_name: String,
    pub statistics_name: String,
    pub ndvi_name: String,

    /// Also export the NDVI of the reference scene
    pub export_ndvi: bool,
    /// Render JPEG quicklooks of the map layers
    pub previews: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            center_lon: 2.8921599,
            center_lat: 36.6802202,
            radius_m: 5000.0,
            forest_threshold: 20.0,
            classification_scale: 30.0,
            reference_scale: 10.0,
            max_pixels: 1_000_000_000,
            window_months: 6,
            reference_time: None,
            forest_dataset: HANSEN_GFC_DATASET.to_string(),
            cover_band: "treecover2000".to_string(),
            loss_band: "lossyear".to_string(),
            gain_band: "gain".to_string(),
            reference_collection: SENTINEL2_SR_COLLECTION.to_string(),
            reference_bands: vec!["B4".to_string(), "B3".to_string(), "B2".to_string()],
            nir_band: "B8".to_string(),
            red_band: "B4".to_string(),
            sort_key: CLOUD_COVERAGE_KEY.to_string(),
            classification_name: "Sidi_Abdallah_Forest_Classification".to_string(),
            imagery_name: "Sidi_Abdallah_Sentinel_Imagery".to_string(),
            statistics_name: "Sidi_Abdallah_Forest_Statistics".to_string(),
            ndvi_name: "Sidi_Abdallah_NDVI".to_string(),
            export_ndvi: false,
            previews: false,
        }
    }
}

impl PipelineParams {
    /// Load parameters from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: PipelineParams = serde_json::from_str(&text)?;
        Ok(params)
    }

    /// Check static parameters before any data is touched
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.forest_threshold) {
            return Err(Error::config(format!(
                "forest threshold must be within [0, 100], got {}",
                self.forest_threshold
            )));
        }
        for (name, scale) in [
            ("classification_scale", self.classification_scale),
            ("reference_scale", self.reference_scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(Error::config(format!("{name} must be positive, got {scale}")));
            }
        }
        if self.max_pixels == 0 {
            return Err(Error::config("max_pixels must be positive"));
        }
        if self.window_months == 0 {
            return Err(Error::config("window_months must be positive"));
        }
        if self.reference_bands.len() != 3 {
            return Err(Error::config(format!(
                "reference imagery needs exactly three bands (red, green, blue), got {:?}",
                self.reference_bands
            )));
        }
        let names = self.destination_names();
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::config("export destination names must not be empty"));
            }
            if names[..i].contains(name) {
                return Err(Error::config(format!(
                    "duplicate export destination name `{name}`"
                )));
            }
        }
        Ok(())
    }

    fn destination_names(&self) -> Vec<&str> {
        let mut names = vec![
            self.classification_name.as_str(),
            self.imagery_name.as_str(),
            self.statistics_name.as_str(),
        ];
        if self.export_ndvi {
            names.push(self.ndvi_name.as_str());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineParams::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params: PipelineParams =
            serde_json::from_str(r#"{ "forest_threshold": 30, "export_ndvi": true }"#).unwrap();
        assert_eq!(params.forest_threshold, 30.0);
        assert!(params.export_ndvi);
        assert_eq!(params.radius_m, 5000.0);
        assert_eq!(params.reference_bands, vec!["B4", "B3", "B2"]);
    }

    #[test]
    fn rejects_bad_threshold_and_duplicates() {
        let mut params = PipelineParams {
            forest_threshold: 120.0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::Configuration(_))));

        params.forest_threshold = 20.0;
        params.imagery_name = params.classification_name.clone();
        assert!(matches!(params.validate(), Err(Error::Configuration(_))));
    }
}
