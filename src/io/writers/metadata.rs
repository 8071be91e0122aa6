use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

/// Provenance of one pipeline run, embedded in every product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub center_lon: f64,
    pub center_lat: f64,
    pub radius_m: f64,
    pub forest_threshold: f64,
    pub forest_dataset: String,
    pub reference_collection: String,
    /// Scene chosen as reference imagery, when one was selected
    pub reference_scene: Option<String>,
    pub reference_time: DateTime<Utc>,
}

/// Flatten run metadata into upper-case key/value pairs
pub fn extract_metadata_fields(meta: &RunMetadata) -> HashMap<String, String> {
    let mut metadata = HashMap::new();

    // Area of interest
    metadata.insert("CENTER_LON".to_string(), meta.center_lon.to_string());
    metadata.insert("CENTER_LAT".to_string(), meta.center_lat.to_string());
    metadata.insert("RADIUS_M".to_string(), meta.radius_m.to_string());

    // Inputs
    metadata.insert(
        "FOREST_THRESHOLD".to_string(),
        meta.forest_threshold.to_string(),
    );
    metadata.insert("FOREST_DATASET".to_string(), meta.forest_dataset.clone());
    metadata.insert(
        "REFERENCE_COLLECTION".to_string(),
        meta.reference_collection.clone(),
    );
    if let Some(scene) = &meta.reference_scene {
        metadata.insert("REFERENCE_SCENE".to_string(), scene.clone());
    }
    metadata.insert(
        "REFERENCE_TIME".to_string(),
        meta.reference_time.to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    // Provenance
    metadata.insert(
        "CONVERSION_TOOL".to_string(),
        env!("CARGO_PKG_NAME").to_string(),
    );
    metadata.insert(
        "CONVERSION_VERSION".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    metadata.insert(
        "CONVERSION_TIMESTAMP".to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    metadata
}

/// Convert metadata HashMap to JSON format
pub fn convert_metadata_to_json(
    metadata: &HashMap<String, String>,
) -> HashMap<String, serde_json::Value> {
    let mut json_metadata = HashMap::new();

    for (key, value) in metadata {
        let json_key = key.to_lowercase();

        // Numbers stay numbers; everything else is a string
        let json_value = value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.clone()));
        json_metadata.insert(json_key, json_value);
    }

    json_metadata
}

/// Add fields that are not plain key/value strings
pub fn add_special_json_fields(
    json_metadata: &mut HashMap<String, serde_json::Value>,
    geotransform: Option<[f64; 6]>,
    crs: Option<&str>,
    region: Option<serde_json::Value>,
) {
    if let Some(geotransform) = geotransform {
        json_metadata.insert(
            "geotransform".to_string(),
            serde_json::Value::Array(
                geotransform
                    .iter()
                    .map(|&v| {
                        serde_json::Number::from_f64(v)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect(),
            ),
        );
    }

    if let Some(crs) = crs.filter(|c| !c.is_empty()) {
        json_metadata.insert("crs".to_string(), serde_json::Value::String(crs.to_string()));
    }

    if let Some(region) = region {
        json_metadata.insert("region".to_string(), region);
    }
}

/// Write `<output>.json` next to a product
pub fn write_json_sidecar(
    output_path: &Path,
    metadata: &HashMap<String, String>,
    geotransform: Option<[f64; 6]>,
    crs: Option<&str>,
    region: Option<serde_json::Value>,
) -> Result<PathBuf> {
    let mut json_metadata = convert_metadata_to_json(metadata);
    add_special_json_fields(&mut json_metadata, geotransform, crs, region);

    // Stable key order in the file
    let sorted: std::collections::BTreeMap<_, _> = json_metadata.into_iter().collect();
    let sidecar_path = output_path.with_extension("json");
    std::fs::write(&sidecar_path, serde_json::to_string_pretty(&sorted)?)?;

    info!("Created metadata sidecar: {:?}", sidecar_path);
    Ok(sidecar_path)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Dataset-level metadata as the XML document GDAL reads from TIFF tag 42112
pub fn gdal_metadata_xml(metadata: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();
    let mut xml = String::from("<GDALMetadata>");
    for key in keys {
        xml.push_str(&format!(
            "<Item name=\"{}\">{}</Item>",
            escape_xml(key),
            escape_xml(&metadata[key])
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunMetadata {
        RunMetadata {
            center_lon: 2.8921599,
            center_lat: 36.6802202,
            radius_m: 5000.0,
            forest_threshold: 20.0,
            forest_dataset: "UMD/hansen/global_forest_change_2021_v1_9".into(),
            reference_collection: "COPERNICUS/S2_SR_HARMONIZED".into(),
            reference_scene: Some("S2_clear".into()),
            reference_time: "2024-06-30T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn numbers_become_json_numbers() {
        let json = convert_metadata_to_json(&extract_metadata_fields(&sample()));
        assert_eq!(json["radius_m"], serde_json::json!(5000.0));
        assert_eq!(json["reference_scene"], serde_json::json!("S2_clear"));
        assert_eq!(json["reference_time"], serde_json::json!("2024-06-30T00:00:00Z"));
    }

    #[test]
    fn sidecar_carries_geotransform_and_crs() {
        let dir = tempfile::tempdir().unwrap();
        let product = dir.path().join("out.tif");
        let path = write_json_sidecar(
            &product,
            &extract_metadata_fields(&sample()),
            Some([2.8, 0.001, 0.0, 36.7, 0.0, -0.001]),
            Some("EPSG:4326"),
            Some(serde_json::json!({ "type": "Polygon" })),
        )
        .unwrap();
        assert_eq!(path, dir.path().join("out.json"));
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["crs"], "EPSG:4326");
        assert_eq!(v["geotransform"].as_array().unwrap().len(), 6);
        assert_eq!(v["region"]["type"], "Polygon");
    }

    #[test]
    fn xml_is_escaped_and_sorted() {
        let mut m = HashMap::new();
        m.insert("B".to_string(), "x<y".to_string());
        m.insert("A".to_string(), "1".to_string());
        assert_eq!(
            gdal_metadata_xml(&m),
            "<GDALMetadata><Item name=\"A\">1</Item><Item name=\"B\">x&lt;y</Item></GDALMetadata>"
        );
    }
}
