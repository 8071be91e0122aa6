//! JSON scene catalogs describing a local image collection.
use std::path::Path;

use tracing::info;

use crate::core::collection::SceneCollection;
use crate::error::Result;

pub const CATALOG_FILE: &str = "catalog.json";

/// Read a scene catalog; scenes keep their on-disk order
pub fn load_catalog(path: &Path) -> Result<SceneCollection> {
    let text = std::fs::read_to_string(path)?;
    let collection: SceneCollection = serde_json::from_str(&text)?;
    info!(
        "Loaded catalog {:?}: {} scenes in `{}`",
        path,
        collection.len(),
        collection.id
    );
    Ok(collection)
}

pub fn write_catalog(path: &Path, collection: &SceneCollection) -> Result<()> {
    let json = serde_json::to_string_pretty(collection)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn parses_catalog_with_optional_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        std::fs::write(
            &path,
            r#"{
                "id": "COPERNICUS/S2_SR_HARMONIZED",
                "scenes": [
                    { "id": "a", "acquired": "2024-06-01T10:30:00Z",
                      "footprint": [2.0, 36.0, 3.5, 37.0],
                      "properties": { "CLOUD_COVERAGE_ASSESSMENT": 4.5 } },
                    { "id": "b", "acquired": "2024-06-11T10:30:00Z",
                      "footprint": [2.0, 36.0, 3.5, 37.0] }
                ]
            }"#,
        )
        .unwrap();
        let col = load_catalog(&path).unwrap();
        assert_eq!(col.len(), 2);
        assert_eq!(col.scenes[0].property("CLOUD_COVERAGE_ASSESSMENT"), Some(4.5));
        assert!(col.scenes[1].properties.is_empty());

        let copy = dir.path().join("copy.json");
        write_catalog(&copy, &col).unwrap();
        assert_eq!(load_catalog(&copy).unwrap().scenes, col.scenes);
    }

    #[test]
    fn malformed_catalog_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_catalog(&path), Err(Error::Json(_))));
    }
}
