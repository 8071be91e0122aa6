//! Raster source abstraction: where the change layers and the optical scene
//! collection come from. The pipeline only sees concrete images sampled on its
//! grids; how a source fetches or computes them stays behind this trait.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::collection::{Scene, SceneCollection};
use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::error::{Error, Result};

/// Imagery/raster provider queried by dataset id, bands, bounds and time
pub trait RasterSource {
    /// Read `bands` of a single-image dataset sampled on `grid`
    fn read_image(&self, dataset: &str, bands: &[&str], grid: &SampleGrid) -> Result<Image>;

    /// Catalog of an image collection, unfiltered
    fn list_scenes(&self, collection: &str) -> Result<SceneCollection>;

    /// Read `bands` of one scene of `collection` sampled on `grid`
    fn read_scene(
        &self,
        collection: &str,
        scene: &Scene,
        bands: &[&str],
        grid: &SampleGrid,
    ) -> Result<Image>;
}

/// Band value as a function of (longitude, latitude)
pub type BandFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

struct SceneEntry {
    scene: Scene,
    bands: BTreeMap<String, BandFn>,
}

/// In-process source whose bands are closures over coordinates
#[derive(Default)]
pub struct MemorySource {
    datasets: HashMap<String, BTreeMap<String, BandFn>>,
    collections: HashMap<String, Vec<SceneEntry>>,
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let datasets: BTreeMap<&str, Vec<&str>> = self
            .datasets
            .iter()
            .map(|(k, v)| (k.as_str(), v.keys().map(String::as_str).collect()))
            .collect();
        let collections: BTreeMap<&str, usize> = self
            .collections
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("MemorySource")
            .field("datasets", &datasets)
            .field("collections", &collections)
            .finish()
    }
}

fn sample_bands(
    id: &str,
    fields: &BTreeMap<String, BandFn>,
    bands: &[&str],
    grid: &SampleGrid,
) -> Result<Image> {
    let missing: Vec<&str> = bands
        .iter()
        .copied()
        .filter(|b| !fields.contains_key(*b))
        .collect();
    if !missing.is_empty() {
        return Err(Error::DataUnavailable {
            dataset: id.to_string(),
            band: missing.join(","),
        });
    }
    let mut image = Image::new(id, grid.clone());
    for &band in bands {
        let f = &fields[band];
        image = image.with_band(band, grid.sample(|lon, lat| f(lon, lat)))?;
    }
    debug!("Sampled {:?} from {} on a {:?} grid", bands, id, grid.dim());
    Ok(image)
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one band of a single-image dataset
    pub fn with_band<F>(mut self, dataset: &str, band: &str, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        self.datasets
            .entry(dataset.to_string())
            .or_default()
            .insert(band.to_string(), Arc::new(f));
        self
    }

    /// Register an empty collection so that listing it succeeds
    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collections.entry(collection.to_string()).or_default();
        self
    }

    /// Append a scene and its band fields to a collection
    pub fn with_scene(mut self, collection: &str, scene: Scene, bands: Vec<(&str, BandFn)>) -> Self {
        let bands = bands
            .into_iter()
            .map(|(name, f)| (name.to_string(), f))
            .collect();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(SceneEntry { scene, bands });
        self
    }
}

impl RasterSource for MemorySource {
    fn read_image(&self, dataset: &str, bands: &[&str], grid: &SampleGrid) -> Result<Image> {
        let fields = self
            .datasets
            .get(dataset)
            .ok_or_else(|| Error::DataUnavailable {
                dataset: dataset.to_string(),
                band: bands.join(","),
            })?;
        sample_bands(dataset, fields, bands, grid)
    }

    fn list_scenes(&self, collection: &str) -> Result<SceneCollection> {
        let entries = self
            .collections
            .get(collection)
            .ok_or_else(|| Error::DataUnavailable {
                dataset: collection.to_string(),
                band: "*".to_string(),
            })?;
        Ok(SceneCollection::new(
            collection,
            entries.iter().map(|e| e.scene.clone()).collect(),
        ))
    }

    fn read_scene(
        &self,
        collection: &str,
        scene: &Scene,
        bands: &[&str],
        grid: &SampleGrid,
    ) -> Result<Image> {
        let entry = self
            .collections
            .get(collection)
            .and_then(|entries| entries.iter().find(|e| e.scene.id == scene.id))
            .ok_or_else(|| Error::DataUnavailable {
                dataset: format!("{}/{}", collection, scene.id),
                band: bands.join(","),
            })?;
        let mut image = sample_bands(&scene.id, &entry.bands, bands, grid)?;
        image.properties = scene.properties.clone();
        Ok(image)
    }
}
