//! GeoTIFF-backed raster source (cargo feature `gdal`).
//!
//! Layout under the source root, dataset and collection ids with `/` replaced
//! by `_`:
//!
//! ```text
//! <root>/UMD_hansen_global_forest_change_2021_v1_9/treecover2000.tif
//! <root>/UMD_hansen_global_forest_change_2021_v1_9/lossyear.tif
//! <root>/COPERNICUS_S2_SR_HARMONIZED/catalog.json
//! <root>/COPERNICUS_S2_SR_HARMONIZED/<scene id>/B4.tif
//! ```
//!
//! Rasters must be in EPSG:4326; they are sampled nearest-neighbour at the
//! pixel centres of the requested grid.
use gdal::Dataset;
use gdal::errors::GdalError as GdalCrateError;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::collection::{Scene, SceneCollection};
use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::error::{Error, Result};
use crate::io::catalog::{CATALOG_FILE, load_catalog};
use crate::io::source::RasterSource;

/// Errors encountered when reading rasters through GDAL
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2} values")]
    DimensionMismatch(usize, usize, usize),
}

/// Georeferencing of a GDAL dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// EPSG code when recognised, otherwise the WKT
    pub projection: String,
    pub nodata: Option<f64>,
}

/// A single GDAL raster file
pub struct GdalRaster {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

// Helper to extract EPSG code from WKT authority tag
fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    let idx = wkt.rfind(KEY)?;
    let start = idx + KEY.len();
    let end = wkt[start..].find('"')?;
    Some(format!("EPSG:{}", &wkt[start..start + end]))
}

impl GdalRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = dataset.geo_transform()?;
        if geotransform[2] != 0.0 || geotransform[4] != 0.0 {
            return Err(GdalError::UnsupportedFormat(format!(
                "rotated geotransform in {:?}",
                path.as_ref()
            )));
        }
        let proj = dataset.projection();
        let projection = if proj.starts_with("EPSG:") {
            proj
        } else {
            parse_epsg(&proj).unwrap_or(proj)
        };
        let nodata = dataset.rasterband(1)?.no_data_value();
        Ok(GdalRaster {
            dataset,
            metadata: GdalMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                nodata,
            },
        })
    }

    /// Sample band `index` (1-based) at the pixel centres of `grid`.
    /// Pixels outside the raster or equal to its nodata value become NaN.
    pub fn sample_onto(
        &self,
        index: usize,
        grid: &SampleGrid,
    ) -> std::result::Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        if self.metadata.projection != "EPSG:4326" {
            return Err(GdalError::UnsupportedFormat(format!(
                "expected EPSG:4326, found {}",
                self.metadata.projection
            )));
        }
        let [x0, dx, _, y0, _, dy] = self.metadata.geotransform;
        let bounds = grid.bounds();
        let to_col = |lon: f64| (lon - x0) / dx;
        let to_row = |lat: f64| (lat - y0) / dy;

        // Only read the window covering the grid
        let clamp_x = |v: f64| v.clamp(0.0, self.metadata.size_x as f64);
        let clamp_y = |v: f64| v.clamp(0.0, self.metadata.size_y as f64);
        let (ca, cb) = (to_col(bounds.min().x), to_col(bounds.max().x));
        let (ra, rb) = (to_row(bounds.max().y), to_row(bounds.min().y));
        let col_min = clamp_x(ca.min(cb).floor()) as usize;
        let col_max = clamp_x(ca.max(cb).ceil()) as usize;
        let row_min = clamp_y(ra.min(rb).floor()) as usize;
        let row_max = clamp_y(ra.max(rb).ceil()) as usize;
        if col_max <= col_min || row_max <= row_min {
            return Ok(Array2::from_elem(grid.dim(), f64::NAN));
        }
        let (w, h) = (col_max - col_min, row_max - row_min);

        let band = self.dataset.rasterband(index)?;
        let buf = band.read_as::<f64>((col_min as isize, row_min as isize), (w, h), (w, h), None)?;
        let data = buf.data();
        if data.len() != w * h {
            return Err(GdalError::DimensionMismatch(w, h, data.len()));
        }
        debug!("Read {}x{} window at ({}, {})", w, h, col_min, row_min);

        let nodata = self.metadata.nodata;
        Ok(Array2::from_shape_fn(grid.dim(), |(r, c)| {
            let (lon, lat) = grid.pixel_center(r, c);
            let (col, row) = (to_col(lon).floor(), to_row(lat).floor());
            if col < col_min as f64 || row < row_min as f64 {
                return f64::NAN;
            }
            let (col, row) = (col as usize - col_min, row as usize - row_min);
            if col >= w || row >= h {
                return f64::NAN;
            }
            let v = data[row * w + col];
            if nodata.is_some_and(|nd| nd == v) {
                f64::NAN
            } else {
                v
            }
        }))
    }
}

/// Raster source reading GeoTIFFs from a local directory tree
#[derive(Debug, Clone)]
pub struct GeoTiffSource {
    root: PathBuf,
}

impl GeoTiffSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::config(format!(
                "raster source directory {:?} does not exist",
                root
            )));
        }
        Ok(Self { root })
    }

    fn entry_dir(&self, id: &str) -> PathBuf {
        self.root.join(id.replace('/', "_"))
    }

    fn read_bands(&self, id: &str, dir: &Path, bands: &[&str], grid: &SampleGrid) -> Result<Image> {
        let missing: Vec<&str> = bands
            .iter()
            .copied()
            .filter(|b| !dir.join(format!("{b}.tif")).is_file())
            .collect();
        if !missing.is_empty() {
            return Err(Error::DataUnavailable {
                dataset: id.to_string(),
                band: missing.join(","),
            });
        }
        let mut image = Image::new(id, grid.clone());
        for &band in bands {
            let raster = GdalRaster::open(dir.join(format!("{band}.tif")))?;
            let data = raster.sample_onto(1, grid)?;
            if data.iter().all(|v| v.is_nan()) {
                return Err(Error::DataUnavailable {
                    dataset: id.to_string(),
                    band: band.to_string(),
                });
            }
            image = image.with_band(band, data)?;
        }
        Ok(image)
    }
}

impl RasterSource for GeoTiffSource {
    fn read_image(&self, dataset: &str, bands: &[&str], grid: &SampleGrid) -> Result<Image> {
        self.read_bands(dataset, &self.entry_dir(dataset), bands, grid)
    }

    fn list_scenes(&self, collection: &str) -> Result<SceneCollection> {
        let path = self.entry_dir(collection).join(CATALOG_FILE);
        if !path.is_file() {
            return Err(Error::DataUnavailable {
                dataset: collection.to_string(),
                band: "*".to_string(),
            });
        }
        load_catalog(&path)
    }

    fn read_scene(
        &self,
        collection: &str,
        scene: &Scene,
        bands: &[&str],
        grid: &SampleGrid,
    ) -> Result<Image> {
        let dir = self.entry_dir(collection).join(&scene.id);
        let mut image = self.read_bands(&scene.id, &dir, bands, grid)?;
        image.properties = scene.properties.clone();
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_code_is_taken_from_last_authority() {
        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],AUTHORITY["EPSG","4326"]]"#;
        assert_eq!(parse_epsg(wkt).as_deref(), Some("EPSG:4326"));
        assert_eq!(parse_epsg("LOCAL_CS[\"x\"]"), None);
    }
}
