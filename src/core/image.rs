use std::collections::BTreeMap;

use ndarray::Array2;

use crate::core::grid::SampleGrid;
use crate::error::{Error, Result};

/// A named band sampled on a grid
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub data: Array2<f64>,
}

/// Named bands sampled on one grid, plus scalar properties of their source
#[derive(Debug, Clone)]
pub struct Image {
    pub id: String,
    pub grid: SampleGrid,
    bands: Vec<Band>,
    pub properties: BTreeMap<String, f64>,
}

impl Image {
    pub fn new(id: impl Into<String>, grid: SampleGrid) -> Self {
        Self {
            id: id.into(),
            grid,
            bands: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Append a band; its shape must match the grid
    pub fn with_band(mut self, name: impl Into<String>, data: Array2<f64>) -> Result<Self> {
        let name = name.into();
        if data.dim() != self.grid.dim() {
            return Err(Error::config(format!(
                "band `{}` has shape {:?}, grid is {:?}",
                name,
                data.dim(),
                self.grid.dim()
            )));
        }
        self.bands.retain(|b| b.name != name);
        self.bands.push(Band { name, data });
        Ok(self)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Result<&Array2<f64>> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.data)
            .ok_or_else(|| Error::DataUnavailable {
                dataset: self.id.clone(),
                band: name.to_string(),
            })
    }

    /// New image holding only `names`, in the requested order
    pub fn select(&self, names: &[&str]) -> Result<Image> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.bands.iter().any(|b| b.name == *n))
            .collect();
        if !missing.is_empty() {
            return Err(Error::DataUnavailable {
                dataset: self.id.clone(),
                band: missing.join(","),
            });
        }
        let bands = names
            .iter()
            .filter_map(|n| self.bands.iter().find(|b| b.name == *n).cloned())
            .collect();
        Ok(Image {
            id: self.id.clone(),
            grid: self.grid.clone(),
            bands,
            properties: self.properties.clone(),
        })
    }

    /// Rename the single band of this image
    pub fn rename(mut self, name: impl Into<String>) -> Result<Image> {
        if self.bands.len() != 1 {
            return Err(Error::config(format!(
                "rename expects a single-band image, `{}` has {} bands",
                self.id,
                self.bands.len()
            )));
        }
        self.bands[0].name = name.into();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::region::Region;

    fn image() -> Image {
        let region = Region::new(0.0, 0.0, 100.0).unwrap();
        let grid = SampleGrid::covering(&region, 30.0).unwrap();
        let dim = grid.dim();
        Image::new("test/image", grid)
            .with_band("B2", Array2::from_elem(dim, 2.0))
            .unwrap()
            .with_band("B3", Array2::from_elem(dim, 3.0))
            .unwrap()
            .with_band("B4", Array2::from_elem(dim, 4.0))
            .unwrap()
    }

    #[test]
    fn select_reorders_bands() {
        let rgb = image().select(&["B4", "B3", "B2"]).unwrap();
        assert_eq!(rgb.band_names(), vec!["B4", "B3", "B2"]);
    }

    #[test]
    fn select_reports_missing_bands() {
        match image().select(&["B4", "B8"]) {
            Err(Error::DataUnavailable { dataset, band }) => {
                assert_eq!(dataset, "test/image");
                assert_eq!(band, "B8");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_mismatched_shape() {
        let img = image();
        assert!(img.with_band("bad", Array2::zeros((1, 1))).is_err());
    }
}
