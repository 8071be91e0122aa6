//! Styled quicklooks of the map layers (forest classification, reference RGB,
//! NDVI), rendered to interleaved RGB bytes and written as JPEG + world file.
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::image::Image;
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::io::writers::jpeg::write_rgb_jpeg;
use crate::io::writers::worldfile::{WGS84_WKT, write_prj_file, write_world_file};
use crate::types::Color;

/// Display range and colouring of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    /// Colour ramp for single-band layers; empty means grayscale
    #[serde(default)]
    pub palette: Vec<Color>,
    /// Bands to display; three bands render as RGB
    #[serde(default)]
    pub bands: Vec<String>,
}

impl VisParams {
    pub fn forest() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            palette: vec![Color::RED, Color::GREEN],
            bands: Vec::new(),
        }
    }

    pub fn true_color(bands: &[String]) -> Self {
        Self {
            min: 0.0,
            max: 3000.0,
            palette: Vec::new(),
            bands: bands.to_vec(),
        }
    }

    pub fn ndvi() -> Self {
        Self {
            min: -0.2,
            max: 0.8,
            palette: vec![Color::BROWN, Color::YELLOW, Color::GREEN],
            bands: Vec::new(),
        }
    }

    fn normalize(&self, v: f64) -> f64 {
        if self.max > self.min {
            ((v - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn ramp(&self, t: f64) -> Color {
        match self.palette.len() {
            0 => {
                let g = (t * 255.0).round() as u8;
                Color(g, g, g)
            }
            1 => self.palette[0],
            n => {
                let pos = t * (n - 1) as f64;
                let i = (pos.floor() as usize).min(n - 2);
                self.palette[i].lerp(self.palette[i + 1], pos - i as f64)
            }
        }
    }
}

/// A named map layer and whether it is shown by default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub vis: VisParams,
}

/// Interleaved RGB bytes for `image`; pixels outside `inside` or not finite are black
pub fn render_rgb(image: &Image, inside: &Array2<bool>, vis: &VisParams) -> Result<Vec<u8>> {
    let (rows, cols) = image.grid.dim();
    if inside.dim() != (rows, cols) {
        return Err(Error::config("preview clip mask does not match the image grid"));
    }
    let mut rgb = Vec::with_capacity(rows * cols * 3);

    if vis.bands.len() == 3 {
        let r = image.band(&vis.bands[0])?;
        let g = image.band(&vis.bands[1])?;
        let b = image.band(&vis.bands[2])?;
        for (&keep, ((&rv, &gv), &bv)) in inside.iter().zip(r.iter().zip(g.iter()).zip(b.iter())) {
            if keep && rv.is_finite() && gv.is_finite() && bv.is_finite() {
                rgb.extend_from_slice(&[
                    (vis.normalize(rv) * 255.0).round() as u8,
                    (vis.normalize(gv) * 255.0).round() as u8,
                    (vis.normalize(bv) * 255.0).round() as u8,
                ]);
            } else {
                rgb.extend_from_slice(&[0, 0, 0]);
            }
        }
    } else {
        let band = match vis.bands.first() {
            Some(name) => image.band(name)?,
            None => match image.bands().first() {
                Some(b) => &b.data,
                None => {
                    return Err(Error::DataUnavailable {
                        dataset: image.id.clone(),
                        band: "*".to_string(),
                    });
                }
            },
        };
        for (&v, &keep) in band.iter().zip(inside.iter()) {
            let Color(r, g, b) = if keep && v.is_finite() {
                vis.ramp(vis.normalize(v))
            } else {
                Color::BLACK
            };
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    Ok(rgb)
}

/// Render `layer` for `image` clipped to `region` into `dir/<layer name>.jpg`,
/// with a world file and a `.prj` alongside
pub fn write_preview(dir: &Path, layer: &Layer, image: &Image, region: &Region) -> Result<PathBuf> {
    let inside = image.grid.clip_mask(region);
    let rgb = render_rgb(image, &inside, &layer.vis)?;
    let (rows, cols) = image.grid.dim();
    let file_name = layer.name.replace(|c: char| !c.is_ascii_alphanumeric(), "_");
    let path = dir.join(format!("{file_name}.jpg"));

    write_rgb_jpeg(&path, cols, rows, &rgb)?;
    write_world_file(&path, image.grid.geotransform())?;
    write_prj_file(&path, WGS84_WKT)?;
    info!(
        "Preview layer '{}' ({}) written to {:?}",
        layer.name,
        if layer.visible { "shown" } else { "hidden" },
        path
    );
    Ok(path)
}
