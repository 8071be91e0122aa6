//! Shared types and enums used across the crate.
//! Includes the exported `PixelType`, `ExportFormat`, the preview palette
//! `Color`, and `SortOrder` for scene collections.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Sample type written to an exported raster
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
    F32,
}

impl PixelType {
    /// Value stored in pixels outside the export region
    pub fn nodata(&self) -> f64 {
        match self {
            PixelType::U8 => 255.0,
            PixelType::U16 => 0.0,
            PixelType::F32 => f64::NAN,
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PixelType::U8 => "U8",
            PixelType::U16 => "U16",
            PixelType::F32 => "F32",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum ExportFormat {
    GeoTiff,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoTiff => "tif",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::GeoTiff => write!(f, "GeoTIFF"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// RGB color used by preview palettes
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const RED: Color = Color(255, 0, 0);
    pub const GREEN: Color = Color(0, 128, 0);
    pub const BROWN: Color = Color(165, 42, 42);
    pub const YELLOW: Color = Color(255, 255, 0);
    pub const BLACK: Color = Color(0, 0, 0);

    /// Linear interpolation between two colors, `t` in [0, 1]
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}
