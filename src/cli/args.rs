use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "forestcover",
    version,
    about = "Forest/non-forest classification, area statistics and reference imagery export"
)]
pub struct CliArgs {
    /// JSON parameter file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Longitude of the region centre (degrees)
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Latitude of the region centre (degrees)
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Buffer radius around the centre (metres)
    #[arg(long)]
    pub radius: Option<f64>,

    /// Minimum baseline canopy cover counted as forest (percent)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Classification and aggregation resolution (metres)
    #[arg(long)]
    pub scale: Option<f64>,

    /// Reference imagery resolution (metres)
    #[arg(long)]
    pub reference_scale: Option<f64>,

    /// Pixel budget per aggregation or export
    #[arg(long)]
    pub max_pixels: Option<u64>,

    /// Length of the reference imagery window (months)
    #[arg(long)]
    pub window_months: Option<u32>,

    /// End of the reference window, RFC 3339 or YYYY-MM-DD (default: now)
    #[arg(long)]
    pub reference_time: Option<String>,

    /// Directory of GeoTIFF rasters and scene catalogs (requires the `gdal` feature)
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Run against a synthetic landscape instead of real rasters
    #[arg(long, default_value_t = false)]
    pub demo: bool,

    /// Directory receiving the exported products
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Also export the NDVI of the reference scene
    #[arg(long, default_value_t = false)]
    pub ndvi: bool,

    /// Write JPEG previews of the map layers into <output-dir>/previews
    #[arg(long, default_value_t = false)]
    pub previews: bool,

    /// Return once exports are submitted instead of waiting for them
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,

    /// Enable logging (filter with RUST_LOG)
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
