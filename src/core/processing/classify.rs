use ndarray::{Array2, Zip};
use tracing::{info, warn};

use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::core::params::PipelineParams;
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::io::source::RasterSource;

pub const FOREST_BAND: &str = "forest_nonforest";

/// Boolean forest/non-forest classification on a sampling grid
#[derive(Debug, Clone)]
pub struct ForestMask {
    pub grid: SampleGrid,
    pub forest: Array2<bool>,
}

impl ForestMask {
    /// Exact complement of the forest mask
    pub fn nonforest(&self) -> Array2<bool> {
        self.forest.mapv(|f| !f)
    }

    pub fn forest_pixels(&self) -> usize {
        self.forest.iter().filter(|&&f| f).count()
    }

    /// Single-band 1/0 image, as exported and aggregated
    pub fn to_image(&self, id: &str) -> Result<Image> {
        Image::new(id, self.grid.clone())
            .with_band(FOREST_BAND, self.forest.mapv(|f| if f { 1.0 } else { 0.0 }))
    }
}

/// `(cover >= threshold AND NOT loss) OR gain`: regrowth overrides a loss signal
#[inline]
pub fn classify_pixel(cover: f64, loss_year: f64, gain: f64, threshold: f64) -> bool {
    let baseline_forest = cover >= threshold;
    let lost = loss_year > 0.0;
    let gained = gain > 0.0;
    (baseline_forest && !lost) || gained
}

/// Classify co-registered cover, loss-year and gain rasters
pub fn classify(
    cover: &Array2<f64>,
    loss_year: &Array2<f64>,
    gain: &Array2<f64>,
    threshold: f64,
) -> Result<Array2<bool>> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(Error::config(format!(
            "forest threshold must be within [0, 100], got {threshold}"
        )));
    }
    if cover.dim() != loss_year.dim() || cover.dim() != gain.dim() {
        return Err(Error::config(format!(
            "input rasters are not co-registered: {:?}, {:?}, {:?}",
            cover.dim(),
            loss_year.dim(),
            gain.dim()
        )));
    }
    Ok(Zip::from(cover)
        .and(loss_year)
        .and(gain)
        .par_map_collect(|&c, &l, &g| classify_pixel(c, l, g, threshold)))
}

/// Fail with `DataUnavailable` when `band` has no value at a pixel inside the region
pub fn require_coverage(image: &Image, band: &str, inside: &Array2<bool>) -> Result<()> {
    let data = image.band(band)?;
    let gaps = Zip::from(data)
        .and(inside)
        .fold(0usize, |n, &v, &i| if i && v.is_nan() { n + 1 } else { n });
    if gaps > 0 {
        warn!("{}/{}: {} pixel(s) inside the region have no data", image.id, band, gaps);
        return Err(Error::DataUnavailable {
            dataset: image.id.clone(),
            band: band.to_string(),
        });
    }
    Ok(())
}

/// Read the change layers for `grid` from `source` and classify them.
///
/// Every input must cover the whole region; a nodata pixel inside it is not
/// silently taken as non-forest.
pub fn classify_forest<S: RasterSource + ?Sized>(
    source: &S,
    params: &PipelineParams,
    region: &Region,
    grid: &SampleGrid,
) -> Result<ForestMask> {
    let bands = [
        params.cover_band.as_str(),
        params.loss_band.as_str(),
        params.gain_band.as_str(),
    ];
    let image = source.read_image(&params.forest_dataset, &bands, grid)?;
    let inside = grid.clip_mask(region);
    for band in bands {
        require_coverage(&image, band, &inside)?;
    }
    let forest = classify(
        image.band(&params.cover_band)?,
        image.band(&params.loss_band)?,
        image.band(&params.gain_band)?,
        params.forest_threshold,
    )?;

    let mask = ForestMask {
        grid: grid.clone(),
        forest,
    };
    info!(
        "Classified {} of {} pixels as forest (threshold {}%)",
        mask.forest_pixels(),
        grid.len(),
        params.forest_threshold
    );
    Ok(mask)
}
