use ndarray::Zip;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::grid::SampleGrid;
use crate::core::processing::classify::ForestMask;
use crate::core::processing::resample::resample_mask;
use crate::core::region::Region;
use crate::error::{Error, Result};

/// Maximum relative gap between classified area and the disc area
pub const AREA_TOLERANCE: f64 = 0.01;

const M2_PER_HECTARE: f64 = 10_000.0;

/// Per-category area sums over the region, in hectares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaStatistics {
    pub forest_area_ha: f64,
    pub nonforest_area_ha: f64,
}

impl AreaStatistics {
    pub fn total_ha(&self) -> f64 {
        self.forest_area_ha + self.nonforest_area_ha
    }

    pub fn forest_fraction(&self) -> f64 {
        let total = self.total_ha();
        if total > 0.0 {
            self.forest_area_ha / total
        } else {
            0.0
        }
    }
}

/// Pixels inside `region` at `scale` metres, or `ResourceLimitExceeded` when
/// they exceed `max_pixels`. Reads no data.
pub fn check_pixel_budget(region: &Region, scale: f64, max_pixels: u64) -> Result<SampleGrid> {
    let grid = SampleGrid::covering(region, scale)?;
    let pixels = grid.count_in(region);
    if pixels > max_pixels {
        return Err(Error::ResourceLimitExceeded { pixels, max_pixels });
    }
    Ok(grid)
}

/// Sum pixel areas under the mask and under its complement inside `region`,
/// sampled at `scale` metres.
///
/// Fails with `ResourceLimitExceeded` before touching any data when the
/// region holds more than `max_pixels` pixels at that scale.
pub fn aggregate_areas(
    mask: &ForestMask,
    region: &Region,
    scale: f64,
    max_pixels: u64,
) -> Result<AreaStatistics> {
    let grid = check_pixel_budget(region, scale, max_pixels)?;
    debug!("Aggregating {} pixels at {} m", grid.count_in(region), scale);

    let forest = resample_mask(&mask.forest, &mask.grid, &grid);
    let inside = grid.clip_mask(region);
    let area = grid.pixel_area();

    let mut forest_m2 = 0.0;
    let mut nonforest_m2 = 0.0;
    Zip::from(&area)
        .and(&forest)
        .and(&inside)
        .for_each(|&a, &f, &i| {
            if i {
                if f {
                    forest_m2 += a;
                } else {
                    nonforest_m2 += a;
                }
            }
        });

    let stats = AreaStatistics {
        forest_area_ha: forest_m2 / M2_PER_HECTARE,
        nonforest_area_ha: nonforest_m2 / M2_PER_HECTARE,
    };

    let region_ha = region.area_ha();
    if ((stats.total_ha() - region_ha) / region_ha).abs() > AREA_TOLERANCE {
        return Err(Error::AreaMismatch {
            classified_ha: stats.total_ha(),
            region_ha,
        });
    }

    info!(
        "Forest area: {:.2} ha, non-forest area: {:.2} ha",
        stats.forest_area_ha, stats.nonforest_area_ha
    );
    Ok(stats)
}
