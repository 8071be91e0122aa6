use std::ops::Range;

use geo::{Rect, coord};
use ndarray::Array2;
use tracing::debug;

use crate::core::region::{Region, meridional_radius, normal_radius};
use crate::error::{Error, Result};

// Side length of a square grid of `2 * half` pixels and its pixel count,
// if both fit in memory indices
fn grid_side(half: f64) -> Option<(usize, u64)> {
    if !half.is_finite() || half > u32::MAX as f64 {
        return None;
    }
    let side = (half as u64).checked_mul(2)?;
    let cells = side.checked_mul(side)?;
    usize::try_from(cells).ok()?;
    Some((usize::try_from(side).ok()?, cells))
}

/// Regular north-up EPSG:4326 grid on which every stage samples data.
///
/// Pixel sizes in degrees are derived from a nominal resolution in metres at
/// the centre latitude, so one pixel spans `scale` metres on the ground at the
/// centre and the grid maps exactly onto a GeoTIFF geotransform.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    west: f64,
    north: f64,
    pixel_width: f64,
    pixel_height: f64,
    cols: usize,
    rows: usize,
    scale: f64,
}

impl SampleGrid {
    /// Grid centred on `region` whose extent covers the whole disc
    pub fn covering(region: &Region, scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::config(format!(
                "sampling scale must be positive, got {scale}"
            )));
        }
        let (per_lon, per_lat) = region.metres_per_degree();
        if per_lon < 1e-6 {
            return Err(Error::config(
                "region centre too close to a pole for a lat/lon sampling grid",
            ));
        }
        let half = (region.radius() / scale).ceil().max(1.0);
        let (side, cells) = grid_side(half).ok_or_else(|| {
            Error::config(format!(
                "a {} m radius at {} m spans too many pixels for one grid",
                region.radius(),
                scale
            ))
        })?;
        let (lon, lat) = region.center();
        let pixel_width = scale / per_lon;
        let pixel_height = scale / per_lat;

        let grid = Self {
            west: lon - half * pixel_width,
            north: lat + half * pixel_height,
            pixel_width,
            pixel_height,
            cols: side,
            rows: side,
            scale,
        };
        let extent = grid.bounds();
        if extent.max().y > 90.0 || extent.min().y < -90.0 {
            return Err(Error::config(format!(
                "a {scale} m grid around latitude {lat} extends past a pole"
            )));
        }
        if extent.max().x > 180.0 || extent.min().x < -180.0 {
            return Err(Error::config(format!(
                "a {scale} m grid around longitude {lon} crosses the antimeridian"
            )));
        }
        debug!(
            "Sampling grid {}x{} ({} pixels) at {} m (pixel {:.8} x {:.8} deg)",
            grid.cols, grid.rows, cells, scale, pixel_width, pixel_height
        );
        Ok(grid)
    }

    /// (rows, cols), matching ndarray shape order
    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> u64 {
        // fits: checked when the grid is built
        self.rows as u64 * self.cols as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nominal resolution in metres
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Pixel size in degrees (width, height)
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width, self.pixel_height)
    }

    /// Longitude/latitude of a pixel centre
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.pixel_width,
            self.north - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Pixel containing a coordinate, if any
    pub fn locate(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let col = ((lon - self.west) / self.pixel_width).floor();
        let row = ((self.north - lat) / self.pixel_height).floor();
        if col < 0.0 || row < 0.0 || col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// GDAL-style geotransform
    pub fn geotransform(&self) -> [f64; 6] {
        [
            self.west,
            self.pixel_width,
            0.0,
            self.north,
            0.0,
            -self.pixel_height,
        ]
    }

    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.north - self.rows as f64 * self.pixel_height },
            coord! { x: self.west + self.cols as f64 * self.pixel_width, y: self.north },
        )
    }

    /// Evaluate `f(lon, lat)` at every pixel centre
    pub fn sample<F>(&self, f: F) -> Array2<f64>
    where
        F: Fn(f64, f64) -> f64,
    {
        Array2::from_shape_fn(self.dim(), |(r, c)| {
            let (lon, lat) = self.pixel_center(r, c);
            f(lon, lat)
        })
    }

    /// Ground area of every pixel in square metres
    pub fn pixel_area(&self) -> Array2<f64> {
        let dlon = self.pixel_width.to_radians();
        let dlat = self.pixel_height.to_radians();
        let row_areas: Vec<f64> = (0..self.rows)
            .map(|r| {
                let (_, lat) = self.pixel_center(r, 0);
                dlon * normal_radius(lat) * lat.to_radians().cos() * dlat * meridional_radius(lat)
            })
            .collect();
        Array2::from_shape_fn(self.dim(), |(r, _)| row_areas[r])
    }

    // Columns of `row` whose pixel centre lies inside the region
    fn row_span(&self, region: &Region, row: usize) -> Range<usize> {
        let (per_lon, _) = region.metres_per_degree();
        let (_, lat) = self.pixel_center(row, 0);
        let (_, y) = region.local_offset(region.center().0, lat);
        let r2 = region.radius() * region.radius();
        if y * y > r2 || per_lon <= 0.0 {
            return 0..0;
        }
        let half = (r2 - y * y).sqrt();
        let (x0, _) = region.local_offset(self.west, lat);
        let sx = self.pixel_width * per_lon;

        let first = ((-half - x0) / sx - 0.5).ceil().max(0.0);
        let last = ((half - x0) / sx - 0.5).floor() + 1.0;
        let last = last.min(self.cols as f64);
        if last <= first {
            return 0..0;
        }
        first as usize..last as usize
    }

    /// Number of pixels whose centre lies inside the region
    pub fn count_in(&self, region: &Region) -> u64 {
        (0..self.rows)
            .map(|r| self.row_span(region, r).len() as u64)
            .sum()
    }

    /// True for pixels whose centre lies inside the region
    pub fn clip_mask(&self, region: &Region) -> Array2<bool> {
        let mut mask = Array2::from_elem(self.dim(), false);
        for (r, mut row) in mask.outer_iter_mut().enumerate() {
            for c in self.row_span(region, r) {
                row[c] = true;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidi_abdallah() -> Region {
        Region::new(2.8921599, 36.6802202, 5000.0).unwrap()
    }

    #[test]
    fn grid_covers_region_symmetrically() {
        let region = sidi_abdallah();
        let grid = SampleGrid::covering(&region, 30.0).unwrap();
        assert_eq!(grid.dim(), (334, 334));
        let bounds = grid.bounds();
        let rb = region.bounds();
        assert!(bounds.min().x <= rb.min().x && bounds.max().x >= rb.max().x);
        assert!(bounds.min().y <= rb.min().y && bounds.max().y >= rb.max().y);
    }

    #[test]
    fn rejects_non_positive_scale() {
        let region = sidi_abdallah();
        assert!(matches!(
            SampleGrid::covering(&region, 0.0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn oversized_grid_is_a_configuration_error() {
        let region = sidi_abdallah();
        assert!(matches!(
            SampleGrid::covering(&region, 1e-9),
            Err(Error::Configuration(_))
        ));
        assert_eq!(grid_side(2.0), Some((4, 16)));
        assert_eq!(grid_side(f64::INFINITY), None);
    }

    #[test]
    fn grid_stays_within_the_globe() {
        // the disc clears the pole but a 5 km pixel would not
        let region = Region::new(0.0, 89.95, 5000.0).unwrap();
        assert!(SampleGrid::covering(&region, 30.0).is_ok());
        assert!(matches!(
            SampleGrid::covering(&region, 4000.0),
            Err(Error::Configuration(_))
        ));
        let region = Region::new(179.95, 0.0, 5000.0).unwrap();
        assert!(matches!(
            SampleGrid::covering(&region, 4000.0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn clip_mask_agrees_with_region_membership() {
        let region = Region::new(-60.0, -3.0, 800.0).unwrap();
        let grid = SampleGrid::covering(&region, 30.0).unwrap();
        let mask = grid.clip_mask(&region);
        let mut disagreements = 0;
        for ((r, c), &inside) in mask.indexed_iter() {
            let (lon, lat) = grid.pixel_center(r, c);
            if inside != region.contains(lon, lat) {
                disagreements += 1;
            }
        }
        // only pixels straddling the rim may differ through rounding
        assert!(disagreements <= 4, "{disagreements} disagreements");
        assert_eq!(grid.count_in(&region), mask.iter().filter(|&&m| m).count() as u64);
    }

    #[test]
    fn clipped_pixel_area_approximates_disc() {
        let region = sidi_abdallah();
        let grid = SampleGrid::covering(&region, 30.0).unwrap();
        let area = grid.pixel_area();
        let mask = grid.clip_mask(&region);
        let total: f64 = area
            .iter()
            .zip(mask.iter())
            .filter_map(|(a, &m)| m.then_some(*a))
            .sum();
        let rel = (total - region.area_m2()).abs() / region.area_m2();
        assert!(rel < 0.01, "relative error {rel}");
    }

    #[test]
    fn locate_inverts_pixel_center() {
        let grid = SampleGrid::covering(&sidi_abdallah(), 10.0).unwrap();
        let (lon, lat) = grid.pixel_center(17, 420);
        assert_eq!(grid.locate(lon, lat), Some((17, 420)));
        assert_eq!(grid.locate(-170.0, 0.0), None);
    }
}
