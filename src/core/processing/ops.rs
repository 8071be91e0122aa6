use ndarray::{Array2, Zip};

use crate::core::image::Image;
use crate::error::Result;

/// Normalized difference: (a - b) / (a + b) with zero handling
pub fn normalized_diff_arrays(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut result = Array2::zeros(a.dim());
    Zip::from(a).and(b).and(&mut result).for_each(|&a_val, &b_val, res| {
        let sum = a_val + b_val;
        if sum.abs() > 1e-10 {
            *res = (a_val - b_val) / sum;
        } else {
            *res = 0.0;
        }
    });
    result
}

/// NDVI of an optical image as a single band named `NDVI`
pub fn ndvi(image: &Image, nir_band: &str, red_band: &str) -> Result<Image> {
    let nir = image.band(nir_band)?;
    let red = image.band(red_band)?;
    Image::new(image.id.clone(), image.grid.clone())
        .with_band("NDVI", normalized_diff_arrays(nir, red))
}

/// Copy of `data` with every pixel outside `inside` replaced by `fill`
pub fn clip_array(data: &Array2<f64>, inside: &Array2<bool>, fill: f64) -> Array2<f64> {
    let mut result = data.clone();
    Zip::from(&mut result).and(inside).for_each(|v, &keep| {
        if !keep {
            *v = fill;
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn normalized_difference_handles_zero_sum() {
        let nir = array![[3000.0, 0.0], [1000.0, 500.0]];
        let red = array![[1000.0, 0.0], [1000.0, 1500.0]];
        let out = normalized_diff_arrays(&nir, &red);
        assert_eq!(out, array![[0.5, 0.0], [0.0, -0.5]]);
    }

    #[test]
    fn clip_replaces_outside_pixels() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let inside = array![[true, false], [false, true]];
        let out = clip_array(&data, &inside, -9.0);
        assert_eq!(out, array![[1.0, -9.0], [-9.0, 4.0]]);
    }
}
