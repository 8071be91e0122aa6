use ndarray::Array2;

use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::error::Result;

/// Source pixel for every target pixel centre, nearest neighbour
fn nearest_lookup(source: &SampleGrid, target: &SampleGrid) -> Array2<Option<(usize, usize)>> {
    Array2::from_shape_fn(target.dim(), |(r, c)| {
        let (lon, lat) = target.pixel_center(r, c);
        source.locate(lon, lat)
    })
}

/// Resample every band of `image` onto `target`; pixels outside the source
/// grid receive `fill`
pub fn resample_nearest(image: &Image, target: &SampleGrid, fill: f64) -> Result<Image> {
    if image.grid == *target {
        return Ok(image.clone());
    }
    let lookup = nearest_lookup(&image.grid, target);
    let mut out = Image::new(image.id.clone(), target.clone());
    out.properties = image.properties.clone();
    for band in image.bands() {
        let data = lookup.mapv(|idx| idx.map_or(fill, |(r, c)| band.data[[r, c]]));
        out = out.with_band(band.name.clone(), data)?;
    }
    Ok(out)
}

/// Resample a boolean mask onto `target`; pixels outside the source grid are false
pub fn resample_mask(mask: &Array2<bool>, source: &SampleGrid, target: &SampleGrid) -> Array2<bool> {
    if source == target {
        return mask.clone();
    }
    nearest_lookup(source, target).mapv(|idx| idx.is_some_and(|(r, c)| mask[[r, c]]))
}
