//! Reference-imagery selection: the least-cloudy scene of a trailing window.
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::collection::{Scene, SceneCollection, TimeWindow};
use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::io::source::RasterSource;
use crate::types::SortOrder;

/// Filter by bounds, filter by date, sort ascending by `sort_key`, take first.
/// An empty result is an error, never a placeholder scene.
pub fn select_scene(
    collection: SceneCollection,
    region: &Region,
    window: &TimeWindow,
    sort_key: &str,
) -> Result<Scene> {
    let id = collection.id.clone();
    let total = collection.len();
    let filtered = collection.filter_bounds(region).filter_date(window);
    debug!(
        "{}: {} of {} scenes intersect the region inside the window",
        id,
        filtered.len(),
        total
    );

    filtered
        .sort(sort_key, SortOrder::Ascending)
        .first()
        .ok_or_else(|| Error::NoImageryAvailable {
            collection: id,
            start: window.start.to_rfc3339(),
            end: window.end.to_rfc3339(),
        })
}

/// Least-cloudy scene of `collection` in the window ending at `reference_time`,
/// chosen from the catalog alone
pub fn find_reference_scene<S: RasterSource + ?Sized>(
    source: &S,
    collection: &str,
    region: &Region,
    reference_time: DateTime<Utc>,
    window_months: u32,
    sort_key: &str,
) -> Result<Scene> {
    let window = TimeWindow::trailing_months(reference_time, window_months)?;
    let scenes = source.list_scenes(collection)?;
    let scene = select_scene(scenes, region, &window, sort_key)?;
    info!(
        "Reference scene {} acquired {} ({} = {:?})",
        scene.id,
        scene.acquired.to_rfc3339(),
        sort_key,
        scene.property(sort_key)
    );
    Ok(scene)
}

/// Select the reference scene ending at `reference_time` and read `bands` onto `grid`
pub fn select_reference_image<S: RasterSource + ?Sized>(
    source: &S,
    collection: &str,
    region: &Region,
    reference_time: DateTime<Utc>,
    window_months: u32,
    sort_key: &str,
    bands: &[&str],
    grid: &SampleGrid,
) -> Result<(Scene, Image)> {
    let scene = find_reference_scene(
        source,
        collection,
        region,
        reference_time,
        window_months,
        sort_key,
    )?;
    let image = source.read_scene(collection, &scene, bands, grid)?;
    Ok((scene, image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn scene(id: &str, month: u32, cloud: f64) -> Scene {
        Scene {
            id: id.to_string(),
            acquired: Utc.with_ymd_and_hms(2024, month, 15, 10, 0, 0).unwrap(),
            footprint: [2.5, 36.3, 3.5, 37.0],
            properties: BTreeMap::from([("CLOUD_COVERAGE_ASSESSMENT".to_string(), cloud)]),
        }
    }

    #[test]
    fn picks_least_cloudy_recent_scene() {
        let region = Region::new(2.8921599, 36.6802202, 5000.0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::trailing_months(now, 6).unwrap();
        let col = SceneCollection::new(
            "COPERNICUS/S2_SR_HARMONIZED",
            vec![
                scene("old_clear", 1, 0.0),
                scene("cloudy", 7, 60.0),
                scene("clear", 5, 2.0),
            ],
        );
        let picked = select_scene(col, &region, &window, "CLOUD_COVERAGE_ASSESSMENT").unwrap();
        assert_eq!(picked.id, "clear");
    }

    #[test]
    fn empty_selection_is_an_error() {
        let region = Region::new(2.8921599, 36.6802202, 5000.0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::trailing_months(now, 6).unwrap();
        let col = SceneCollection::new("s2", vec![scene("old", 1, 0.0)]);
        assert!(matches!(
            select_scene(col, &region, &window, "CLOUD_COVERAGE_ASSESSMENT"),
            Err(Error::NoImageryAvailable { .. })
        ));
    }
}
