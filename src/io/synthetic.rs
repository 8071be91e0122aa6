//! Synthetic landscape around a region, served through `MemorySource`.
//!
//! Used by the CLI `--demo` mode and by tests: a rolling canopy-cover field,
//! one loss patch with a regrowth patch inside it, and a handful of optical
//! scenes around the reference time with different cloud scores.
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::core::collection::Scene;
use crate::core::params::PipelineParams;
use crate::core::region::Region;
use crate::io::source::{BandFn, MemorySource};

#[derive(Clone, Copy)]
struct LocalFrame {
    lon: f64,
    lat: f64,
    per_lon: f64,
    per_lat: f64,
}

impl LocalFrame {
    fn new(region: &Region) -> Self {
        let (lon, lat) = region.center();
        let (per_lon, per_lat) = region.metres_per_degree();
        Self {
            lon,
            lat,
            per_lon,
            per_lat,
        }
    }

    fn offset(&self, lon: f64, lat: f64) -> (f64, f64) {
        ((lon - self.lon) * self.per_lon, (lat - self.lat) * self.per_lat)
    }
}

fn canopy(frame: LocalFrame, lon: f64, lat: f64) -> f64 {
    let (x, y) = frame.offset(lon, lat);
    (50.0 + 50.0 * (x / 700.0).sin() * (y / 900.0).cos()).clamp(0.0, 100.0)
}

fn in_disc(frame: LocalFrame, lon: f64, lat: f64, cx: f64, cy: f64, r: f64) -> bool {
    let (x, y) = frame.offset(lon, lat);
    (x - cx).powi(2) + (y - cy).powi(2) < r * r
}

fn scene(id: &str, acquired: DateTime<Utc>, footprint: [f64; 4], cloud: f64, key: &str) -> Scene {
    Scene {
        id: id.to_string(),
        acquired,
        footprint,
        properties: BTreeMap::from([(key.to_string(), cloud)]),
    }
}

fn optical_bands(frame: LocalFrame, haze: f64) -> Vec<(&'static str, BandFn)> {
    let band = move |base: f64, slope: f64| -> BandFn {
        Arc::new(move |lon: f64, lat: f64| (base + slope * canopy(frame, lon, lat) + haze).max(0.0))
    };
    vec![
        ("B2", band(700.0, -2.0)),
        ("B3", band(900.0, -3.0)),
        ("B4", band(1200.0, -8.0)),
        ("B8", band(1500.0, 25.0)),
    ]
}

/// Demo source covering `region`, with scenes relative to `reference_time`
pub fn demo_source(
    region: &Region,
    params: &PipelineParams,
    reference_time: DateTime<Utc>,
) -> MemorySource {
    let frame = LocalFrame::new(region);
    let bounds = region.bounds();
    let footprint = [
        bounds.min().x - 0.5,
        bounds.min().y - 0.5,
        bounds.max().x + 0.5,
        bounds.max().y + 0.5,
    ];
    let elsewhere = [
        footprint[0] + 5.0,
        footprint[1],
        footprint[2] + 5.0,
        footprint[3],
    ];
    let key = params.sort_key.as_str();
    let days = Duration::days;
    let collection = params.reference_collection.as_str();

    MemorySource::new()
        .with_band(&params.forest_dataset, &params.cover_band, move |lon, lat| {
            canopy(frame, lon, lat)
        })
        .with_band(&params.forest_dataset, &params.loss_band, move |lon, lat| {
            if in_disc(frame, lon, lat, 1500.0, -800.0, 900.0) {
                12.0
            } else {
                0.0
            }
        })
        .with_band(&params.forest_dataset, &params.gain_band, move |lon, lat| {
            if in_disc(frame, lon, lat, 1500.0, -800.0, 300.0) {
                1.0
            } else {
                0.0
            }
        })
        .with_scene(
            collection,
            scene("S2_recent_cloudy", reference_time - days(20), footprint, 35.2, key),
            optical_bands(frame, 700.0),
        )
        .with_scene(
            collection,
            scene("S2_clear", reference_time - days(75), footprint, 1.4, key),
            optical_bands(frame, 0.0),
        )
        .with_scene(
            collection,
            scene("S2_hazy", reference_time - days(150), footprint, 8.0, key),
            optical_bands(frame, 150.0),
        )
        .with_scene(
            collection,
            scene("S2_last_year", reference_time - days(240), footprint, 0.2, key),
            optical_bands(frame, 0.0),
        )
        .with_scene(
            collection,
            scene("S2_elsewhere", reference_time - days(30), elsewhere, 0.0, key),
            optical_bands(frame, 0.0),
        )
}
