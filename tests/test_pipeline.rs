use std::f64::consts::PI;
use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, Utc};
use tiff::decoder::{Decoder, DecodingResult};

use forestcover::core::collection::{Scene, SceneCollection};
use forestcover::core::grid::SampleGrid;
use forestcover::core::image::Image;
use forestcover::{
    DriveSink, Error, MemorySource, PipelineParams, RasterSource, build_region, demo_source,
    run_pipeline,
};

fn reference_time() -> DateTime<Utc> {
    "2024-06-30T00:00:00Z".parse().expect("valid timestamp")
}

fn demo(params: &PipelineParams) -> MemorySource {
    let region = build_region(params).expect("valid region");
    demo_source(&region, params, reference_time())
}

#[test]
fn test_default_run_end_to_end() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams::default();
    let sink = DriveSink::new(out.path()).expect("sink");

    let output = run_pipeline(&demo(&params), &sink, &params, reference_time(), None)
        .expect("pipeline run");

    assert!(output.mask.forest_pixels() > 0);
    assert_eq!(output.scene.id, "S2_clear");

    let stats = output.statistics;
    assert!(stats.forest_area_ha > 0.0);
    assert!(stats.nonforest_area_ha > 0.0);
    let disc_ha = PI * 5000.0 * 5000.0 / 10_000.0;
    assert_relative_eq!(stats.total_ha(), disc_ha, max_relative = 0.01);

    assert_eq!(
        output.exports.submitted(),
        vec![
            "Sidi_Abdallah_Forest_Classification",
            "Sidi_Abdallah_Sentinel_Imagery",
            "Sidi_Abdallah_Forest_Statistics",
        ]
    );
    assert!(output.exports.rejected.is_empty());
    assert!(output.previews.is_empty());

    let done = output.exports.wait_all();
    assert!(done.failed.is_empty(), "failed exports: {:?}", done.failed);
    assert_eq!(done.completed.len(), 3);

    for name in [
        "Sidi_Abdallah_Forest_Classification.tif",
        "Sidi_Abdallah_Forest_Classification.json",
        "Sidi_Abdallah_Sentinel_Imagery.tif",
        "Sidi_Abdallah_Sentinel_Imagery.json",
        "Sidi_Abdallah_Forest_Statistics.csv",
    ] {
        assert!(out.path().join(name).is_file(), "{name} missing");
    }
    assert!(!out.path().join("Sidi_Abdallah_NDVI.tif").exists());

    let csv = std::fs::read_to_string(out.path().join("Sidi_Abdallah_Forest_Statistics.csv"))
        .expect("statistics table");
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("forest_area_ha,nonforest_area_ha"));
    let row: Vec<f64> = lines
        .next()
        .expect("data row")
        .split(',')
        .map(|v| v.parse().expect("number"))
        .collect();
    assert_relative_eq!(row[0], stats.forest_area_ha, max_relative = 1e-9);
    assert_relative_eq!(row[1], stats.nonforest_area_ha, max_relative = 1e-9);
    assert_eq!(lines.next(), None);
}

#[test]
fn test_classification_raster_is_clipped_to_region() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams::default();
    let sink = DriveSink::new(out.path()).expect("sink");
    let output = run_pipeline(&demo(&params), &sink, &params, reference_time(), None)
        .expect("pipeline run");
    let region = output.region.clone();
    assert!(output.exports.wait_all().failed.is_empty());

    let path = out.path().join("Sidi_Abdallah_Forest_Classification.tif");
    let mut decoder = Decoder::new(File::open(path).expect("open tif")).expect("decoder");
    assert_eq!(decoder.dimensions().expect("dimensions"), (334, 334));
    let data = match decoder.read_image().expect("pixels") {
        DecodingResult::U8(v) => v,
        _ => panic!("classification should be 8-bit"),
    };

    // corners are outside the disc
    assert_eq!(data[0], 255);
    assert_eq!(data[data.len() - 1], 255);
    assert!(data.iter().all(|&v| v == 0 || v == 1 || v == 255));

    let grid = SampleGrid::covering(&region, 30.0).expect("grid");
    let classified = data.iter().filter(|&&v| v != 255).count() as u64;
    assert_eq!(classified, grid.count_in(&region));
    let forest = data.iter().filter(|&&v| v == 1).count();
    assert!(forest > 0 && (forest as u64) < classified);
}

#[test]
fn test_ndvi_and_previews_when_enabled() {
    let out = tempfile::tempdir().expect("temp dir");
    let previews = out.path().join("previews");
    let params = PipelineParams {
        export_ndvi: true,
        previews: true,
        ..PipelineParams::default()
    };
    let sink = DriveSink::new(out.path()).expect("sink");
    let output = run_pipeline(
        &demo(&params),
        &sink,
        &params,
        reference_time(),
        Some(previews.as_path()),
    )
    .expect("pipeline run");

    let ndvi = output.ndvi.clone().expect("ndvi image");
    let values = ndvi.band("NDVI").expect("NDVI band");
    // clipped to the disc: NaN in the corners, valid ratios inside
    assert!(values[[0, 0]].is_nan());
    assert!(values
        .iter()
        .filter(|v| !v.is_nan())
        .all(|v| (-1.0..=1.0).contains(v)));

    assert_eq!(output.previews.len(), 3);
    for preview in &output.previews {
        assert!(preview.is_file());
        assert!(preview.with_extension("jgw").is_file());
        assert!(preview.with_extension("prj").is_file());
    }

    assert_eq!(output.exports.submitted().len(), 4);
    let done = output.exports.wait_all();
    assert!(done.failed.is_empty(), "failed exports: {:?}", done.failed);
    assert!(out.path().join("Sidi_Abdallah_NDVI.tif").is_file());
}

#[test]
fn test_previews_need_a_directory() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams {
        previews: true,
        ..PipelineParams::default()
    };
    let sink = DriveSink::new(out.path()).expect("sink");
    let err = run_pipeline(&demo(&params), &sink, &params, reference_time(), None)
        .expect_err("no preview dir");
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_no_imagery_in_window() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams::default();
    let sink = DriveSink::new(out.path()).expect("sink");
    // every demo scene is newer than the window ending two years earlier
    let stale = reference_time() - Duration::days(730);
    let err = run_pipeline(&demo(&params), &sink, &params, stale, None).expect_err("no scenes");
    match err {
        Error::NoImageryAvailable { collection, .. } => {
            assert_eq!(collection, params.reference_collection)
        }
        other => panic!("unexpected error: {other}"),
    }
    // nothing was exported
    assert_eq!(std::fs::read_dir(out.path()).expect("read dir").count(), 0);
}

#[test]
fn test_missing_change_layer() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams::default();
    let source = MemorySource::new()
        .with_band(&params.forest_dataset, &params.cover_band, |_, _| 60.0)
        .with_band(&params.forest_dataset, &params.loss_band, |_, _| 0.0);
    let sink = DriveSink::new(out.path()).expect("sink");
    match run_pipeline(&source, &sink, &params, reference_time(), None) {
        Err(Error::DataUnavailable { dataset, band }) => {
            assert_eq!(dataset, params.forest_dataset);
            assert_eq!(band, "gain");
        }
        other => panic!("unexpected result: {:?}", other.map(|o| o.scene)),
    }
}

#[test]
fn test_aggregation_budget_aborts_run() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams {
        max_pixels: 1_000,
        ..PipelineParams::default()
    };
    let sink = DriveSink::new(out.path()).expect("sink");
    let err = run_pipeline(&demo(&params), &sink, &params, reference_time(), None)
        .expect_err("budget too small");
    assert!(matches!(
        err,
        Error::ResourceLimitExceeded {
            max_pixels: 1_000,
            ..
        }
    ));
}

#[test]
fn test_invalid_threshold_is_rejected_up_front() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams {
        forest_threshold: 120.0,
        ..PipelineParams::default()
    };
    let sink = DriveSink::new(out.path()).expect("sink");
    let err = run_pipeline(&MemorySource::new(), &sink, &params, reference_time(), None)
        .expect_err("threshold out of range");
    assert!(matches!(err, Error::Configuration(_)));
}

/// Source that counts the pixels it is asked to read
struct CountingSource {
    inner: MemorySource,
    pixels_read: AtomicUsize,
}

impl RasterSource for CountingSource {
    fn read_image(
        &self,
        dataset: &str,
        bands: &[&str],
        grid: &SampleGrid,
    ) -> forestcover::Result<Image> {
        self.pixels_read
            .fetch_add(bands.len() * grid.len() as usize, Ordering::SeqCst);
        self.inner.read_image(dataset, bands, grid)
    }

    fn list_scenes(&self, collection: &str) -> forestcover::Result<SceneCollection> {
        self.inner.list_scenes(collection)
    }

    fn read_scene(
        &self,
        collection: &str,
        scene: &Scene,
        bands: &[&str],
        grid: &SampleGrid,
    ) -> forestcover::Result<Image> {
        self.pixels_read
            .fetch_add(bands.len() * grid.len() as usize, Ordering::SeqCst);
        self.inner.read_scene(collection, scene, bands, grid)
    }
}

#[test]
fn test_budget_is_checked_before_any_read() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams {
        max_pixels: 1_000,
        ..PipelineParams::default()
    };
    let source = CountingSource {
        inner: demo(&params),
        pixels_read: AtomicUsize::new(0),
    };
    let sink = DriveSink::new(out.path()).expect("sink");
    let err = run_pipeline(&source, &sink, &params, reference_time(), None)
        .expect_err("budget too small");
    assert!(matches!(err, Error::ResourceLimitExceeded { .. }));
    assert_eq!(source.pixels_read.load(Ordering::SeqCst), 0);
}

#[test]
fn test_partial_change_layer_is_unavailable() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams::default();
    let lat = params.center_lat;
    // gain has no data over the southern half of the disc
    let source = demo(&params).with_band(&params.forest_dataset, &params.gain_band, move |_, y| {
        if y < lat { f64::NAN } else { 0.0 }
    });
    let sink = DriveSink::new(out.path()).expect("sink");
    match run_pipeline(&source, &sink, &params, reference_time(), None) {
        Err(Error::DataUnavailable { dataset, band }) => {
            assert_eq!(dataset, params.forest_dataset);
            assert_eq!(band, params.gain_band);
        }
        other => panic!("unexpected result: {:?}", other.map(|o| o.scene)),
    }
    assert_eq!(std::fs::read_dir(out.path()).expect("read dir").count(), 0);
}

#[test]
fn test_region_over_the_antimeridian_is_rejected() {
    let out = tempfile::tempdir().expect("temp dir");
    let params = PipelineParams {
        center_lon: 179.99,
        center_lat: -17.0,
        ..PipelineParams::default()
    };
    let sink = DriveSink::new(out.path()).expect("sink");
    let err = run_pipeline(&MemorySource::new(), &sink, &params, reference_time(), None)
        .expect_err("crosses the antimeridian");
    assert!(matches!(err, Error::Configuration(_)));
}
