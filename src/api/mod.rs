//! High-level library API: run the whole forest/non-forest pipeline against a
//! raster source and an export sink. Prefer this entrypoint over the low-level
//! `core` stages when integrating the crate.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::collection::Scene;
use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::core::params::PipelineParams;
use crate::core::processing::aggregate::{AreaStatistics, aggregate_areas, check_pixel_budget};
use crate::core::processing::classify::{ForestMask, classify_forest};
use crate::core::processing::ops::{clip_array, ndvi};
use crate::core::processing::render::{Layer, VisParams, write_preview};
use crate::core::region::Region;
use crate::core::selection::{find_reference_scene, select_reference_image};
use crate::error::{Error, Result};
use crate::io::export::{ExportReport, ExportSink, ExportTask, export_all};
use crate::io::source::RasterSource;
use crate::io::writers::metadata::{RunMetadata, extract_metadata_fields};
use crate::types::PixelType;

/// Everything a run produced, with export jobs possibly still running
#[derive(Debug)]
pub struct PipelineOutput {
    pub region: Region,
    pub mask: ForestMask,
    pub scene: Scene,
    /// Reference bands of the selected scene, in display order; `None` when
    /// the reference grid exceeds the pixel budget and was never read
    pub reference: Option<Arc<Image>>,
    pub ndvi: Option<Arc<Image>>,
    pub statistics: AreaStatistics,
    pub exports: ExportReport,
    pub previews: Vec<PathBuf>,
}

/// Region of interest described by `params`
pub fn build_region(params: &PipelineParams) -> Result<Region> {
    Region::new(params.center_lon, params.center_lat, params.radius_m)
}

/// Export tasks for one run, in submission order. Products whose image is
/// missing are left out.
pub fn build_export_tasks(
    params: &PipelineParams,
    region: &Region,
    classification: Arc<Image>,
    reference: Option<Arc<Image>>,
    ndvi: Option<Arc<Image>>,
    statistics: AreaStatistics,
    run: &RunMetadata,
) -> Vec<ExportTask> {
    let metadata = extract_metadata_fields(run);
    let mut tasks = vec![
        ExportTask::raster(
            &params.classification_name,
            classification,
            PixelType::U8,
            region,
            params.classification_scale,
            params.max_pixels,
        )
        .with_metadata(metadata.clone()),
    ];
    if let Some(reference) = reference {
        tasks.push(
            ExportTask::raster(
                &params.imagery_name,
                reference,
                PixelType::U16,
                region,
                params.reference_scale,
                params.max_pixels,
            )
            .with_metadata(metadata.clone()),
        );
    }
    tasks.push(ExportTask::table(&params.statistics_name, statistics));
    if params.export_ndvi {
        if let Some(ndvi) = ndvi {
            tasks.push(
                ExportTask::raster(
                    &params.ndvi_name,
                    ndvi,
                    PixelType::F32,
                    region,
                    params.reference_scale,
                    params.max_pixels,
                )
                .with_metadata(metadata),
            );
        }
    }
    tasks
}

fn reference_read_bands(params: &PipelineParams) -> Vec<&str> {
    let mut bands: Vec<&str> = params.reference_bands.iter().map(String::as_str).collect();
    if params.export_ndvi || params.previews {
        for band in [params.nir_band.as_str(), params.red_band.as_str()] {
            if !bands.contains(&band) {
                bands.push(band);
            }
        }
    }
    bands
}

fn render_previews(
    dir: &Path,
    params: &PipelineParams,
    region: &Region,
    classification: &Image,
    reference: Option<&Image>,
    ndvi: Option<&Image>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut layers = Vec::new();
    if let Some(reference) = reference {
        layers.push((
            Layer {
                name: "Sentinel-2 Imagery".to_string(),
                visible: false,
                vis: VisParams::true_color(&params.reference_bands),
            },
            reference,
        ));
    }
    layers.push((
        Layer {
            name: "Forest/Non-Forest".to_string(),
            visible: true,
            vis: VisParams::forest(),
        },
        classification,
    ));
    if let Some(ndvi) = ndvi {
        layers.push((
            Layer {
                name: "NDVI".to_string(),
                visible: false,
                vis: VisParams::ndvi(),
            },
            ndvi,
        ));
    }
    layers
        .iter()
        .map(|(layer, image)| write_preview(dir, layer, image, region))
        .collect()
}

/// Run classification, reference selection, aggregation and exports.
///
/// `reference_time` ends the imagery window; the library never reads the
/// clock. Stage failures abort the run; export failures are collected per job
/// in [`PipelineOutput::exports`]. Previews, when enabled in `params`, are
/// written into `preview_dir`.
///
/// The pixel budget is checked before any read: an over-budget region fails
/// the whole run, while an over-budget reference grid only skips reading the
/// imagery and rejects the exports built from it.
pub fn run_pipeline<S, K>(
    source: &S,
    sink: &K,
    params: &PipelineParams,
    reference_time: DateTime<Utc>,
    preview_dir: Option<&Path>,
) -> Result<PipelineOutput>
where
    S: RasterSource + ?Sized,
    K: ExportSink + ?Sized,
{
    params.validate()?;
    let preview_dir = match (params.previews, preview_dir) {
        (true, None) => {
            return Err(Error::config(
                "previews are enabled but no preview directory was given",
            ));
        }
        (true, Some(dir)) => Some(dir),
        (false, _) => None,
    };

    let region = build_region(params)?;
    info!(
        "Region: {:.2} ha disc around ({}, {})",
        region.area_ha(),
        params.center_lon,
        params.center_lat
    );

    // budgets are settled before the source is touched
    let class_grid = check_pixel_budget(&region, params.classification_scale, params.max_pixels)?;
    let ref_grid = SampleGrid::covering(&region, params.reference_scale)?;
    let ref_pixels = ref_grid.len();
    let ref_over_budget = ref_pixels > params.max_pixels;

    let mask = classify_forest(source, params, &region, &class_grid)?;

    let (scene, scene_image) = if ref_over_budget {
        warn!(
            "Reference grid of {} pixels exceeds the budget of {}; imagery is not read",
            ref_pixels, params.max_pixels
        );
        let scene = find_reference_scene(
            source,
            &params.reference_collection,
            &region,
            reference_time,
            params.window_months,
            &params.sort_key,
        )?;
        (scene, None)
    } else {
        let (scene, image) = select_reference_image(
            source,
            &params.reference_collection,
            &region,
            reference_time,
            params.window_months,
            &params.sort_key,
            &reference_read_bands(params),
            &ref_grid,
        )?;
        (scene, Some(image))
    };
    let rgb: Vec<&str> = params.reference_bands.iter().map(String::as_str).collect();
    let reference = match &scene_image {
        Some(image) => Some(Arc::new(image.select(&rgb)?)),
        None => None,
    };
    let ndvi = match &scene_image {
        Some(image) if params.export_ndvi || params.previews => {
            let full = ndvi(image, &params.nir_band, &params.red_band)?;
            let clipped = clip_array(full.band("NDVI")?, &ref_grid.clip_mask(&region), f64::NAN);
            Some(Arc::new(
                Image::new(scene.id.clone(), ref_grid.clone()).with_band("NDVI", clipped)?,
            ))
        }
        _ => None,
    };

    let statistics = aggregate_areas(
        &mask,
        &region,
        params.classification_scale,
        params.max_pixels,
    )?;

    let classification = Arc::new(mask.to_image(&params.classification_name)?);
    let run = RunMetadata {
        center_lon: params.center_lon,
        center_lat: params.center_lat,
        radius_m: params.radius_m,
        forest_threshold: params.forest_threshold,
        forest_dataset: params.forest_dataset.clone(),
        reference_collection: params.reference_collection.clone(),
        reference_scene: Some(scene.id.clone()),
        reference_time,
    };
    let tasks = build_export_tasks(
        params,
        &region,
        classification.clone(),
        reference.clone(),
        ndvi.clone(),
        statistics,
        &run,
    );
    let mut exports = export_all(sink, tasks);
    if ref_over_budget {
        let mut skipped = vec![params.imagery_name.clone()];
        if params.export_ndvi {
            skipped.push(params.ndvi_name.clone());
        }
        for name in skipped {
            exports.rejected.push((
                name,
                Error::ResourceLimitExceeded {
                    pixels: ref_pixels,
                    max_pixels: params.max_pixels,
                },
            ));
        }
    }
    info!(
        "Submitted {} export(s), {} rejected",
        exports.jobs.len(),
        exports.rejected.len()
    );

    let previews = match preview_dir {
        Some(dir) => render_previews(
            dir,
            params,
            &region,
            &classification,
            reference.as_deref(),
            ndvi.as_deref(),
        )?,
        None => Vec::new(),
    };

    Ok(PipelineOutput {
        region,
        mask,
        scene,
        reference,
        ndvi,
        statistics,
        exports,
        previews,
    })
}
