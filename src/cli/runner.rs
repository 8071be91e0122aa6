use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use forestcover::io::source::RasterSource;
use forestcover::{DriveSink, PipelineParams, build_region, demo_source, run_pipeline};

use super::args::CliArgs;
use super::errors::AppError;

const PREVIEW_SUBDIR: &str = "previews";

fn parse_reference_time(value: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| AppError::InvalidReferenceTime {
            value: value.to_string(),
        })
}

/// Parameter file (or defaults) overridden by flags
fn merge_params(args: &CliArgs) -> Result<PipelineParams, AppError> {
    let mut params = match &args.config {
        Some(path) => {
            info!("Loading parameters from {:?}", path);
            PipelineParams::from_json_file(path)?
        }
        None => PipelineParams::default(),
    };
    if let Some(v) = args.lon {
        params.center_lon = v;
    }
    if let Some(v) = args.lat {
        params.center_lat = v;
    }
    if let Some(v) = args.radius {
        params.radius_m = v;
    }
    if let Some(v) = args.threshold {
        params.forest_threshold = v;
    }
    if let Some(v) = args.scale {
        params.classification_scale = v;
    }
    if let Some(v) = args.reference_scale {
        params.reference_scale = v;
    }
    if let Some(v) = args.max_pixels {
        params.max_pixels = v;
    }
    if let Some(v) = args.window_months {
        params.window_months = v;
    }
    if let Some(v) = &args.reference_time {
        params.reference_time = Some(parse_reference_time(v)?);
    }
    params.export_ndvi |= args.ndvi;
    params.previews |= args.previews;
    Ok(params)
}

fn open_source(
    args: &CliArgs,
    params: &PipelineParams,
    reference_time: DateTime<Utc>,
) -> Result<Box<dyn RasterSource>, AppError> {
    match (&args.source_dir, args.demo) {
        (Some(_), true) => Err(AppError::ConflictingArguments {
            first: "--source-dir".to_string(),
            second: "--demo".to_string(),
        }),
        (None, true) => {
            info!("Using the synthetic demo landscape");
            let region = build_region(params)?;
            Ok(Box::new(demo_source(&region, params, reference_time)))
        }
        #[cfg(feature = "gdal")]
        (Some(dir), false) => {
            info!("Reading rasters from {:?}", dir);
            Ok(Box::new(forestcover::GeoTiffSource::new(dir)?))
        }
        #[cfg(not(feature = "gdal"))]
        (Some(_), false) => Err(AppError::FeatureDisabled {
            arg: "--source-dir".to_string(),
            feature: "gdal".to_string(),
        }),
        (None, false) => Err(AppError::MissingArgument {
            arg: "--source-dir or --demo".to_string(),
        }),
    }
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let output_dir = args.output_dir.clone().ok_or(AppError::MissingArgument {
        arg: "--output-dir".to_string(),
    })?;
    let params = merge_params(&args)?;
    params.validate().map_err(AppError::from)?;

    // The only place the wall clock enters the pipeline
    let reference_time = params.reference_time.unwrap_or_else(Utc::now);
    info!("Reference window ends at {}", reference_time.to_rfc3339());

    let source = open_source(&args, &params, reference_time)?;
    let sink = DriveSink::new(&output_dir).map_err(AppError::from)?;
    let preview_dir = output_dir.join(PREVIEW_SUBDIR);

    let output = run_pipeline(
        source.as_ref(),
        &sink,
        &params,
        reference_time,
        Some(preview_dir.as_path()),
    )
    .map_err(AppError::from)?;

    println!(
        "Forest area (hectares): {:.4}",
        output.statistics.forest_area_ha
    );
    println!(
        "Non-forest area (hectares): {:.4}",
        output.statistics.nonforest_area_ha
    );
    println!("Reference scene: {}", output.scene.id);
    for path in &output.previews {
        info!("Preview: {:?}", path);
    }

    let rejected = output.exports.rejected.len();
    let total = rejected + output.exports.jobs.len();
    if args.no_wait {
        for job in &output.exports.jobs {
            info!("Export #{} `{}` left running", job.id(), job.description());
        }
        if rejected > 0 {
            return Err(AppError::ExportsFailed {
                failed: rejected,
                total,
            }
            .into());
        }
        return Ok(());
    }

    let done = output.exports.wait_all();
    for (name, path) in &done.completed {
        info!("Export `{}` complete: {:?}", name, path);
    }
    let failed = rejected + done.failed.len();
    if failed > 0 {
        warn!("{} of {} export(s) failed", failed, total);
        return Err(AppError::ExportsFailed { failed, total }.into());
    }
    info!("All {} export(s) complete in {:?}", total, output_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::parse_from([
            "forestcover",
            "--demo",
            "-o",
            "/tmp/out",
            "--lon",
            "-3.5",
            "--threshold",
            "30",
            "--ndvi",
            "--reference-time",
            "2024-06-30",
        ]);
        let params = merge_params(&args).unwrap();
        assert_eq!(params.center_lon, -3.5);
        assert_eq!(params.forest_threshold, 30.0);
        assert!(params.export_ndvi);
        assert_eq!(
            params.reference_time.unwrap().to_rfc3339(),
            "2024-06-30T00:00:00+00:00"
        );
        assert_eq!(params.radius_m, 5000.0);
    }

    #[test]
    fn reference_time_formats() {
        assert!(parse_reference_time("2024-06-30T12:00:00+02:00").is_ok());
        assert!(matches!(
            parse_reference_time("June 30"),
            Err(AppError::InvalidReferenceTime { .. })
        ));
    }

    #[test]
    fn a_source_is_required() {
        let args = CliArgs::parse_from(["forestcover", "-o", "/tmp/out"]);
        let params = PipelineParams::default();
        assert!(matches!(
            open_source(&args, &params, Utc::now()),
            Err(AppError::MissingArgument { .. })
        ));
    }
}
