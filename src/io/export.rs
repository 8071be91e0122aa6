//! Fire-and-forget product exports.
//!
//! A task is submitted to an [`ExportSink`], which validates it (pixel budget,
//! destination name) and hands back a [`JobHandle`] right away. The work itself
//! runs on a worker thread; callers may wait on the handle or drop it. Tasks do
//! not share state, so one failing export never affects another.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use ndarray::Array2;
use tracing::{info, warn};

use crate::core::grid::SampleGrid;
use crate::core::image::Image;
use crate::core::processing::aggregate::AreaStatistics;
use crate::core::processing::resample::resample_nearest;
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::io::writers::csv::write_statistics_csv;
use crate::io::writers::metadata::write_json_sidecar;
use crate::io::writers::tiff::{RasterData, write_geotiff};
use crate::types::{ExportFormat, PixelType};

/// What an export writes
#[derive(Debug, Clone)]
pub enum ExportPayload {
    /// Raster resampled to `scale` metres over the region's bounds, nodata outside the disc
    Raster {
        image: Arc<Image>,
        pixel_type: PixelType,
        region: Region,
        scale: f64,
    },
    /// One-row area table
    Table(AreaStatistics),
}

/// A single export request
#[derive(Debug, Clone)]
pub struct ExportTask {
    /// Destination name, also the output file stem
    pub description: String,
    pub payload: ExportPayload,
    pub max_pixels: u64,
    /// Key/value pairs written to the product metadata
    pub metadata: HashMap<String, String>,
}

impl ExportTask {
    pub fn raster(
        description: &str,
        image: Arc<Image>,
        pixel_type: PixelType,
        region: &Region,
        scale: f64,
        max_pixels: u64,
    ) -> Self {
        Self {
            description: description.to_string(),
            payload: ExportPayload::Raster {
                image,
                pixel_type,
                region: region.clone(),
                scale,
            },
            max_pixels,
            metadata: HashMap::new(),
        }
    }

    pub fn table(description: &str, stats: AreaStatistics) -> Self {
        Self {
            description: description.to_string(),
            payload: ExportPayload::Table(stats),
            max_pixels: u64::MAX,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn format(&self) -> ExportFormat {
        match self.payload {
            ExportPayload::Raster { .. } => ExportFormat::GeoTiff,
            ExportPayload::Table(_) => ExportFormat::Csv,
        }
    }
}

/// Handle to a running export
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    description: String,
    handle: JoinHandle<Result<PathBuf>>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the export finishes; returns the written product path
    pub fn wait(self) -> Result<PathBuf> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::export(&self.description, "export worker panicked")),
        }
    }
}

/// Destination accepting export tasks
pub trait ExportSink {
    /// Validate and start `task`; errors here concern this task only
    fn submit(&self, task: ExportTask) -> Result<JobHandle>;
}

/// Sink writing products into a local directory
#[derive(Debug)]
pub struct DriveSink {
    out_dir: PathBuf,
    next_id: AtomicU64,
}

impl DriveSink {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self {
            out_dir,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

fn check_description(description: &str) -> Result<()> {
    let valid = !description.is_empty()
        && description
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !description.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!(
            "invalid export name `{}`: use letters, digits, '_', '-' or '.'",
            description
        )))
    }
}

impl ExportSink for DriveSink {
    fn submit(&self, task: ExportTask) -> Result<JobHandle> {
        check_description(&task.description)?;
        if let ExportPayload::Raster { region, scale, .. } = &task.payload {
            let pixels = SampleGrid::covering(region, *scale)?.len();
            if pixels > task.max_pixels {
                return Err(Error::ResourceLimitExceeded {
                    pixels,
                    max_pixels: task.max_pixels,
                });
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let description = task.description.clone();
        let out_dir = self.out_dir.clone();
        let handle = std::thread::Builder::new()
            .name(format!("export-{id}"))
            .spawn(move || run_task(&out_dir, task))?;
        info!(
            "Submitted export #{} `{}` to {:?}",
            id, description, self.out_dir
        );
        Ok(JobHandle {
            id,
            description,
            handle,
        })
    }
}

fn single_band<'a>(image: &'a Image, pixel_type: PixelType) -> Result<&'a Array2<f64>> {
    match image.bands() {
        [band] => Ok(&band.data),
        bands => Err(Error::config(format!(
            "{} export of `{}` needs exactly one band, found {}",
            pixel_type,
            image.id,
            bands.len()
        ))),
    }
}

/// Convert an image clipped by `inside` to the sample type of the product
pub fn to_raster_data(
    image: &Image,
    inside: &Array2<bool>,
    pixel_type: PixelType,
) -> Result<RasterData> {
    let nodata = pixel_type.nodata();
    match pixel_type {
        PixelType::U8 => {
            let band = single_band(image, pixel_type)?;
            Ok(RasterData::Gray8(
                band.iter()
                    .zip(inside.iter())
                    .map(|(&v, &keep)| {
                        if keep && v.is_finite() {
                            v.round().clamp(0.0, 254.0) as u8
                        } else {
                            nodata as u8
                        }
                    })
                    .collect(),
            ))
        }
        PixelType::U16 => {
            let bands = image.bands();
            if bands.len() != 3 {
                return Err(Error::config(format!(
                    "U16 export of `{}` needs three bands, found {}",
                    image.id,
                    bands.len()
                )));
            }
            let mut data = Vec::with_capacity(inside.len() * 3);
            for (i, &keep) in inside.iter().enumerate() {
                let (r, c) = (i / inside.ncols(), i % inside.ncols());
                for band in bands {
                    let v = band.data[[r, c]];
                    data.push(if keep && v.is_finite() {
                        v.round().clamp(0.0, u16::MAX as f64) as u16
                    } else {
                        nodata as u16
                    });
                }
            }
            Ok(RasterData::Rgb16(data))
        }
        PixelType::F32 => {
            let band = single_band(image, pixel_type)?;
            Ok(RasterData::Gray32Float(
                band.iter()
                    .zip(inside.iter())
                    .map(|(&v, &keep)| if keep && v.is_finite() { v as f32 } else { f32::NAN })
                    .collect(),
            ))
        }
    }
}

fn run_task(out_dir: &Path, task: ExportTask) -> Result<PathBuf> {
    let path = out_dir.join(format!("{}.{}", task.description, task.format().extension()));
    match &task.payload {
        ExportPayload::Raster {
            image,
            pixel_type,
            region,
            scale,
        } => {
            let grid = SampleGrid::covering(region, *scale)?;
            let resampled = resample_nearest(image, &grid, f64::NAN)?;
            let inside = grid.clip_mask(region);
            let data = to_raster_data(&resampled, &inside, *pixel_type)?;
            let (rows, cols) = grid.dim();

            let mut metadata = task.metadata.clone();
            metadata.insert("DESCRIPTION".to_string(), task.description.clone());
            metadata.insert("BANDS".to_string(), resampled.band_names().join(","));
            metadata.insert("SCALE_M".to_string(), scale.to_string());
            metadata.insert("PIXEL_TYPE".to_string(), pixel_type.to_string());

            write_geotiff(
                &path,
                cols,
                rows,
                &data,
                grid.geotransform(),
                pixel_type.nodata(),
                &metadata,
            )?;
            write_json_sidecar(
                &path,
                &metadata,
                Some(grid.geotransform()),
                Some("EPSG:4326"),
                Some(region.to_geojson()),
            )?;
        }
        ExportPayload::Table(stats) => write_statistics_csv(&path, stats)?,
    }
    info!("Export `{}` written to {:?}", task.description, path);
    Ok(path)
}

/// Outcome of a batch of exports
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Accepted jobs, still running or finished
    pub jobs: Vec<JobHandle>,
    /// Tasks refused at submission, with the reason
    pub rejected: Vec<(String, Error)>,
}

/// Outcome of waiting on every accepted job
#[derive(Debug, Default)]
pub struct CompletionReport {
    pub completed: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, Error)>,
}

impl ExportReport {
    pub fn submitted(&self) -> Vec<&str> {
        self.jobs.iter().map(JobHandle::description).collect()
    }

    /// Wait for every job; failures are logged and collected
    pub fn wait_all(self) -> CompletionReport {
        let mut report = CompletionReport::default();
        for job in self.jobs {
            let description = job.description().to_string();
            match job.wait() {
                Ok(path) => report.completed.push((description, path)),
                Err(e) => {
                    warn!("Export `{}` failed: {}", description, e);
                    report.failed.push((description, e));
                }
            }
        }
        report
    }
}

/// Submit every task independently; a refused task does not stop the others
pub fn export_all<S: ExportSink + ?Sized>(sink: &S, tasks: Vec<ExportTask>) -> ExportReport {
    let mut report = ExportReport::default();
    for task in tasks {
        let description = task.description.clone();
        match sink.submit(task) {
            Ok(job) => report.jobs.push(job),
            Err(e) => {
                warn!("Export `{}` was not submitted: {}", description, e);
                report.rejected.push((description, e));
            }
        }
    }
    report
}
