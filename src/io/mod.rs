//! I/O layer: raster sources (in-memory, synthetic demo, GDAL-backed GeoTIFF
//! tree), scene catalogs, the export sink, and `writers` for GeoTIFF/CSV/JPEG
//! products and their metadata sidecars.
pub mod catalog;
pub mod export;
pub mod source;
pub mod synthetic;

pub use export::{DriveSink, ExportSink, ExportTask, JobHandle};
pub use source::{MemorySource, RasterSource};

#[cfg(feature = "gdal")]
pub mod gdal;
#[cfg(feature = "gdal")]
pub use gdal::{GdalError, GdalMetadata, GdalRaster, GeoTiffSource};

pub mod writers;
