//! Product writers: GeoTIFF rasters, CSV tables, JPEG previews with world
//! files, and JSON/XML metadata.
pub mod csv;
pub mod jpeg;
pub mod metadata;
pub mod tiff;
pub mod worldfile;
