//! Core pipeline building blocks: region and sampling grid, images and scene
//! collections, reference selection, and the processing stages (classification,
//! aggregation, resampling, rendering). These are internal primitives consumed
//! by the high-level `api` module.
pub mod collection;
pub mod grid;
pub mod image;
pub mod params;
pub mod processing;
pub mod region;
pub mod selection;
