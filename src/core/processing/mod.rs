pub mod aggregate;
pub mod classify;
pub mod ops;
pub mod render;
pub mod resample;
