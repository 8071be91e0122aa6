//! Command Line Interface (CLI) layer for forestcover.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`): merge the parameter file with
//! flags, pick a raster source, run the pipeline and wait on the exports.
//!
//! If you are embedding forestcover into another application, prefer using
//! the high-level `forestcover::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
