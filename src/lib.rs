#![doc = r#"
forestcover: forest/non-forest mapping for a circular area of interest.

The crate classifies current forest cover from baseline canopy cover, loss and
gain layers (`(cover >= threshold AND NOT loss) OR gain`), selects the least
cloudy optical scene of a trailing window as reference imagery, sums forest and
non-forest area in hectares, and exports a classification raster, a reference
RGB raster and a statistics table. It powers the `forestcover` CLI and can be
embedded in your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may change.

Requirements
------------
- Rust 2024 edition toolchain.
- GDAL development headers and runtime only for the `gdal` feature.

Add dependency
--------------
```toml
[dependencies]
forestcover = { version = "0.1", features = ["full"] }
```

Quick start: synthetic landscape into a directory
-------------------------------------------------
```rust,no_run
use chrono::Utc;
use forestcover::{build_region, demo_source, run_pipeline, DriveSink, PipelineParams};

fn main() -> forestcover::Result<()> {
    let params = PipelineParams::default();
    let now = Utc::now();
    let source = demo_source(&build_region(&params)?, &params, now);
    let sink = DriveSink::new("/out")?;

    let output = run_pipeline(&source, &sink, &params, now, None)?;
    println!(
        "forest {:.1} ha, non-forest {:.1} ha, reference scene {}",
        output.statistics.forest_area_ha,
        output.statistics.nonforest_area_ha,
        output.scene.id
    );

    // Exports run in the background; wait for them before exiting
    let done = output.exports.wait_all();
    println!("{} product(s) written", done.completed.len());
    Ok(())
}
```

Local GeoTIFFs (feature `gdal`)
-------------------------------
```rust,ignore
use forestcover::{run_pipeline, DriveSink, GeoTiffSource, PipelineParams};

fn main() -> forestcover::Result<()> {
    let params = PipelineParams::from_json_file("run.json".as_ref())?;
    let source = GeoTiffSource::new("/data/rasters")?;
    let sink = DriveSink::new("/out")?;
    let reference_time = "2024-06-30T00:00:00Z".parse().expect("timestamp");
    run_pipeline(&source, &sink, &params, reference_time, None)?;
    Ok(())
}
```

Individual stages
-----------------
```rust
use forestcover::core::grid::SampleGrid;
use forestcover::core::processing::classify::classify;
use forestcover::core::region::Region;
use ndarray::Array2;

fn main() -> forestcover::Result<()> {
    let region = Region::new(2.8921599, 36.6802202, 5000.0)?;
    let grid = SampleGrid::covering(&region, 30.0)?;
    let cover = Array2::from_elem(grid.dim(), 35.0);
    let loss = Array2::zeros(grid.dim());
    let gain = Array2::zeros(grid.dim());
    let forest = classify(&cover, &loss, &gain, 20.0)?;
    assert!(forest.iter().all(|&f| f));
    Ok(())
}
```

Error handling
--------------
All public functions return `forestcover::Result<T>`; match on
`forestcover::Error` to handle specific cases.

```rust,no_run
use chrono::Utc;
use forestcover::{run_pipeline, DriveSink, Error, MemorySource, PipelineParams};

fn main() {
    let params = PipelineParams::default();
    let source = MemorySource::new();
    let sink = match DriveSink::new("/out") {
        Ok(sink) => sink,
        Err(e) => return eprintln!("{e}"),
    };
    match run_pipeline(&source, &sink, &params, Utc::now(), None) {
        Ok(_) => {}
        Err(Error::DataUnavailable { dataset, band }) => eprintln!("missing {band} in {dataset}"),
        Err(Error::NoImageryAvailable { .. }) => eprintln!("no reference scene"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Feature flags
-------------
- `gdal`: `GeoTiffSource`, reading a local tree of EPSG:4326 GeoTIFFs.
- `full`: enables every optional feature.

Useful modules
--------------
- [`api`]: high-level pipeline entry point.
- [`core`]: region, grid, images, scene collections and processing stages.
- [`io`]: raster sources, export sink and product writers.
- [`types`]: shared enums (`PixelType`, `ExportFormat`, `SortOrder`, `Color`).
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::params::PipelineParams;
pub use core::processing::aggregate::AreaStatistics;
pub use core::region::Region;
pub use error::{Error, Result};
pub use types::{ExportFormat, PixelType, SortOrder};

// Sources and sinks
pub use io::export::{DriveSink, ExportReport, ExportSink, ExportTask, JobHandle};
pub use io::source::{MemorySource, RasterSource};
pub use io::synthetic::demo_source;

#[cfg(feature = "gdal")]
pub use io::gdal::{GdalError, GeoTiffSource};

// High-level API re-exports
pub use api::{PipelineOutput, build_region, run_pipeline};
