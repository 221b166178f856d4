//! shortgen automates short vertical videos: it binds randomized values into
//! an HTML template, renders the page in a visible browser window placed on a
//! predetermined capture rectangle, records that region (or the uniquely
//! titled window) with the system `ffmpeg` for a fixed duration, then
//! validates the artifact and removes transients.
//!
//! # Pipeline overview
//!
//! 1. **Content**: draw distinct random values, bind `{numeroN}` placeholders
//! 2. **Surface**: open a chromeless browser view sized to the capture region
//! 3. **Capture**: run the external encoder against the region/window
//! 4. **Lifecycle**: settle delays, teardown, transient cleanup, validation
//!
//! Jobs are strictly sequential; each owns its surface, capture process, and
//! transient document, all torn down on every exit path.
#![forbid(unsafe_code)]

pub mod capture;
pub mod content;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod surface;

pub use capture::{
    CaptureConfig, CaptureProcess, CaptureRegion, CaptureReport, CaptureSource, CaptureStrategy,
    Grabber,
};
pub use content::{ContentBinding, RenderedDocument, distinct_values};
pub use error::{ShortgenError, ShortgenResult};
pub use job::{Job, PipelineConfig, ValueSpec};
pub use pipeline::run_job;
pub use surface::{ChromeLauncher, RenderSurface, SurfaceGeometry, SurfaceLauncher};
