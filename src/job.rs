use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    capture::CaptureStrategy,
    error::{ShortgenError, ShortgenResult},
};

/// How many random values to draw and from which inclusive range.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueSpec {
    pub count: usize,
    pub min: u32,
    pub max: u32,
}

impl Default for ValueSpec {
    fn default() -> Self {
        Self {
            count: 4,
            min: 1,
            max: 26,
        }
    }
}

/// Pipeline configuration shared by all jobs of one invocation.
///
/// A single explicit value object passed through the pipeline; there is no
/// process-wide state beyond the active-job guard in [`crate::pipeline`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// HTML template containing `{numero1}..{numeroN}` placeholders.
    pub template: PathBuf,
    /// Directory for finished artifacts.
    pub output_dir: PathBuf,
    /// Directory for per-job transient documents.
    pub work_dir: PathBuf,
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// Capture origin on the display, x.
    pub offset_x: i32,
    /// Capture origin on the display, y.
    pub offset_y: i32,
    /// Window-manager decoration compensation added to the region origin.
    ///
    /// The render surface is positioned at `(offset_x, offset_y)`; if the
    /// window manager draws a title bar or borders, the rendered content sits
    /// at that position plus this delta. Applied only to region capture.
    pub decoration_x: i32,
    /// See `decoration_x`.
    pub decoration_y: i32,
    /// Encoder frame rate.
    pub fps: u32,
    /// Fixed capture duration in seconds; authoritative for the encoder.
    pub duration_secs: u64,
    /// Heuristic wait before capture starts, absorbing window-manager and
    /// renderer state propagation that has no completion signal.
    pub pre_settle_ms: u64,
    /// Heuristic wait after the surface closes, before cleanup/validation.
    pub post_settle_ms: u64,
    /// CSS selector that marks the document as ready to record.
    pub ready_selector: String,
    /// Bound on the readiness wait.
    pub ready_timeout_ms: u64,
    /// Region or window capture.
    pub strategy: CaptureStrategy,
    /// Window-title token; combined with the job id to make the surface
    /// uniquely identifiable for window capture.
    pub title_token: Option<String>,
    /// Random value specification.
    pub values: ValueSpec,
    /// External encoder program.
    pub encoder: PathBuf,
    /// Explicit browser binary; discovered on PATH when unset.
    pub browser: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("template.html"),
            output_dir: PathBuf::from("videos"),
            work_dir: PathBuf::from("."),
            width: 1080,
            height: 1920,
            offset_x: 0,
            offset_y: 0,
            decoration_x: 0,
            decoration_y: 0,
            fps: 30,
            duration_secs: 24,
            pre_settle_ms: 500,
            post_settle_ms: 250,
            ready_selector: "body".to_string(),
            ready_timeout_ms: 10_000,
            strategy: CaptureStrategy::Region,
            title_token: None,
            values: ValueSpec::default(),
            encoder: PathBuf::from("ffmpeg"),
            browser: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file.
    pub fn from_path(path: &Path) -> ShortgenResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ShortgenError::validation(format!("failed to read config '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_str(&raw).map_err(|e| {
            ShortgenError::validation(format!("failed to parse config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check preconditions before any side effect.
    pub fn validate(&self) -> ShortgenResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ShortgenError::validation(
                "capture width/height must be non-zero",
            ));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // The encoder targets yuv420p output, which needs even dimensions.
            return Err(ShortgenError::validation(
                "capture width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps == 0 {
            return Err(ShortgenError::validation("fps must be non-zero"));
        }
        if self.duration_secs == 0 {
            return Err(ShortgenError::validation(
                "capture duration must be non-zero",
            ));
        }
        if self.values.min > self.values.max {
            return Err(ShortgenError::validation(format!(
                "value range is empty: min {} > max {}",
                self.values.min, self.values.max
            )));
        }
        let range = u64::from(self.values.max) - u64::from(self.values.min) + 1;
        if self.values.count as u64 > range {
            return Err(ShortgenError::validation(format!(
                "cannot draw {} distinct values from [{}, {}]",
                self.values.count, self.values.min, self.values.max
            )));
        }
        if self.ready_selector.trim().is_empty() {
            return Err(ShortgenError::validation("ready selector must be non-empty"));
        }
        Ok(())
    }

    /// Build the job with identifier `id` against this configuration.
    pub fn job(&self, id: u64) -> Job {
        Job {
            id,
            config: self.clone(),
        }
    }

    /// Pre-capture settle delay.
    pub fn pre_settle(&self) -> Duration {
        Duration::from_millis(self.pre_settle_ms)
    }

    /// Post-capture settle delay.
    pub fn post_settle(&self) -> Duration {
        Duration::from_millis(self.post_settle_ms)
    }

    /// Bound on the readiness wait.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// One end-to-end video-generation request.
#[derive(Clone, Debug)]
pub struct Job {
    pub id: u64,
    pub config: PipelineConfig,
}

impl Job {
    /// Deterministic artifact path for this job.
    pub fn output_path(&self) -> PathBuf {
        self.config.output_dir.join(format!("video_{}.mp4", self.id))
    }

    /// Deterministic transient document path for this job.
    pub fn document_path(&self) -> PathBuf {
        self.config.work_dir.join(format!("temp_{}.html", self.id))
    }

    /// Unique window title stamped on the surface for window capture.
    pub fn window_title(&self) -> String {
        let token = self
            .config
            .title_token
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_NAME"));
        format!("{token}-{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn odd_dimensions_are_rejected() {
        let cfg = PipelineConfig {
            width: 1081,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_duration_is_rejected() {
        let cfg = PipelineConfig {
            duration_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_value_count_is_rejected() {
        let cfg = PipelineConfig {
            values: ValueSpec {
                count: 30,
                min: 1,
                max: 26,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn full_u32_value_range_is_accepted() {
        let cfg = PipelineConfig {
            values: ValueSpec {
                count: 4,
                min: 0,
                max: u32::MAX,
            },
            ..Default::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn job_paths_are_deterministic_and_disjoint() {
        let cfg = PipelineConfig::default();
        let a = cfg.job(1);
        let b = cfg.job(2);
        assert_eq!(a.output_path(), PathBuf::from("videos/video_1.mp4"));
        assert_eq!(a.document_path(), PathBuf::from("./temp_1.html"));
        assert_ne!(a.output_path(), b.output_path());
        assert_ne!(a.document_path(), b.document_path());
    }

    #[test]
    fn window_title_is_unique_per_job() {
        let cfg = PipelineConfig {
            title_token: Some("clip".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.job(3).window_title(), "clip-3");
        assert_ne!(cfg.job(1).window_title(), cfg.job(2).window_title());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = PipelineConfig {
            strategy: CaptureStrategy::Window,
            title_token: Some("t".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.strategy, CaptureStrategy::Window);
        assert_eq!(back.title_token.as_deref(), Some("t"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"duration_secs": 5}"#).unwrap();
        assert_eq!(cfg.duration_secs, 5);
        assert_eq!(cfg.width, 1080);
        assert_eq!(cfg.strategy, CaptureStrategy::Region);
    }
}
