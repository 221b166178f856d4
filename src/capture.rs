use std::{
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

use serde::{Deserialize, Serialize};

use crate::error::{ShortgenError, ShortgenResult};

/// Which capture source the pipeline records.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStrategy {
    /// A fixed rectangle of the display. Correct only while the render
    /// surface stays at its configured position.
    Region,
    /// A uniquely titled window, decoupled from position. Requires the title
    /// to be stamped and settled before capture starts.
    Window,
}

/// A fixed rectangle of the display surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Concrete capture source handed to the encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureSource {
    Region(CaptureRegion),
    Window { title: String, width: u32, height: u32 },
}

impl CaptureSource {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Region(r) => (r.width, r.height),
            Self::Window { width, height, .. } => (*width, *height),
        }
    }
}

/// The screen grabber the host platform provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grabber {
    /// `x11grab` desktop-region input (Linux).
    X11,
    /// `gdigrab` desktop-region or window-title input (Windows).
    Gdi,
}

impl Grabber {
    /// Grabber for the compilation target.
    pub fn host() -> ShortgenResult<Self> {
        if cfg!(target_os = "windows") {
            Ok(Self::Gdi)
        } else if cfg!(target_os = "linux") {
            Ok(Self::X11)
        } else {
            Err(ShortgenError::capture_start(
                "no screen grabber available for this platform",
            ))
        }
    }
}

/// One capture invocation of the external encoder.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    pub fps: u32,
    pub duration_secs: u64,
    pub out_path: PathBuf,
    /// Encoder program; the system `ffmpeg` in production, a stub in tests.
    pub encoder: PathBuf,
}

impl CaptureConfig {
    /// Check encoder preconditions.
    pub fn validate(&self) -> ShortgenResult<()> {
        let (width, height) = self.source.dimensions();
        if width == 0 || height == 0 {
            return Err(ShortgenError::validation(
                "capture width/height must be non-zero",
            ));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ShortgenError::validation(
                "capture width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps == 0 {
            return Err(ShortgenError::validation("capture fps must be non-zero"));
        }
        if self.duration_secs == 0 {
            return Err(ShortgenError::validation(
                "capture duration must be non-zero",
            ));
        }
        Ok(())
    }

    /// Full encoder argv for the host grabber.
    pub fn encoder_args(&self) -> ShortgenResult<Vec<String>> {
        self.encoder_args_for(Grabber::host()?)
    }

    /// Full encoder argv for an explicit grabber.
    ///
    /// The `-t` duration passed here is authoritative; the orchestrator waits
    /// on process exit rather than sleeping for the same length.
    pub fn encoder_args_for(&self, grabber: Grabber) -> ShortgenResult<Vec<String>> {
        let (width, height) = self.source.dimensions();
        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];

        match (&self.source, grabber) {
            (CaptureSource::Region(region), Grabber::X11) => {
                let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
                args.extend([
                    "-f".into(),
                    "x11grab".into(),
                    "-framerate".into(),
                    self.fps.to_string(),
                    "-video_size".into(),
                    format!("{width}x{height}"),
                    "-i".into(),
                    format!("{display}+{},{}", region.x, region.y),
                ]);
            }
            (CaptureSource::Region(region), Grabber::Gdi) => {
                args.extend([
                    "-f".into(),
                    "gdigrab".into(),
                    "-framerate".into(),
                    self.fps.to_string(),
                    "-offset_x".into(),
                    region.x.to_string(),
                    "-offset_y".into(),
                    region.y.to_string(),
                    "-video_size".into(),
                    format!("{width}x{height}"),
                    "-i".into(),
                    "desktop".into(),
                ]);
            }
            (CaptureSource::Window { title, .. }, Grabber::Gdi) => {
                args.extend([
                    "-f".into(),
                    "gdigrab".into(),
                    "-framerate".into(),
                    self.fps.to_string(),
                    "-i".into(),
                    format!("title={title}"),
                ]);
            }
            (CaptureSource::Window { .. }, Grabber::X11) => {
                return Err(ShortgenError::capture_start(
                    "window capture by title requires gdigrab; use region capture on this platform",
                ));
            }
        }

        args.extend([
            "-t".into(),
            self.duration_secs.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            self.out_path.display().to_string(),
        ]);
        Ok(args)
    }
}

/// Exit status and diagnostics of a finished capture process.
#[derive(Debug)]
pub struct CaptureReport {
    pub status: ExitStatus,
    pub stderr: String,
}

impl CaptureReport {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Handle to the running external recording process.
///
/// Exclusively owned by one job; the exit code and diagnostic stream must be
/// observed via [`CaptureProcess::await_completion`] before the artifact is
/// trusted.
#[derive(Debug)]
pub struct CaptureProcess {
    child: Child,
}

impl CaptureProcess {
    /// Launch the encoder against the configured source.
    pub fn spawn(cfg: &CaptureConfig) -> ShortgenResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        let args = cfg.encoder_args()?;
        tracing::debug!(encoder = %cfg.encoder.display(), ?args, "spawning capture process");

        let child = Command::new(&cfg.encoder)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ShortgenError::capture_start(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    cfg.encoder.display()
                ))
            })?;

        Ok(Self { child })
    }

    /// Block until the encoder exits and collect its diagnostics.
    ///
    /// The encoder stops itself after its fixed `-t` duration; waiting on
    /// exit rather than sleeping locally avoids reading a partially written
    /// artifact.
    pub fn await_completion(self) -> ShortgenResult<CaptureReport> {
        let output = self.child.wait_with_output().map_err(|e| {
            ShortgenError::capture_exit(format!("failed to wait for encoder exit: {e}"))
        })?;
        Ok(CaptureReport {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> ShortgenResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            use anyhow::Context as _;
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_cfg() -> CaptureConfig {
        CaptureConfig {
            source: CaptureSource::Region(CaptureRegion {
                x: 8,
                y: 31,
                width: 1080,
                height: 1920,
            }),
            fps: 30,
            duration_secs: 24,
            out_path: PathBuf::from("videos/video_1.mp4"),
            encoder: PathBuf::from("ffmpeg"),
        }
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = region_cfg();
        cfg.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = region_cfg();
        cfg.duration_secs = 0;
        assert!(cfg.validate().is_err());

        let cfg = CaptureConfig {
            source: CaptureSource::Region(CaptureRegion {
                x: 0,
                y: 0,
                width: 1081,
                height: 1920,
            }),
            ..region_cfg()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gdi_region_args_carry_offset_and_fixed_duration() {
        let args = region_cfg().encoder_args_for(Grabber::Gdi).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-f gdigrab"));
        assert!(joined.contains("-offset_x 8 -offset_y 31"));
        assert!(joined.contains("-video_size 1080x1920"));
        assert!(joined.contains("-i desktop"));
        assert!(joined.contains("-t 24"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.ends_with("videos/video_1.mp4"));
    }

    #[test]
    fn x11_region_args_encode_origin_in_the_input() {
        let args = region_cfg().encoder_args_for(Grabber::X11).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-f x11grab"));
        assert!(joined.contains("+8,31"));
        assert!(joined.contains("-video_size 1080x1920"));
    }

    #[test]
    fn window_args_target_the_title() {
        let cfg = CaptureConfig {
            source: CaptureSource::Window {
                title: "shortgen-1".to_string(),
                width: 1080,
                height: 1920,
            },
            ..region_cfg()
        };
        let args = cfg.encoder_args_for(Grabber::Gdi).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-i title=shortgen-1"));
        // Window capture follows the window, so no fixed offsets appear.
        assert!(!joined.contains("-offset_x"));
    }

    #[test]
    fn window_capture_without_gdigrab_is_a_start_error() {
        let cfg = CaptureConfig {
            source: CaptureSource::Window {
                title: "t".to_string(),
                width: 2,
                height: 2,
            },
            ..region_cfg()
        };
        let err = cfg.encoder_args_for(Grabber::X11).unwrap_err();
        assert!(matches!(err, ShortgenError::CaptureStart(_)));
    }

    #[test]
    fn spawn_failure_maps_to_capture_start() {
        let cfg = CaptureConfig {
            encoder: PathBuf::from("definitely-not-an-encoder-on-path"),
            out_path: std::env::temp_dir().join("shortgen_spawn_fail.mp4"),
            ..region_cfg()
        };
        // Argument building uses the host grabber; skip on unsupported hosts.
        if Grabber::host().is_err() {
            return;
        }
        let err = CaptureProcess::spawn(&cfg).unwrap_err();
        assert!(matches!(err, ShortgenError::CaptureStart(_)));
    }
}
