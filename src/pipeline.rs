use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    capture::{
        CaptureConfig, CaptureProcess, CaptureRegion, CaptureReport, CaptureSource,
        CaptureStrategy,
    },
    content::{ContentBinding, RenderedDocument},
    error::{ShortgenError, ShortgenResult},
    job::Job,
    surface::{RenderSurface, SurfaceGeometry, SurfaceLauncher},
};

/// Serializes jobs within the process.
///
/// Concurrent jobs against the same screen region or window title would
/// corrupt the capture, so one job runs at a time.
static ACTIVE_JOB: Mutex<()> = Mutex::new(());

/// Drive one job end-to-end and return the validated artifact path.
///
/// The sequence is fixed: prepare content, open the surface, wait for
/// readiness, settle, record for the fixed duration, tear down, clean up,
/// validate. Failure at any step after the surface opens still closes the
/// surface and removes the transient document before the error propagates.
pub fn run_job(job: &Job, launcher: &dyn SurfaceLauncher) -> ShortgenResult<PathBuf> {
    let _guard = ACTIVE_JOB.lock().unwrap_or_else(|e| e.into_inner());
    let cfg = &job.config;
    cfg.validate()?;

    tracing::info!(job = job.id, stage = "preparing", "generating content");
    fs::create_dir_all(&cfg.output_dir).map_err(|e| {
        ShortgenError::validation(format!(
            "failed to create output directory '{}': {e}",
            cfg.output_dir.display()
        ))
    })?;
    fs::create_dir_all(&cfg.work_dir).map_err(|e| {
        ShortgenError::validation(format!(
            "failed to create work directory '{}': {e}",
            cfg.work_dir.display()
        ))
    })?;

    let binding = ContentBinding::generate(cfg.values.count, cfg.values.min, cfg.values.max)?;
    let mut document =
        RenderedDocument::materialize(&cfg.template, &binding, job.document_path())?;

    tracing::info!(job = job.id, stage = "rendering", "opening render surface");
    let geometry = SurfaceGeometry {
        width: cfg.width,
        height: cfg.height,
        x: cfg.offset_x,
        y: cfg.offset_y,
    };
    let mut surface = match launcher.open(document.path(), &geometry) {
        Ok(surface) => surface,
        Err(e) => {
            document.remove();
            return Err(e);
        }
    };

    // Everything from here on must run teardown before surfacing an error.
    let report = record(job, surface.as_mut());
    surface.close();
    std::thread::sleep(cfg.post_settle());
    document.remove();

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            discard_partial(&job.output_path());
            return Err(e);
        }
    };

    tracing::info!(job = job.id, stage = "validating", "checking artifact");
    let out_path = job.output_path();
    validate_artifact(&out_path, &report.stderr)?;

    tracing::info!(job = job.id, artifact = %out_path.display(), "job complete");
    Ok(out_path)
}

/// Readiness wait through capture completion, against an open surface.
fn record(job: &Job, surface: &mut dyn RenderSurface) -> ShortgenResult<CaptureReport> {
    let cfg = &job.config;

    surface.await_ready(&cfg.ready_selector, cfg.ready_timeout())?;

    let source = match cfg.strategy {
        CaptureStrategy::Region => CaptureSource::Region(CaptureRegion {
            x: cfg.offset_x + cfg.decoration_x,
            y: cfg.offset_y + cfg.decoration_y,
            width: cfg.width,
            height: cfg.height,
        }),
        CaptureStrategy::Window => {
            let title = job.window_title();
            surface.set_title(&title)?;
            CaptureSource::Window {
                title,
                width: cfg.width,
                height: cfg.height,
            }
        }
    };

    // Absorbs window-manager and renderer propagation (title update, layout
    // reflow) that has no observable completion signal.
    std::thread::sleep(cfg.pre_settle());

    tracing::info!(
        job = job.id,
        stage = "recording",
        duration_secs = cfg.duration_secs,
        "starting capture"
    );
    let capture = CaptureProcess::spawn(&CaptureConfig {
        source,
        fps: cfg.fps,
        duration_secs: cfg.duration_secs,
        out_path: job.output_path(),
        encoder: cfg.encoder.clone(),
    })?;

    let report = capture.await_completion()?;
    if !report.success() {
        return Err(ShortgenError::capture_exit(format!(
            "encoder exited with status {}: {}",
            report.status, report.stderr
        )));
    }
    Ok(report)
}

/// Existence and non-zero size are the success criteria for the artifact.
fn validate_artifact(path: &Path, encoder_stderr: &str) -> ShortgenResult<()> {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        discard_partial(path);
        let diagnostics = if encoder_stderr.is_empty() {
            "no encoder diagnostics captured".to_string()
        } else {
            format!("encoder diagnostics: {encoder_stderr}")
        };
        return Err(ShortgenError::artifact_missing(format!(
            "expected non-empty artifact at '{}'; {diagnostics}",
            path.display()
        )));
    }
    Ok(())
}

/// A failed or killed capture must not leave a short artifact behind that a
/// caller could mistake for valid output.
fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "discarded partial artifact");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to discard partial artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_artifact_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_artifact(&dir.path().join("video_9.mp4"), "enc said no").unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ShortgenError::ArtifactMissing(_)));
        assert!(msg.contains("enc said no"));
    }

    #[test]
    fn validate_artifact_rejects_empty_file_and_discards_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video_9.mp4");
        fs::write(&path, b"").unwrap();
        assert!(validate_artifact(&path, "").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn validate_artifact_accepts_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video_9.mp4");
        fs::write(&path, b"mp4").unwrap();
        validate_artifact(&path, "").unwrap();
        assert!(path.exists());
    }
}
