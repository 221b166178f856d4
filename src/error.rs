/// Convenience result type used across shortgen.
pub type ShortgenResult<T> = Result<T, ShortgenError>;

/// Top-level error taxonomy for the capture pipeline.
///
/// Every variant aborts the current job only; the pipeline guarantees that
/// surface teardown and transient-file removal have already run by the time
/// one of these propagates to the caller.
#[derive(thiserror::Error, Debug)]
pub enum ShortgenError {
    /// Template could not be read or contains malformed placeholders.
    #[error("template error: {0}")]
    Template(String),

    /// Invalid configuration or precondition violation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The rendered document never signalled readiness within the bound.
    #[error("readiness timeout: {0}")]
    ReadinessTimeout(String),

    /// The rendering engine failed to launch, position, or load.
    #[error("render surface error: {0}")]
    RenderSurface(String),

    /// The external encoder failed to launch.
    #[error("capture start error: {0}")]
    CaptureStart(String),

    /// The external encoder exited non-zero or crashed.
    #[error("capture exit error: {0}")]
    CaptureExit(String),

    /// Expected output absent or zero-size after the pipeline completed.
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShortgenError {
    /// Build a [`ShortgenError::Template`] value.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Build a [`ShortgenError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ShortgenError::ReadinessTimeout`] value.
    pub fn readiness_timeout(msg: impl Into<String>) -> Self {
        Self::ReadinessTimeout(msg.into())
    }

    /// Build a [`ShortgenError::RenderSurface`] value.
    pub fn render_surface(msg: impl Into<String>) -> Self {
        Self::RenderSurface(msg.into())
    }

    /// Build a [`ShortgenError::CaptureStart`] value.
    pub fn capture_start(msg: impl Into<String>) -> Self {
        Self::CaptureStart(msg.into())
    }

    /// Build a [`ShortgenError::CaptureExit`] value.
    pub fn capture_exit(msg: impl Into<String>) -> Self {
        Self::CaptureExit(msg.into())
    }

    /// Build a [`ShortgenError::ArtifactMissing`] value.
    pub fn artifact_missing(msg: impl Into<String>) -> Self {
        Self::ArtifactMissing(msg.into())
    }

    /// Name of the pipeline stage this error belongs to, for per-job reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Template(_) | Self::Validation(_) => "preparing",
            Self::ReadinessTimeout(_) | Self::RenderSurface(_) => "rendering",
            Self::CaptureStart(_) | Self::CaptureExit(_) => "recording",
            Self::ArtifactMissing(_) => "validating",
            Self::Other(_) => "pipeline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ShortgenError::template("x")
                .to_string()
                .contains("template error:")
        );
        assert!(
            ShortgenError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            ShortgenError::readiness_timeout("x")
                .to_string()
                .contains("readiness timeout:")
        );
        assert!(
            ShortgenError::render_surface("x")
                .to_string()
                .contains("render surface error:")
        );
        assert!(
            ShortgenError::capture_start("x")
                .to_string()
                .contains("capture start error:")
        );
        assert!(
            ShortgenError::capture_exit("x")
                .to_string()
                .contains("capture exit error:")
        );
        assert!(
            ShortgenError::artifact_missing("x")
                .to_string()
                .contains("artifact missing:")
        );
    }

    #[test]
    fn stage_names_cover_the_pipeline() {
        assert_eq!(ShortgenError::template("x").stage(), "preparing");
        assert_eq!(ShortgenError::readiness_timeout("x").stage(), "rendering");
        assert_eq!(ShortgenError::capture_exit("x").stage(), "recording");
        assert_eq!(ShortgenError::artifact_missing("x").stage(), "validating");
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ShortgenError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
