use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::error::{ShortgenError, ShortgenResult};

/// Exact size and position of the visible render surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceGeometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// A running rendering-engine instance with a single active view.
///
/// Exclusively owned by one job and closed before the job completes. The
/// trait is the seam that lets pipeline tests substitute a stub for a real
/// browser.
pub trait RenderSurface {
    /// Block until `selector` matches in the document, bounded by `timeout`.
    ///
    /// On timeout the job must fail fast rather than record an incomplete
    /// page, so this maps to [`ShortgenError::ReadinessTimeout`].
    fn await_ready(&mut self, selector: &str, timeout: Duration) -> ShortgenResult<()>;

    /// Stamp the document title so a window grabber can target this surface.
    fn set_title(&mut self, title: &str) -> ShortgenResult<()>;

    /// Tear the surface down. Idempotent; closing twice is a no-op.
    fn close(&mut self);
}

/// Launches render surfaces for documents.
pub trait SurfaceLauncher {
    /// Open a visible surface at `geometry` showing `document`.
    fn open(
        &self,
        document: &Path,
        geometry: &SurfaceGeometry,
    ) -> ShortgenResult<Box<dyn RenderSurface>>;
}

/// [`SurfaceLauncher`] backed by a visible Chrome/Chromium window driven over
/// the DevTools protocol.
#[derive(Clone, Debug, Default)]
pub struct ChromeLauncher {
    /// Explicit browser binary; discovered on PATH when unset.
    pub browser_path: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(browser_path: Option<PathBuf>) -> Self {
        Self { browser_path }
    }
}

impl SurfaceLauncher for ChromeLauncher {
    fn open(
        &self,
        document: &Path,
        geometry: &SurfaceGeometry,
    ) -> ShortgenResult<Box<dyn RenderSurface>> {
        let url = file_url(document)?;
        let args = launch_args(geometry, &url);
        let arg_refs: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();

        let options = LaunchOptions::default_builder()
            .headless(false)
            .sandbox(false)
            .window_size(Some((geometry.width, geometry.height)))
            .path(self.browser_path.clone())
            .args(arg_refs)
            .build()
            .map_err(|e| {
                ShortgenError::render_surface(format!("invalid browser launch options: {e}"))
            })?;

        let browser = Browser::new(options).map_err(|e| {
            ShortgenError::render_surface(format!("failed to launch browser: {e}"))
        })?;
        let tab = app_tab(&browser)?;

        Ok(Box::new(ChromeSurface {
            browser: Some(browser),
            tab: Some(tab),
        }))
    }
}

/// Extra flags fixing the capture geometry and stripping UI chrome.
///
/// `--app` gives a single chromeless view, so the rendered content origin is
/// the window origin (modulo window-manager decoration, compensated in the
/// capture region). GPU compositing stays off for stable pixel output.
fn launch_args(geometry: &SurfaceGeometry, url: &str) -> Vec<OsString> {
    vec![
        OsString::from(format!("--app={url}")),
        OsString::from(format!("--window-position={},{}", geometry.x, geometry.y)),
        OsString::from("--disable-gpu"),
        OsString::from("--disable-gpu-compositing"),
        OsString::from("--no-first-run"),
        OsString::from("--no-default-browser-check"),
    ]
}

/// Local-file URL for the document. Never a network fetch, keeping rendering
/// deterministic and offline-safe.
///
/// Uses `std::path::absolute` rather than `canonicalize`: the latter yields a
/// verbatim `\\?\C:\...` path on Windows, which Chromium's URL parser
/// rejects.
fn file_url(document: &Path) -> ShortgenResult<String> {
    if !document.exists() {
        return Err(ShortgenError::render_surface(format!(
            "document '{}' does not exist",
            document.display()
        )));
    }
    let abs = std::path::absolute(document).map_err(|e| {
        ShortgenError::render_surface(format!(
            "failed to resolve document '{}': {e}",
            document.display()
        ))
    })?;
    let path = abs.display().to_string().replace('\\', "/");
    if path.starts_with('/') {
        Ok(format!("file://{path}"))
    } else {
        // Windows drive paths need the third slash: file:///C:/...
        Ok(format!("file:///{path}"))
    }
}

/// The single view opened by `--app` mode.
///
/// `Browser::new` waits for the initial tab, but registration can lag a
/// moment on a cold start.
fn app_tab(browser: &Browser) -> ShortgenResult<Arc<Tab>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        {
            let tabs = browser
                .get_tabs()
                .lock()
                .map_err(|_| ShortgenError::render_surface("browser tab registry poisoned"))?;
            if let Some(tab) = tabs.first() {
                return Ok(Arc::clone(tab));
            }
        }
        if Instant::now() >= deadline {
            return Err(ShortgenError::render_surface(
                "browser reported no view after launch",
            ));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

struct ChromeSurface {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeSurface {
    fn tab(&self) -> ShortgenResult<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| ShortgenError::render_surface("render surface is already closed"))
    }
}

impl RenderSurface for ChromeSurface {
    fn await_ready(&mut self, selector: &str, timeout: Duration) -> ShortgenResult<()> {
        let tab = self.tab()?;
        tab.wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|e| {
                ShortgenError::readiness_timeout(format!(
                    "selector '{selector}' not present within {}ms: {e}",
                    timeout.as_millis()
                ))
            })?;
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> ShortgenResult<()> {
        let tab = self.tab()?;
        let quoted = serde_json::to_string(title)
            .map_err(|e| ShortgenError::render_surface(format!("invalid window title: {e}")))?;
        tab.evaluate(&format!("document.title = {quoted}"), false)
            .map_err(|e| {
                ShortgenError::render_surface(format!("failed to set window title: {e}"))
            })?;
        Ok(())
    }

    fn close(&mut self) {
        self.tab.take();
        // Dropping the handle terminates the browser process.
        self.browser.take();
    }
}

impl Drop for ChromeSurface {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_fix_geometry_and_strip_chrome() {
        let geometry = SurfaceGeometry {
            width: 1080,
            height: 1920,
            x: 10,
            y: 20,
        };
        let args = launch_args(&geometry, "file:///tmp/doc.html");
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--app=file:///tmp/doc.html".to_string()));
        assert!(args.contains(&"--window-position=10,20".to_string()));
        assert!(args.contains(&"--disable-gpu".to_string()));
    }

    #[test]
    fn file_url_resolves_existing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.html");
        std::fs::write(&doc, "<html></html>").unwrap();

        let url = file_url(&doc).unwrap();
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("doc.html"));
    }

    #[test]
    fn file_url_never_contains_backslashes_or_verbatim_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.html");
        std::fs::write(&doc, "<html></html>").unwrap();

        let url = file_url(&doc).unwrap();
        assert!(!url.contains('\\'), "unresolvable URL: {url}");
        assert!(!url.contains("//?/"), "verbatim prefix leaked: {url}");
    }

    #[test]
    fn file_url_fails_for_missing_documents() {
        let err = file_url(Path::new("/definitely/not/here.html")).unwrap_err();
        assert!(matches!(err, ShortgenError::RenderSurface(_)));
    }
}
