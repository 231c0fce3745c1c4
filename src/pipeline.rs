//! Rendering pipeline: load template, merge, inject fonts, rasterize

use std::path::Path;

use log::{debug, warn};

use crate::fonts::{extract_font_families, inject_font_directive};
use crate::model::{CreativeConfig, JobRecord};
use crate::template::merge;
use crate::{Error, LazyBackend, Result};

/// Read a template file.
///
/// A missing file is reported as [`Error::NotFound`]; other I/O failures
/// pass through as [`Error::Io`].
pub fn load_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| template_read_error(path, e))
}

/// [`load_template`] without blocking the runtime.
pub async fn read_template(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| template_read_error(path, e))
}

fn template_read_error(path: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::NotFound => {
            Error::NotFound(format!("Template file not found: {}", path.display()))
        }
        _ => Error::Io(e),
    }
}

/// Merge a job into already-loaded template text and link its web fonts.
pub fn render_html(template: &str, job: &JobRecord, creative: &CreativeConfig) -> Result<String> {
    let html = merge(template, job, creative)?;
    let families = extract_font_families(creative);
    Ok(inject_font_directive(&html, &families))
}

/// Load `template_path` and produce the final HTML for a job.
pub fn render_template_file(
    template_path: &Path,
    job: &JobRecord,
    creative: &CreativeConfig,
) -> Result<String> {
    let template = load_template(template_path)?;
    render_html(&template, job, creative)
}

/// Orchestrates one job card render against the shared backend.
///
/// The pipeline owns the backend handle; the backend is launched on the
/// first render and stays up until [`RenderPipeline::shutdown`].
pub struct RenderPipeline {
    backend: LazyBackend,
}

impl RenderPipeline {
    pub fn new(backend: LazyBackend) -> Self {
        Self { backend }
    }

    /// Render a job card to PNG bytes.
    pub async fn render(
        &self,
        template_path: &Path,
        job: &JobRecord,
        creative: &CreativeConfig,
    ) -> Result<Vec<u8>> {
        let template = read_template(template_path).await?;
        let html = render_html(&template, job, creative)?;
        self.rasterize(html, creative).await
    }

    /// Rasterize merged HTML at the creative's canvas size.
    ///
    /// If the render kills the backend (browser exited or disconnected) it
    /// is retried once on a freshly launched one.
    pub async fn rasterize(&self, html: String, creative: &CreativeConfig) -> Result<Vec<u8>> {
        let viewport = creative.viewport()?;
        debug!("rasterizing {} bytes of HTML at {}x{}", html.len(), viewport.width, viewport.height);
        let backend = self.backend.get().await?;
        match backend.rasterize(html.clone(), viewport).await {
            Err(e) if !backend.is_alive() => {
                warn!("Render failed on a dead backend ({}); retrying on a new one", e);
                self.backend.get().await?.rasterize(html, viewport).await
            }
            res => res,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.backend.is_running().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }
}
