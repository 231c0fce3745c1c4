//! Chrome DevTools Protocol rasterizer

use crate::{Error, Rasterizer, RenderConfig, Result, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// CDP-based rasterizer (uses the `headless_chrome` crate)
///
/// One headless Chrome process is launched per rasterizer and shared by all
/// renders; every render gets its own tab which is closed again whether the
/// render succeeds or not.
pub struct CdpRasterizer {
    browser: Browser,
    config: RenderConfig,
}

/// Closes the tab when dropped, so early returns cannot leak pages.
struct PageGuard(Arc<Tab>);

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.close(false) {
            warn!("Failed to close render tab: {}", e);
        }
    }
}

impl CdpRasterizer {
    /// Resolves once web fonts and images have settled, or after
    /// `timeout_ms`, whichever comes first. Yields `true` when settled.
    fn settle_script(timeout_ms: u64) -> String {
        format!(
            r#"(function() {{
                const images = Array.from(document.images)
                    .filter(img => !img.complete)
                    .map(img => new Promise(done => {{ img.onload = img.onerror = done; }}));
                const settled = Promise.all([document.fonts.ready].concat(images)).then(() => true);
                const expired = new Promise(done => setTimeout(() => done(false), {}));
                return Promise.race([settled, expired]);
            }})()"#,
            timeout_ms
        )
    }
}

impl Rasterizer for CdpRasterizer {
    fn new(config: RenderConfig) -> Result<Self>
    where
        Self: Sized,
    {
        config.validate()?;

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        Ok(Self { browser, config })
    }

    fn rasterize(&mut self, html: &str, viewport: Viewport) -> Result<Vec<u8>> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::Backend(format!("Failed to open tab: {}", e)))?;
        let _page = PageGuard(tab.clone());

        tab.set_default_timeout(Duration::from_millis(self.config.render_timeout_ms));

        tab.set_bounds(Bounds::Normal {
            left: Some(0),
            top: Some(0),
            width: Some(viewport.width as f64),
            height: Some(viewport.height as f64),
        })
        .map_err(|e| Error::Backend(format!("Failed to size viewport: {}", e)))?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(html);
        tab.navigate_to(&format!("data:text/html;charset=utf-8;base64,{}", encoded))
            .map_err(|e| Error::Backend(format!("Failed to load HTML: {}", e)))?;

        tab.wait_until_navigated()
            .map_err(|e| Error::Backend(format!("Wait for navigation failed: {}", e)))?;

        // Missing web fonts degrade to fallback fonts rather than failing
        match tab.evaluate(&Self::settle_script(self.config.font_timeout_ms), true) {
            Ok(res) if res.value == Some(serde_json::Value::Bool(true)) => {
                debug!("page settled");
            }
            Ok(_) => warn!(
                "Fonts/images not ready after {}ms; capturing with fallbacks",
                self.config.font_timeout_ms
            ),
            Err(e) => warn!("Failed to wait for fonts: {}", e),
        }

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: viewport.width as f64,
            height: viewport.height as f64,
            scale: 1.0,
        };

        tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::Backend(format!("Screenshot failed: {}", e)))
    }

    fn is_alive(&mut self) -> bool {
        // Fails once Chrome exited or its transport timed out
        self.browser.get_version().is_ok()
    }

    fn close(self) -> Result<()> {
        // Dropping the browser terminates the Chrome child process
        drop(self.browser);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_script_embeds_timeout() {
        let script = CdpRasterizer::settle_script(1234);
        assert!(script.contains("1234"));
        assert!(script.contains("document.fonts.ready"));
    }

    #[test]
    fn test_cdp_rasterizer_creation() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let result = CdpRasterizer::new(RenderConfig::default());
        if let Err(e) = result {
            eprintln!("Skipping CDP rasterizer creation test because Chrome is not available or failed to launch: {}", e);
            return;
        }
        assert!(result.is_ok());
    }
}
