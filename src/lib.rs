//! Job card renderer
//!
//! Merges job listings into HTML templates and rasterizes the result into
//! fixed-size PNG "job cards".
//!
//! # Features
//!
//! - **Template merge**: `{{ key }}` placeholders over a closed key set, with
//!   salary/location/description formatting and empty-row cleanup
//! - **Web fonts**: font families from the creative config are linked in `<head>`
//! - **CDP Backend** (default): screenshots via headless Chrome
//! - **Batch + service drivers**: a CLI ledger run and an HTTP API
//!
//! # Example
//!
//! ```
//! use jobcard::{merge, CreativeConfig, JobRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let job: JobRecord = serde_json::from_str(r#"{"title": "Rust Engineer", "company": "Acme"}"#)?;
//! let creative: CreativeConfig = serde_json::from_str(r#"{"canvas": {"width": 1080, "height": 1080}}"#)?;
//!
//! let html = merge("<h1>{{ title }}</h1><p>{{company}}</p>", &job, &creative)?;
//! assert_eq!(html, "<h1>Rust Engineer</h1><p>Acme</p>");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod fonts;
pub mod format;
pub mod model;
pub mod template;

// Async-friendly backend handle (worker-thread backed)
pub mod async_api;
pub mod pipeline;

pub mod batch;
pub mod server;

#[cfg(feature = "cdp")]
pub mod cdp;

pub use async_api::{Backend, LazyBackend};
pub use config::{RenderConfig, ServerConfig};
pub use model::{CreativeConfig, JobRecord, NormalizedJobView, RenderResult};
pub use pipeline::RenderPipeline;
pub use template::merge;

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
        }
    }
}

/// Boundary to the component that turns HTML into pixels.
///
/// Implementations own an expensive, long-lived resource (a browser
/// process) and must give each `rasterize` call an isolated page that is
/// released on every exit path. A rasterizer is created and driven on a
/// single worker thread, so it need not be `Send`.
pub trait Rasterizer {
    /// Create a new rasterizer with the given configuration
    fn new(config: RenderConfig) -> Result<Self>
    where
        Self: Sized;

    /// Load `html` into a `viewport`-sized page, wait for it to settle and
    /// return a PNG clipped to exactly the viewport.
    fn rasterize(&mut self, html: &str, viewport: Viewport) -> Result<Vec<u8>>;

    /// Whether the underlying resource can still serve renders.
    ///
    /// Consulted after a failed render; returning `false` retires this
    /// rasterizer so the next render starts a fresh one.
    fn is_alive(&mut self) -> bool {
        true
    }

    /// Close the rasterizer and clean up resources
    fn close(self) -> Result<()>;
}

/// Create the default backend handle for this build.
#[cfg(feature = "cdp")]
pub fn default_backend(config: RenderConfig) -> LazyBackend {
    LazyBackend::new::<cdp::CdpRasterizer>(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert!(!config.sandbox);
        assert!(config.font_timeout_ms < config.render_timeout_ms);
    }

    #[test]
    fn test_viewport() {
        let viewport = Viewport {
            width: 1200,
            height: 628,
        };
        assert_eq!(viewport.width, 1200);
        assert_eq!(viewport.height, 628);
        assert_eq!(Viewport::default(), Viewport { width: 1080, height: 1080 });
    }
}
