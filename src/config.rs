//! Runtime configuration for the rasterizer and the HTTP service

use std::path::PathBuf;

use crate::{Error, Result};

/// Configuration for the rasterization backend.
///
/// The defaults are chosen to suit container deployments: the Chrome sandbox
/// is off (equivalent to `--no-sandbox`) and every render is bounded by a
/// timeout.
///
/// # Examples
///
/// ```
/// let cfg = jobcard::RenderConfig::default();
/// assert_eq!(cfg.render_timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Explicit Chrome/Chromium executable; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep the Chrome sandbox enabled
    pub sandbox: bool,
    /// Upper bound for one render call in milliseconds
    pub render_timeout_ms: u64,
    /// How long to wait for web fonts and images before capturing anyway
    pub font_timeout_ms: u64,
    /// Idle time after which headless Chrome shuts itself down; the next
    /// render then launches a new browser
    pub idle_timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            sandbox: false,
            render_timeout_ms: 30_000,
            font_timeout_ms: 5_000,
            idle_timeout_secs: 3_600,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.render_timeout_ms == 0 {
            return Err(Error::ConfigError("render timeout must be positive".into()));
        }
        if self.font_timeout_ms >= self.render_timeout_ms {
            return Err(Error::ConfigError(format!(
                "font timeout ({}ms) must be shorter than the render timeout ({}ms)",
                self.font_timeout_ms, self.render_timeout_ms
            )));
        }
        if let Some(path) = &self.chrome_path {
            if !path.exists() {
                return Err(Error::ConfigError(format!(
                    "Chrome executable not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// HTTP service settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory listed by `GET /templates`; request template paths must
    /// resolve inside it
    pub templates_dir: PathBuf,
    /// Maximum request body size in bytes
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            templates_dir: PathBuf::from("templates"),
            body_limit: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RenderConfig::default().validate().is_ok());
        assert_eq!(ServerConfig::default().bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn rejects_inverted_timeouts() {
        let cfg = RenderConfig { render_timeout_ms: 1000, font_timeout_ms: 2000, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_missing_chrome_binary() {
        let cfg = RenderConfig {
            chrome_path: Some(PathBuf::from("/definitely/not/here/chrome")),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
