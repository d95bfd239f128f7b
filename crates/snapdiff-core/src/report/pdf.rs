//! PDF rendering via a headless browser.
//!
//! The engine shells out to a Chromium binary; there is no embedded
//! renderer. Launch failure and non-zero exits surface as `Transient`;
//! callers keep the HTML half of the report either way.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{EngineError, Result};

/// Renders a written HTML file to PDF.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html_path: &Path, pdf_path: &Path) -> Result<()>;
}

/// Headless Chromium renderer. Prints A4 with backgrounds; the virtual time
/// budget stands in for a network-idle wait so chart scripts finish drawing.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    browser: String,
}

impl ChromiumRenderer {
    pub fn new() -> Self {
        ChromiumRenderer {
            browser: "chromium".to_string(),
        }
    }

    pub fn with_binary(browser: impl Into<String>) -> Self {
        ChromiumRenderer {
            browser: browser.into(),
        }
    }
}

impl Default for ChromiumRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PdfRenderer for ChromiumRenderer {
    async fn render(&self, html_path: &Path, pdf_path: &Path) -> Result<()> {
        debug!(html = %html_path.display(), pdf = %pdf_path.display(), "rendering PDF");
        let status = tokio::process::Command::new(&self.browser)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--virtual-time-budget=10000")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(format!("file://{}", html_path.display()))
            .status()
            .await
            .map_err(|err| EngineError::Transient(format!("browser launch failed: {err}")))?;

        if !status.success() {
            return Err(EngineError::Transient(format!(
                "browser exited with {status}"
            )));
        }
        if !pdf_path.is_file() {
            return Err(EngineError::Transient(
                "browser reported success but wrote no PDF".to_string(),
            ));
        }
        Ok(())
    }
}
