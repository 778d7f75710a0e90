//! First-page rasterization of uploaded PDFs.
//!
//! The core treats conversion as a black box behind `Rasterizer`. The default
//! backend shells out to poppler's `pdftoppm` inside a scratch directory.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::models::document::{Document, RasterImage};

const PREVIEW_DPI: u32 = 150;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("document is not a PDF")]
    NotPdf,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rasterizer exited with {status}: {stderr}")]
    Tool { status: String, stderr: String },

    #[error("rasterizer produced no image")]
    MissingOutput,
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn convert(&self, document: &Document) -> Result<RasterImage, RasterizeError>;
}

pub struct PdftoppmRasterizer {
    binary: String,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn convert(&self, document: &Document) -> Result<RasterImage, RasterizeError> {
        if !document.looks_like_pdf() {
            return Err(RasterizeError::NotPdf);
        }

        // Removed with everything in it when `scratch` drops.
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.pdf");
        let prefix = scratch.path().join("page");
        tokio::fs::write(&input, &document.bytes).await?;

        let output = Command::new(&self.binary)
            .args(["-png", "-singlefile", "-f", "1", "-l", "1", "-r"])
            .arg(PREVIEW_DPI.to_string())
            .arg(&input)
            .arg(&prefix)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RasterizeError::Tool {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let png = tokio::fs::read(prefix.with_extension("png"))
            .await
            .map_err(|_| RasterizeError::MissingOutput)?;
        debug!(
            "Rasterized {} to {} bytes of PNG",
            document.file_name,
            png.len()
        );

        Ok(RasterImage::png_for(document, Bytes::from(png)))
    }
}
