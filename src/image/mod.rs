//! Locally addressable handles to generated images
//!
//! Wraps the binary payload returned by the inference API so it can be shown
//! inline (`data:` URL), offered for download, or written to disk.

pub mod mime;

pub use mime::ImageFormat;

use crate::Result;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Cheaply clonable reference to one generated image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    bytes: Bytes,
    format: ImageFormat,
}

impl ImageRef {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let format = ImageFormat::detect(&bytes);
        Self { bytes, format }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Millisecond-timestamp file name offered for downloads.
    pub fn download_name(&self, at: DateTime<Utc>) -> String {
        format!("{}.{}", at.timestamp_millis(), self.format.extension())
    }

    /// Write the image into `dir` as `<stem>.<ext>`, creating `dir` if needed.
    pub async fn save_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.{}", stem, self.format.extension()));
        tokio::fs::write(&path, &self.bytes).await?;
        tracing::debug!("Saved {} bytes to {}", self.bytes.len(), path.display());
        Ok(path)
    }
}
