use homesec_common::frame::RawBitmap;
use image::{GrayImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LATEST_JPEG: &str = "latest.jpg";
const LATEST_PNG: &str = "latest.png";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to decode JPEG frame: {0}")]
    Decode(String),
    #[error("failed to encode bitmap: {0}")]
    Encode(String),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
}

/// Keeps the most recent camera frame on disk.
///
/// With no directory configured frames are still validated but nothing is written.
pub struct SnapshotSink {
    dir: Option<PathBuf>,
    latest: Option<PathBuf>,
}

impl SnapshotSink {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir, latest: None }
    }

    /// Path of the last snapshot written, if any.
    pub fn latest(&self) -> Option<&Path> {
        self.latest.as_deref()
    }

    /// Frames that do not decode are rejected and leave the previous snapshot in place.
    pub async fn store_jpeg(&mut self, jpeg: &[u8]) -> Result<(), SnapshotError> {
        let img = ImageReader::with_format(Cursor::new(jpeg), ImageFormat::Jpeg)
            .decode()
            .map_err(|e| SnapshotError::Decode(e.to_string()))?;
        debug!(width = img.width(), height = img.height(), "jpeg frame decoded");

        self.write(LATEST_JPEG, jpeg).await
    }

    pub async fn store_bitmap(&mut self, bitmap: &RawBitmap) -> Result<(), SnapshotError> {
        if self.dir.is_none() {
            return Ok(());
        }
        let img = GrayImage::from_raw(
            bitmap.width() as u32,
            bitmap.height() as u32,
            bitmap.luma().to_vec(),
        )
        .ok_or_else(|| SnapshotError::Encode("luma plane does not match dimensions".into()))?;

        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| SnapshotError::Encode(e.to_string()))?;
        self.write(LATEST_PNG, &png).await
    }

    async fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), SnapshotError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| SnapshotError::Write(dir.clone(), e))?;

        let path = dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SnapshotError::Write(path.clone(), e))?;

        if self.latest.as_deref() != Some(path.as_path()) {
            info!(path = %path.display(), "snapshot location changed");
        }
        debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        self.latest = Some(path);
        Ok(())
    }
}
