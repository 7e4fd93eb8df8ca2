use std::path::{self, Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;
use tokio::io::AsyncReadExt;
use tracing::debug;
use uuid::Uuid;

use crate::kai::{KaiError, RECOGNIZED_EXTENSIONS};

/// Stages uploaded images on disk so KAI-impl can read them by path.
pub struct UploadStore {
  path: PathBuf,
}

impl UploadStore {
  pub fn new(path: impl AsRef<Path>) -> Result<Self> {
    let path = path::absolute(path.as_ref())
      .with_context(|| format!("failed to resolve path: {}", path.as_ref().display()))?;

    Ok(Self { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Writes `data` under a fresh name ending in `ext` and returns its absolute path.
  pub async fn store(&self, data: &[u8], ext: &str) -> Result<PathBuf> {
    let file_path = self.path.join(format!("{}{}", Uuid::new_v4(), ext));

    tokio::fs::create_dir_all(&self.path)
      .await
      .with_context(|| format!("failed to create directory: {}", self.path.display()))?;

    tokio::fs::write(&file_path, data)
      .await
      .with_context(|| format!("failed to write file: {}", file_path.display()))?;

    debug!(path = %file_path.display(), size = data.len(), "stored upload");

    Ok(file_path)
  }

  pub async fn read(&self, file_path: &Path) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(file_path)
      .await
      .with_context(|| format!("failed to open file: {}", file_path.display()))?;

    let mut data = Vec::new();
    file
      .read_to_end(&mut data)
      .await
      .with_context(|| format!("failed to read file: {}", file_path.display()))?;

    Ok(data)
  }
}

/// Picks the extension for an upload, trusting the content over the client's file name.
pub fn detect_extension(data: &[u8], file_name: Option<&str>) -> Result<&'static str, KaiError> {
  if let Ok(format) = image::guess_format(data) {
    if let Some(ext) = format_to_ext(format) {
      return Ok(ext);
    }
  }

  let file_name = file_name.unwrap_or_default();
  RECOGNIZED_EXTENSIONS
    .iter()
    .find(|ext| file_name.ends_with(*ext))
    .copied()
    .ok_or_else(|| KaiError::UnsupportedFormat(file_name.to_owned()))
}

fn format_to_ext(format: ImageFormat) -> Option<&'static str> {
  match format {
    ImageFormat::Jpeg => Some(".jpg"),
    ImageFormat::Png => Some(".png"),
    ImageFormat::Tiff => Some(".tif"),
    _ => None,
  }
}

pub fn mime_for(path: &Path) -> &'static str {
  match path.extension().and_then(|ext| ext.to_str()) {
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("png") => "image/png",
    Some("tif") => "image/tiff",
    _ => "application/octet-stream",
  }
}
