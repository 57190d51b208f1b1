use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A file picked for upload, with the media type it was declared as.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its media type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, media_type_for(path), bytes))
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }
}

pub fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => PDF_MEDIA_TYPE,
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Read every path, keeping the ones that could be read and reporting the rest.
pub async fn read_selection(paths: &[PathBuf]) -> (Vec<SelectedFile>, Vec<(PathBuf, anyhow::Error)>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();

    for path in paths {
        match SelectedFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) => failures.push((path.clone(), e)),
        }
    }

    (files, failures)
}
