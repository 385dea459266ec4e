use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Upload;

/// Object storage for receipt and cheque images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `upload` under `folder` and return a reference to it.
    async fn upload(&self, folder: &str, upload: &Upload) -> Result<String>;

    /// Delete a previously uploaded object.
    async fn delete(&self, reference: &str) -> Result<()>;
}

/// Blob store backed by a directory on the local filesystem.
/// References are paths relative to the root, e.g. `petty-cash/<uuid>-scan.png`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a reference under the root, refusing anything that escapes it.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if reference.is_empty() || !is_plain {
            anyhow::bail!("Invalid blob reference: {}", reference);
        }
        Ok(self.root.join(relative))
    }
}

/// Keep only characters that are safe in a file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, folder: &str, upload: &Upload) -> Result<String> {
        let reference = format!(
            "{}/{}-{}",
            sanitize_file_name(folder),
            Uuid::new_v4(),
            sanitize_file_name(&upload.file_name)
        );
        let path = self.resolve(&reference)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create blob folder {}", parent.display()))?;
        }
        tokio::fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("Failed to write blob {}", reference))?;

        tracing::debug!(reference = %reference, bytes = upload.bytes.len(), "blob uploaded");
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let path = self.resolve(reference)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete blob {}", reference))?;

        tracing::debug!(reference = %reference, "blob deleted");
        Ok(())
    }
}
