//! Artifact storage for rendered label documents.

use crate::error::StorageError;
use crate::job::ArtifactRef;
use crate::zpl::RenderedDocument;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Stored filename for a job's document.
pub fn artifact_filename(job_id: &str) -> String {
    format!("label-{}.pdf", job_id)
}

/// Job ids are UUIDs; anything else could escape the storage root.
fn checked_id(job_id: &str) -> Result<&str, StorageError> {
    if !job_id.is_empty() && job_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(job_id)
    } else {
        Err(StorageError::NotFound(job_id.to_string()))
    }
}

/// Persists finished documents and resolves them to retrievable references.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores the document for `job_id`, replacing any previous one.
    async fn store(&self, job_id: &str, document: &RenderedDocument) -> Result<ArtifactRef, StorageError>;

    /// Resolves the stored document for `job_id`.
    async fn resolve(&self, job_id: &str) -> Result<ArtifactRef, StorageError>;
}

/// Stores documents as files under a root directory.
pub struct FilesystemArtifactStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl FilesystemArtifactStore {
    /// `base_url`, when set, is the public location the root directory is
    /// served from. Otherwise `file://` URLs are produced.
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn url_for(&self, path: &Path, filename: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base, filename),
            None => format!("file://{}", path.display()),
        }
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn store(&self, job_id: &str, document: &RenderedDocument) -> Result<ArtifactRef, StorageError> {
        let filename = artifact_filename(checked_id(job_id)?);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_error(&self.root, e))?;

        let path = self.root.join(&filename);
        let partial = self.root.join(format!(".{}.partial", filename));

        tokio::fs::write(&partial, &document.pdf)
            .await
            .map_err(|e| Self::io_error(&partial, e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| Self::io_error(&path, e))?;

        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        info!(
            job_id = %job_id,
            path = %path.display(),
            bytes = document.pdf.len(),
            "Stored label document"
        );

        Ok(ArtifactRef {
            url: self.url_for(&path, &filename),
            filename,
            size_bytes: document.pdf.len() as u64,
        })
    }

    async fn resolve(&self, job_id: &str) -> Result<ArtifactRef, StorageError> {
        let filename = artifact_filename(checked_id(job_id)?);
        let path = self.root.join(&filename);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(job_id.to_string()))
            }
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        Ok(ArtifactRef {
            url: self.url_for(&path, &filename),
            filename,
            size_bytes: metadata.len(),
        })
    }
}

/// Keeps documents in memory. Used for tests and embedding.
pub struct MemoryArtifactStore {
    base_url: String,
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            base_url: "memory://artifacts".to_string(),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Raw bytes of a stored document.
    pub fn get(&self, job_id: &str) -> Option<Vec<u8>> {
        let documents = self.documents.read().unwrap_or_else(|p| p.into_inner());
        documents.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reference(&self, job_id: &str, size: usize) -> ArtifactRef {
        let filename = artifact_filename(job_id);
        ArtifactRef {
            url: format!("{}/{}", self.base_url, filename),
            filename,
            size_bytes: size as u64,
        }
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, job_id: &str, document: &RenderedDocument) -> Result<ArtifactRef, StorageError> {
        let job_id = checked_id(job_id)?;
        let mut documents = self.documents.write().unwrap_or_else(|p| p.into_inner());
        documents.insert(job_id.to_string(), document.pdf.clone());
        debug!(job_id = %job_id, bytes = document.pdf.len(), "Stored label document in memory");
        Ok(self.reference(job_id, document.pdf.len()))
    }

    async fn resolve(&self, job_id: &str) -> Result<ArtifactRef, StorageError> {
        let job_id = checked_id(job_id)?;
        let documents = self.documents.read().unwrap_or_else(|p| p.into_inner());
        documents
            .get(job_id)
            .map(|pdf| self.reference(job_id, pdf.len()))
            .ok_or_else(|| StorageError::NotFound(job_id.to_string()))
    }
}
