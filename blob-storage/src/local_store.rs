use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use crate::error::{BlobError, BlobResult};
use crate::store::AppendBlobService;

/// Largest block a single append may carry.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;
/// Maximum number of committed blocks per append blob.
pub const DEFAULT_MAX_BLOCKS: u64 = 50_000;

/// An `AppendBlobService` that keeps containers as directories and append blobs
/// as files under a local directory.
///
/// Block counts are tracked in memory, so a blob written by a previous process
/// starts counting from zero again.
#[derive(Clone, Debug)]
pub struct LocalAppendBlobStore {
    directory: PathBuf,
    max_block_size: usize,
    max_blocks: u64,
    block_counts: Arc<DashMap<PathBuf, u64>>,
}

impl LocalAppendBlobStore {
    /// Creates a new `LocalAppendBlobStore` rooted at the specified directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            max_blocks: DEFAULT_MAX_BLOCKS,
            block_counts: Arc::new(DashMap::new()),
        }
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    pub fn with_max_blocks(mut self, max_blocks: u64) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    /// Number of blocks appended to `blob` through this store.
    pub fn block_count(&self, container: &str, blob: &str) -> u64 {
        let path = self.directory.join(container).join(blob);
        self.block_counts.get(&path).map(|count| *count).unwrap_or(0)
    }

    fn container_path(&self, container: &str) -> BlobResult<PathBuf> {
        check_relative(container)?;
        Ok(self.directory.join(container))
    }

    fn blob_path(&self, container: &str, blob: &str) -> BlobResult<PathBuf> {
        check_relative(blob)?;
        Ok(self.container_path(container)?.join(blob))
    }
}

fn check_relative(name: &str) -> BlobResult<()> {
    let escapes = Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(BlobError::Service {
            status: 400,
            code: Some("InvalidResourceName".to_string()),
            message: format!("invalid resource name {name:?}"),
        });
    }
    Ok(())
}

#[async_trait]
impl AppendBlobService for LocalAppendBlobStore {
    async fn container_exists(&self, container: &str) -> BlobResult<bool> {
        let path = self.container_path(container)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_container(&self, container: &str) -> BlobResult<()> {
        let path = self.container_path(container)?;
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn create_append_blob(&self, container: &str, blob: &str) -> BlobResult<()> {
        if !self.container_exists(container).await? {
            return Err(BlobError::NotFound { resource: container.to_string() });
        }
        let path = self.blob_path(container, blob)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(_) => {
                tracing::debug!("created append blob {}", path.display());
                self.block_counts.insert(path, 0);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("append blob {} already exists", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append_block(&self, container: &str, blob: &str, block: &[u8]) -> BlobResult<()> {
        if block.len() > self.max_block_size {
            return Err(BlobError::Service {
                status: 413,
                code: Some("RequestBodyTooLarge".to_string()),
                message: format!("block of {} bytes exceeds {} bytes", block.len(), self.max_block_size),
            });
        }
        let path = self.blob_path(container, blob)?;
        let committed = self.block_counts.get(&path).map(|count| *count).unwrap_or(0);
        if committed >= self.max_blocks {
            return Err(BlobError::LimitExceeded { resource: blob.to_string() });
        }

        let mut file = match OpenOptions::new().append(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobError::NotFound { resource: blob.to_string() })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(block).await?;
        file.flush().await?;

        *self.block_counts.entry(path).or_insert(0) += 1;
        Ok(())
    }
}
