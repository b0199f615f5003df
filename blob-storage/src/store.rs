use async_trait::async_trait;
use crate::error::BlobResult;

/// The remote operations an append-only log writer needs from a blob service.
#[async_trait]
pub trait AppendBlobService: Send + Sync {
    /// Returns `false` only when the service reports the container as absent.
    /// Every other failure is an error.
    async fn container_exists(&self, container: &str) -> BlobResult<bool>;

    async fn create_container(&self, container: &str) -> BlobResult<()>;

    /// Materializes an empty append blob. An append blob that already exists is
    /// left untouched.
    async fn create_append_blob(&self, container: &str, blob: &str) -> BlobResult<()>;

    /// Appends one block to the end of `blob`.
    async fn append_block(&self, container: &str, blob: &str, block: &[u8]) -> BlobResult<()>;
}
