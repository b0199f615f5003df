use blob_store::{AppendBlobService, BlobError};
use crate::cursor::WriterCursor;
use crate::errors::AppendError;
use crate::naming::{BucketKey, NameGenerator};

/// Splits a payload into consecutive blocks of at most `limit` bytes.
/// An empty payload still yields one empty block.
pub fn partition(payload: &[u8], limit: usize) -> Blocks<'_> {
    Blocks { payload, position: 0, limit: limit.max(1), done: false }
}

/// Iterator returned by [`partition`]. Items are `(offset, block)`.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    payload: &'a [u8],
    position: usize,
    limit: usize,
    done: bool,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.position;
        let size = (self.payload.len() - start).min(self.limit);
        self.position += size;
        if self.position >= self.payload.len() {
            self.done = true;
        }
        Some((start, &self.payload[start..start + size]))
    }
}

/// Writes one payload into the cursor's current blob, block by block,
/// rotating to a new blob when the service reports the block count limit
/// and creating the blob when it does not exist yet.
pub struct ChunkedAppender<'a> {
    service: &'a dyn AppendBlobService,
    container: &'a str,
    block_size_limit: usize,
}

impl<'a> ChunkedAppender<'a> {
    pub fn new(service: &'a dyn AppendBlobService, container: &'a str, block_size_limit: usize) -> Self {
        Self { service, container, block_size_limit }
    }

    pub async fn append(
        &self,
        payload: &[u8],
        naming: &NameGenerator,
        key: &BucketKey,
        cursor: &mut WriterCursor,
    ) -> Result<(), AppendError> {
        tracing::debug!("append_blob.start: content size: {}", payload.len());
        for (offset, block) in partition(payload, self.block_size_limit) {
            tracing::debug!("append_blob.chunk: content[{}..{}]", offset, offset + block.len());
            self.append_block(block, naming, key, cursor).await?;
        }
        tracing::debug!("append_blob.complete");
        Ok(())
    }

    async fn append_block(
        &self,
        block: &[u8],
        naming: &NameGenerator,
        key: &BucketKey,
        cursor: &mut WriterCursor,
    ) -> Result<(), AppendError> {
        // a second NotFound for the same block is not retried
        let mut created = false;
        loop {
            let object = cursor.current().clone();
            match self.service.append_block(self.container, object.as_str(), block).await {
                Ok(()) => return Ok(()),
                Err(BlobError::LimitExceeded { .. }) => {
                    if !cursor.rotate(naming, key) {
                        tracing::warn!(
                            "append blocks limit reached for {}, you need to use %{{index}} in object_key_format",
                            object
                        );
                        return Err(AppendError::RotationImpossible { object: object.to_string() });
                    }
                    tracing::debug!("append blocks limit reached, creating new blob {}", cursor.current());
                    self.service.create_append_blob(self.container, cursor.current().as_str()).await?;
                    created = true;
                }
                Err(BlobError::NotFound { .. }) if !created => {
                    tracing::debug!("{} doesn't exist, creating new blob", object);
                    self.service.create_append_blob(self.container, object.as_str()).await?;
                    created = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
