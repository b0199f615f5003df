use std::collections::BTreeMap;
use append_blob_writer::{AppendBlobWriter, WriterError};
use chrono::{DateTime, TimeZone, Utc};

/// Formatted lines grouped by time bucket, waiting to be flushed.
///
/// Buckets are keyed by their start in epoch seconds and flushed oldest
/// first. A bucket is only dropped once the writer accepted it.
pub struct ChunkBuffer {
    timekey_secs: i64,
    flush_bytes: usize,
    chunks: BTreeMap<i64, Vec<u8>>,
    size: usize,
}

impl ChunkBuffer {
    pub fn new(timekey_secs: u64, flush_bytes: usize) -> Self {
        Self {
            timekey_secs: i64::try_from(timekey_secs).unwrap_or(i64::MAX).max(1),
            flush_bytes,
            chunks: BTreeMap::new(),
            size: 0,
        }
    }

    /// Start of the bucket `time` falls into, in epoch seconds.
    pub fn timekey(&self, time: DateTime<Utc>) -> i64 {
        let secs = time.timestamp();
        secs - secs.rem_euclid(self.timekey_secs)
    }

    /// Buffers one line. Returns true when a flush is due: the buffer is full
    /// or the line opened a bucket newer than any buffered one.
    pub fn push(&mut self, time: DateTime<Utc>, line: &str) -> bool {
        let key = self.timekey(time);
        let crossed = self.chunks.keys().next_back().is_some_and(|newest| *newest < key);
        self.chunks.entry(key).or_default().extend_from_slice(line.as_bytes());
        self.size += line.len();
        crossed || self.size >= self.flush_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Buffered bytes across all buckets.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Hands every bucket to the writer, oldest first, one write per bucket.
    /// Stops at the first failure and keeps that bucket and all newer ones.
    pub async fn flush(&mut self, writer: &mut AppendBlobWriter) -> Result<usize, WriterError> {
        let mut flushed = 0;
        while let Some(key) = self.chunks.keys().next().copied() {
            if let Some(data) = self.chunks.get(&key) {
                writer.write(data, Utc.timestamp_opt(key, 0).single()).await?;
            }
            if let Some(data) = self.chunks.remove(&key) {
                self.size -= data.len();
            }
            flushed += 1;
        }
        Ok(flushed)
    }
}
