use std::collections::VecDeque;
use std::sync::Mutex;
use async_trait::async_trait;
use blob_store::{AppendBlobService, BlobError, BlobResult};

/// One call observed by `ScriptedService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ContainerExists(String),
    CreateContainer(String),
    CreateBlob(String),
    Append(String, Vec<u8>),
}

/// A blob service that records calls and answers from queued results.
/// An empty queue answers `Ok`.
#[derive(Default)]
pub struct ScriptedService {
    calls: Mutex<Vec<Call>>,
    exists: Mutex<VecDeque<BlobResult<bool>>>,
    create_container: Mutex<VecDeque<BlobResult<()>>>,
    create_blob: Mutex<VecDeque<BlobResult<()>>>,
    append: Mutex<VecDeque<BlobResult<()>>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_exists(self, result: BlobResult<bool>) -> Self {
        self.exists.lock().unwrap().push_back(result);
        self
    }

    pub fn on_create_container(self, result: BlobResult<()>) -> Self {
        self.create_container.lock().unwrap().push_back(result);
        self
    }

    pub fn on_create_blob(self, result: BlobResult<()>) -> Self {
        self.create_blob.lock().unwrap().push_back(result);
        self
    }

    pub fn on_append(self, result: BlobResult<()>) -> Self {
        self.append.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Target and data of every append attempt, in order.
    pub fn appended(&self) -> Vec<(String, Vec<u8>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Append(blob, data) => Some((blob.clone(), data.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn limit_exceeded(blob: &str) -> BlobError {
    BlobError::LimitExceeded { resource: blob.to_string() }
}

pub fn not_found(blob: &str) -> BlobError {
    BlobError::NotFound { resource: blob.to_string() }
}

pub fn server_error() -> BlobError {
    BlobError::Service { status: 500, code: Some("InternalError".to_string()), message: "boom".to_string() }
}

#[async_trait]
impl AppendBlobService for ScriptedService {
    async fn container_exists(&self, container: &str) -> BlobResult<bool> {
        self.record(Call::ContainerExists(container.to_string()));
        self.exists.lock().unwrap().pop_front().unwrap_or(Ok(true))
    }

    async fn create_container(&self, container: &str) -> BlobResult<()> {
        self.record(Call::CreateContainer(container.to_string()));
        self.create_container.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn create_append_blob(&self, _container: &str, blob: &str) -> BlobResult<()> {
        self.record(Call::CreateBlob(blob.to_string()));
        self.create_blob.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn append_block(&self, _container: &str, blob: &str, block: &[u8]) -> BlobResult<()> {
        self.record(Call::Append(blob.to_string(), block.to_vec()));
        self.append.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
