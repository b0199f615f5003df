pub mod error;
pub mod local_store;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use local_store::LocalAppendBlobStore;
pub use store::AppendBlobService;
