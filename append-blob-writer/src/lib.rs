#![allow(clippy::uninlined_format_args)]
#![deny(unused_qualifications)]

//! Writes flushed log chunks into Azure append blobs, rotating to a new blob
//! whenever the current one reaches the service's block count limit.

pub mod appender;
pub mod azure;
pub mod bootstrap;
pub mod config;
pub mod credential;
pub mod cursor;
pub mod errors;
pub mod naming;
pub mod services;
pub mod writer;

#[cfg(test)]
mod testing;

pub use appender::{partition, ChunkedAppender};
pub use bootstrap::{ensure_container, ContainerBootstrap};
pub use config::{WriterConfig, DEFAULT_BLOCK_SIZE_LIMIT, DEFAULT_OBJECT_KEY_FORMAT};
pub use cursor::WriterCursor;
pub use errors::{AppendError, BootstrapError, ConfigError, CredentialError, WriterError};
pub use naming::{BucketKey, NameGenerator, ObjectName};
pub use services::BlobServices;
pub use writer::AppendBlobWriter;
