//! Azure Blob Storage: endpoints, request signing, and the REST-backed service.

pub mod auth;
pub mod cloud;
pub mod connection_string;
pub mod service;

pub use auth::StorageAuth;
pub use cloud::{AzureCloud, StorageEndpoint};
pub use connection_string::ConnectionString;
pub use service::AzureBlobService;
