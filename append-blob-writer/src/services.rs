use std::fmt;
use std::sync::Arc;
use blob_store::{AppendBlobService, LocalAppendBlobStore};
use crate::azure::AzureBlobService;

/// The blob backends a writer can target.
#[derive(Clone)]
pub enum BlobServices {
    Azure(AzureBlobService),
    Local(LocalAppendBlobStore),
    /// Any other implementation, e.g. a test double.
    Custom(Arc<dyn AppendBlobService>),
}

impl BlobServices {
    /// Returns a reference to the inner value as a trait object.
    pub fn as_trait(&self) -> &dyn AppendBlobService {
        match self {
            BlobServices::Azure(a) => a,
            BlobServices::Local(l) => l,
            BlobServices::Custom(c) => c.as_ref(),
        }
    }
}

impl fmt::Debug for BlobServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobServices::Azure(a) => f.debug_tuple("Azure").field(a).finish(),
            BlobServices::Local(l) => f.debug_tuple("Local").field(l).finish(),
            BlobServices::Custom(_) => f.write_str("Custom"),
        }
    }
}
