use std::fmt;
use std::sync::Arc;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

/// An opaque bearer token and, when the identity endpoint reports one, its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), expires_on: None }
    }

    pub fn with_expiry(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.expires_on
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// The single live credential, shared between the refresh task and the request
/// signer.
///
/// Readers load a whole `Arc<AccessToken>`; a refresh stores a new one. A reader
/// therefore sees either the old or the new token, never a mix of both.
#[derive(Clone)]
pub struct SharedCredential {
    inner: Arc<ArcSwap<AccessToken>>,
}

impl SharedCredential {
    pub fn new(token: AccessToken) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(token)) }
    }

    pub fn current(&self) -> Arc<AccessToken> {
        self.inner.load_full()
    }

    pub fn replace(&self, token: AccessToken) {
        self.inner.store(Arc::new(token));
    }
}

impl fmt::Debug for SharedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCredential").field(&*self.current()).finish()
    }
}
