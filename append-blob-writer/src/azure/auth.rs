use std::fmt;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use blob_store::{BlobError, BlobResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use crate::credential::SharedCredential;

type HmacSha256 = Hmac<Sha256>;

/// How outgoing blob requests are authorized.
#[derive(Clone)]
pub enum StorageAuth {
    /// Shared Key: HMAC-SHA256 over the canonical request with the account key.
    SharedKey { account: String, key: Vec<u8> },
    /// A SAS token appended to every request's query string.
    SasToken(String),
    /// A bearer token read from the shared credential right before each call.
    Bearer(SharedCredential),
}

impl fmt::Debug for StorageAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageAuth::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            StorageAuth::SasToken(_) => f.write_str("SasToken(<redacted>)"),
            StorageAuth::Bearer(credential) => f.debug_tuple("Bearer").field(credential).finish(),
        }
    }
}

impl StorageAuth {
    pub fn shared_key(account: impl Into<String>, base64_key: &str) -> Result<Self, base64::DecodeError> {
        let key = BASE64_STANDARD.decode(base64_key.trim())?;
        Ok(StorageAuth::SharedKey { account: account.into(), key })
    }

    pub fn sas_token(token: &str) -> Self {
        StorageAuth::SasToken(token.trim_start_matches('?').to_string())
    }
}

/// The request fields that take part in a Shared Key signature.
#[derive(Debug, Default)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub content_length: usize,
    pub content_md5: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub if_none_match: Option<&'a str>,
    /// All `x-ms-*` headers sent with the request.
    pub ms_headers: Vec<(&'a str, String)>,
    /// Percent-encoded url path, starting with `/`.
    pub path: &'a str,
    pub query: Vec<(&'a str, String)>,
}

impl CanonicalRequest<'_> {
    pub fn string_to_sign(&self, account: &str) -> String {
        // Content-Length is empty for zero-length bodies since 2015-02-21
        let content_length = match self.content_length {
            0 => String::new(),
            len => len.to_string(),
        };

        let mut headers: Vec<(String, &str)> = self
            .ms_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();

        let mut canonical_resource = format!("/{}{}", account, self.path);
        let mut query: Vec<(String, &str)> = self
            .query
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        query.sort_by(|a, b| a.0.cmp(&b.0));
        for (k, v) in query {
            canonical_resource.push_str(&format!("\n{k}:{v}"));
        }

        format!(
            "{}\n\n\n{}\n{}\n{}\n\n\n\n{}\n\n\n{}{}",
            self.method,
            content_length,
            self.content_md5.unwrap_or(""),
            self.content_type.unwrap_or(""),
            self.if_none_match.unwrap_or(""),
            canonical_headers,
            canonical_resource
        )
    }
}

/// `Authorization` header value for Shared Key auth.
pub fn sign_shared_key(account: &str, key: &[u8], request: &CanonicalRequest<'_>) -> BlobResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| BlobError::Transport("invalid shared key".into()))?;
    mac.update(request.string_to_sign(account).as_bytes());
    let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKey {}:{}", account, signature))
}
