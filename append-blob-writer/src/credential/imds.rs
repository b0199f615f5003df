use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;
use crate::credential::token::AccessToken;
use crate::errors::CredentialError;

/// Instance metadata token endpoint.
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
pub const DEFAULT_IMDS_API_VERSION: &str = "2019-08-15";
/// Audience requested for blob storage tokens.
pub const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

/// Something that can hand out a fresh bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Fetches managed identity tokens from the local instance metadata service.
#[derive(Clone, Debug)]
pub struct ImdsTokenSource {
    client: reqwest::Client,
    endpoint: Url,
    api_version: String,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds since the epoch. IMDS sends it as a string.
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

impl ImdsTokenSource {
    pub fn new(
        api_version: impl Into<String>,
        client_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: Url::parse(DEFAULT_IMDS_ENDPOINT)?,
            api_version: api_version.into(),
            client_id,
        })
    }

    /// Points the source at a different metadata endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, CredentialError> {
        self.endpoint = Url::parse(endpoint)?;
        Ok(self)
    }

    pub fn token_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api-version", &self.api_version)
                .append_pair("resource", STORAGE_RESOURCE);
            if let Some(client_id) = &self.client_id {
                query.append_pair("client_id", client_id);
            }
        }
        url
    }
}

fn parse_expiry(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        serde_json::Value::String(s) => s.parse::<i64>().ok()?,
        serde_json::Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

#[async_trait]
impl TokenSource for ImdsTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        let response = self
            .client
            .get(self.token_url())
            .header("Metadata", "true")
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(CredentialError::Status { status: status.as_u16() });
        }

        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body)?;
        let token = AccessToken::new(parsed.access_token);
        Ok(match parsed.expires_on.as_ref().and_then(parse_expiry) {
            Some(expires_on) => token.with_expiry(expires_on),
            None => token,
        })
    }
}
