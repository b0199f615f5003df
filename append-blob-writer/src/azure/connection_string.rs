use crate::errors::ConfigError;

/// The parts of a storage connection string this writer understands.
///
/// `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net`
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: Option<String>,
    pub endpoint_suffix: Option<String>,
    pub protocol: Option<String>,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut parsed = ConnectionString::default();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // values (keys, SAS tokens) may themselves contain '='
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidConnectionString(format!("segment without '=': {part:?}")))?;
            let value = value.to_string();
            match key {
                "AccountName" => parsed.account_name = Some(value),
                "AccountKey" => parsed.account_key = Some(value),
                "SharedAccessSignature" => parsed.sas_token = Some(value),
                "BlobEndpoint" => parsed.blob_endpoint = Some(value),
                "EndpointSuffix" => parsed.endpoint_suffix = Some(value),
                "DefaultEndpointsProtocol" => parsed.protocol = Some(value),
                other => tracing::debug!("ignoring connection string key {}", other),
            }
        }

        if parsed.account_name.is_none() && parsed.blob_endpoint.is_none() {
            return Err(ConfigError::InvalidConnectionString(
                "either AccountName or BlobEndpoint is required".to_string(),
            ));
        }
        if parsed.account_key.is_none() && parsed.sas_token.is_none() {
            return Err(ConfigError::InvalidConnectionString(
                "either AccountKey or SharedAccessSignature is required".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account_key_string() {
        let cs = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5PT0=;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(cs.account_name.as_deref(), Some("acct"));
        assert_eq!(cs.account_key.as_deref(), Some("a2V5PT0="));
        assert_eq!(cs.endpoint_suffix.as_deref(), Some("core.windows.net"));
        assert_eq!(cs.protocol.as_deref(), Some("https"));
    }

    #[test]
    fn test_parse_sas_with_blob_endpoint() {
        let cs = ConnectionString::parse(
            "BlobEndpoint=https://acct.blob.core.windows.net/;SharedAccessSignature=sv=2020-08-04&sig=abc%3D",
        )
        .unwrap();
        assert_eq!(cs.blob_endpoint.as_deref(), Some("https://acct.blob.core.windows.net/"));
        assert_eq!(cs.sas_token.as_deref(), Some("sv=2020-08-04&sig=abc%3D"));
        assert!(cs.account_name.is_none());
    }

    #[test]
    fn test_rejects_incomplete_strings() {
        assert!(ConnectionString::parse("https://test").is_err());
        assert!(ConnectionString::parse("AccountName=acct").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cs = ConnectionString::parse("AccountName=acct;AccountKey=c2VjcmV0").unwrap();
        let printed = format!("{cs:?}");
        assert!(!printed.contains("c2VjcmV0"));
    }
}
