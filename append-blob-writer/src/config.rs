use std::time::Duration;
use validator::Validate;
use crate::azure::{AzureCloud, ConnectionString, StorageAuth, StorageEndpoint};
use crate::credential::imds::DEFAULT_IMDS_API_VERSION;
use crate::errors::ConfigError;
use crate::naming::validate_strftime;

/// Largest block sent in one append call.
pub const DEFAULT_BLOCK_SIZE_LIMIT: usize = 4 * 1024 * 1024 - 1;
pub const DEFAULT_OBJECT_KEY_FORMAT: &str = "%{path}%{time_slice}-%{index}.log";

/// Writer settings as supplied by the operator.
#[derive(Clone, Validate)]
pub struct WriterConfig {
    pub path: String,
    #[validate(length(min = 3, max = 24))]
    pub storage_account: Option<String>,
    pub storage_access_key: Option<String>,
    pub connection_string: Option<String>,
    pub dns_suffix: Option<String>,
    pub sas_token: Option<String>,
    pub cloud: String,
    pub msi_client_id: Option<String>,
    /// Overrides the instance metadata token endpoint.
    pub msi_endpoint: Option<String>,
    #[validate(length(min = 3, max = 63))]
    pub container: Option<String>,
    pub imds_api_version: String,
    /// Minutes between token refreshes.
    #[validate(range(min = 1))]
    pub token_refresh_interval: u64,
    #[validate(length(min = 1))]
    pub object_key_format: String,
    pub auto_create_container: bool,
    pub compute_checksums: bool,
    pub time_slice_format: String,
    pub localtime: bool,
    /// Seconds before a single remote call is abandoned.
    #[validate(range(min = 1))]
    pub request_timeout: u64,
    #[validate(range(min = 1))]
    pub block_size_limit: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            storage_account: None,
            storage_access_key: None,
            connection_string: None,
            dns_suffix: None,
            sas_token: None,
            cloud: "AZUREPUBLICCLOUD".to_string(),
            msi_client_id: None,
            msi_endpoint: None,
            container: None,
            imds_api_version: DEFAULT_IMDS_API_VERSION.to_string(),
            token_refresh_interval: 60,
            object_key_format: DEFAULT_OBJECT_KEY_FORMAT.to_string(),
            auto_create_container: true,
            compute_checksums: true,
            time_slice_format: "%Y%m%d".to_string(),
            localtime: false,
            request_timeout: 30,
            block_size_limit: DEFAULT_BLOCK_SIZE_LIMIT,
        }
    }
}

impl std::fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("WriterConfig")
            .field("path", &self.path)
            .field("storage_account", &self.storage_account)
            .field("storage_access_key", &redact(&self.storage_access_key))
            .field("connection_string", &redact(&self.connection_string))
            .field("dns_suffix", &self.dns_suffix)
            .field("sas_token", &redact(&self.sas_token))
            .field("cloud", &self.cloud)
            .field("msi_client_id", &self.msi_client_id)
            .field("container", &self.container)
            .field("object_key_format", &self.object_key_format)
            .field("time_slice_format", &self.time_slice_format)
            .field("localtime", &self.localtime)
            .finish_non_exhaustive()
    }
}

/// How the writer authenticates, decided from which secrets were configured.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Static credentials: account key or SAS token.
    Static(StorageAuth),
    /// Bearer tokens from the instance metadata service.
    ManagedIdentity {
        client_id: Option<String>,
        api_version: String,
        endpoint: Option<String>,
        refresh_interval: Duration,
    },
}

/// A configuration that passed every check and needs no further parsing.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: StorageEndpoint,
    pub container: String,
    pub auth: AuthMethod,
    pub auto_create_container: bool,
    pub compute_checksums: bool,
    pub request_timeout: Duration,
    pub block_size_limit: usize,
    pub object_key_format: String,
    pub path: String,
    pub time_slice_format: String,
    pub localtime: bool,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl WriterConfig {
    /// Account and container are both required when a key or SAS token is used.
    fn static_account(&self) -> Result<&str, ConfigError> {
        let account = self.storage_account.as_deref().ok_or(ConfigError::MissingAccount)?;
        if self.container.is_none() {
            return Err(ConfigError::MissingContainer);
        }
        Ok(account)
    }

    /// Validates the settings and decides on endpoint and auth.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        self.validate()?;
        validate_strftime(&self.time_slice_format)?;
        validate_strftime(&self.path)?;

        let cloud: AzureCloud = self.cloud.parse()?;
        let dns_suffix = cloud.resolve_dns_suffix(self.dns_suffix.as_deref())?;

        let access_key = non_empty(&self.storage_access_key);
        let sas_token = non_empty(&self.sas_token);
        let connection_string = non_empty(&self.connection_string);

        let (endpoint, auth) = match (access_key, sas_token, connection_string) {
            (None, None, None) => {
                tracing::info!(
                    "Using MSI since neither of azure_storage_access_key, azure_storage_sas_token, azure_storage_connection_string was provided."
                );
                let account = self.storage_account.as_deref().ok_or(ConfigError::MissingAccount)?;
                let auth = AuthMethod::ManagedIdentity {
                    client_id: self.msi_client_id.clone(),
                    api_version: self.imds_api_version.clone(),
                    endpoint: self.msi_endpoint.clone(),
                    refresh_interval: Duration::from_secs(self.token_refresh_interval * 60),
                };
                (StorageEndpoint::for_account(account, &dns_suffix), auth)
            }
            (_, _, Some(raw)) => {
                let parsed = ConnectionString::parse(raw)?;
                resolve_connection_string(&parsed, &dns_suffix)?
            }
            (Some(key), _, None) => {
                let account = self.static_account()?;
                let auth = StorageAuth::shared_key(account, key).map_err(ConfigError::InvalidAccessKey)?;
                (StorageEndpoint::for_account(account, &dns_suffix), AuthMethod::Static(auth))
            }
            (None, Some(sas), None) => {
                let account = self.static_account()?;
                (StorageEndpoint::for_account(account, &dns_suffix), AuthMethod::Static(StorageAuth::sas_token(sas)))
            }
        };

        let container = self.container.clone().ok_or(ConfigError::MissingContainer)?;

        Ok(ResolvedConfig {
            endpoint,
            container,
            auth,
            auto_create_container: self.auto_create_container,
            compute_checksums: self.compute_checksums,
            request_timeout: Duration::from_secs(self.request_timeout),
            block_size_limit: self.block_size_limit,
            object_key_format: self.object_key_format.clone(),
            path: self.path.clone(),
            time_slice_format: self.time_slice_format.clone(),
            localtime: self.localtime,
        })
    }
}

fn resolve_connection_string(
    parsed: &ConnectionString,
    default_suffix: &str,
) -> Result<(StorageEndpoint, AuthMethod), ConfigError> {
    let account = parsed.account_name.clone().unwrap_or_default();
    let endpoint = match (&parsed.blob_endpoint, &parsed.endpoint_suffix) {
        (Some(blob_endpoint), _) => StorageEndpoint::custom(&account, blob_endpoint)?,
        (None, suffix) => StorageEndpoint::with_protocol(
            &account,
            suffix.as_deref().unwrap_or(default_suffix),
            parsed.protocol.as_deref().unwrap_or("https"),
        ),
    };

    let auth = match (&parsed.account_key, &parsed.sas_token) {
        (Some(key), _) if !account.is_empty() => {
            StorageAuth::shared_key(account.clone(), key).map_err(ConfigError::InvalidAccessKey)?
        }
        (_, Some(sas)) => StorageAuth::sas_token(sas),
        _ => {
            return Err(ConfigError::InvalidConnectionString(
                "AccountKey requires AccountName; a connection string without AccountName needs SharedAccessSignature".to_string(),
            ))
        }
    };
    Ok((endpoint, AuthMethod::Static(auth)))
}
