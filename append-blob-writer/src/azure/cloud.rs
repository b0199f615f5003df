use std::fmt;
use std::str::FromStr;
use url::Url;
use crate::errors::ConfigError;

/// The Azure environments a storage account can live in.
///
/// Storage endpoint suffixes follow
/// https://github.com/Azure/go-autorest/blob/master/autorest/azure/environments.go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureCloud {
    China,
    Germany,
    Public,
    UsGovernment,
    /// Azure Stack has no well-known suffix; one must be configured.
    Stack,
}

impl AzureCloud {
    /// The storage DNS suffix for well-known clouds, `None` for Azure Stack.
    pub fn dns_suffix(self) -> Option<&'static str> {
        match self {
            AzureCloud::China => Some("core.chinacloudapi.cn"),
            AzureCloud::Germany => Some("core.cloudapi.de"),
            AzureCloud::Public => Some("core.windows.net"),
            AzureCloud::UsGovernment => Some("core.usgovcloudapi.net"),
            AzureCloud::Stack => None,
        }
    }

    /// Resolves the suffix to use, preferring the well-known one and requiring
    /// `custom` for Azure Stack.
    pub fn resolve_dns_suffix(self, custom: Option<&str>) -> Result<String, ConfigError> {
        match (self.dns_suffix(), custom) {
            (Some(suffix), _) => Ok(suffix.to_string()),
            (None, Some(custom)) if !custom.is_empty() => Ok(custom.to_string()),
            (None, _) => Err(ConfigError::MissingDnsSuffix),
        }
    }
}

impl FromStr for AzureCloud {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AZURECHINACLOUD" => Ok(AzureCloud::China),
            "AZUREGERMANCLOUD" => Ok(AzureCloud::Germany),
            "AZUREPUBLICCLOUD" => Ok(AzureCloud::Public),
            "AZUREUSGOVERNMENTCLOUD" => Ok(AzureCloud::UsGovernment),
            "AZURESTACKCLOUD" => Ok(AzureCloud::Stack),
            other => Err(ConfigError::InvalidCloud(other.to_string())),
        }
    }
}

impl fmt::Display for AzureCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AzureCloud::China => "AZURECHINACLOUD",
            AzureCloud::Germany => "AZUREGERMANCLOUD",
            AzureCloud::Public => "AZUREPUBLICCLOUD",
            AzureCloud::UsGovernment => "AZUREUSGOVERNMENTCLOUD",
            AzureCloud::Stack => "AZURESTACKCLOUD",
        };
        f.write_str(name)
    }
}

/// Where the blob service of one storage account is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEndpoint {
    pub account: String,
    /// Base url without a trailing slash, e.g. `https://acct.blob.core.windows.net`.
    pub base_url: String,
}

impl StorageEndpoint {
    pub fn for_account(account: &str, dns_suffix: &str) -> Self {
        Self::with_protocol(account, dns_suffix, "https")
    }

    pub fn with_protocol(account: &str, dns_suffix: &str, protocol: &str) -> Self {
        Self {
            account: account.to_string(),
            base_url: format!("{}://{}.blob.{}", protocol, account, dns_suffix),
        }
    }

    /// Uses an explicit blob endpoint, e.g. from a connection string or an emulator.
    pub fn custom(account: &str, blob_endpoint: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(blob_endpoint)?;
        Ok(Self {
            account: account.to_string(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }
}
