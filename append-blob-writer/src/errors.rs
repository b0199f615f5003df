use blob_store::BlobError;
use thiserror::Error;

/// Configuration problems. These are raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("azure_cloud invalid, must be either of AZURECHINACLOUD, AZUREGERMANCLOUD, AZUREPUBLICCLOUD, AZUREUSGOVERNMENTCLOUD, AZURESTACKCLOUD")]
    InvalidCloud(String),

    #[error("azure_storage_dns_suffix invalid, must not be empty for AZURESTACKCLOUD")]
    MissingDnsSuffix,

    #[error("azure_storage_account needs to be specified")]
    MissingAccount,

    #[error("azure_container needs to be specified")]
    MissingContainer,

    #[error("azure_storage_access_key is not valid base64")]
    InvalidAccessKey(#[source] base64::DecodeError),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid time format {0:?}")]
    InvalidTimeFormat(String),

    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Access token request was not successful (HTTP {status}). Possibly due to missing azure_msi_client_id config parameter.")]
    Status { status: u16 },

    #[error("access token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("access token response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("identity endpoint url is invalid: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("token refresher has already been stopped")]
    Stopped,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("The specified container does not exist: container = {container}")]
    ContainerMissing { container: String },

    #[error(transparent)]
    Remote(#[from] BlobError),
}

#[derive(Debug, Error)]
pub enum AppendError {
    #[error("append blocks limit reached for {object} and the object key format has no %{{index}} placeholder, so the blob cannot be rotated")]
    RotationImpossible { object: String },

    #[error(transparent)]
    Remote(#[from] BlobError),
}

/// Everything that can go wrong while starting a writer or flushing to it.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Append(#[from] AppendError),

    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read payload: {0}")]
    Io(#[from] std::io::Error),
}
