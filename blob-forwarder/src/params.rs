use std::path::PathBuf;
use append_blob_writer::{WriterConfig, DEFAULT_BLOCK_SIZE_LIMIT, DEFAULT_OBJECT_KEY_FORMAT};
use clap::{ArgAction, Parser};

/// Forwards newline-delimited records from stdin into rotating Azure append blobs.
#[derive(Parser)]
#[clap(name = "blob-forwarder", version)]
pub struct Args {
    /// Path prefix for object names. May contain strftime directives.
    #[clap(long, default_value = "")]
    pub(crate) path: String,
    #[clap(long, env = "AZURE_STORAGE_ACCOUNT")]
    pub(crate) azure_storage_account: Option<String>,
    #[clap(long, env = "AZURE_STORAGE_ACCESS_KEY", hide_env_values = true)]
    pub(crate) azure_storage_access_key: Option<String>,
    #[clap(long, env = "AZURE_STORAGE_CONNECTION_STRING", hide_env_values = true)]
    pub(crate) azure_storage_connection_string: Option<String>,
    #[clap(long, env = "AZURE_STORAGE_SAS_TOKEN", hide_env_values = true)]
    pub(crate) azure_storage_sas_token: Option<String>,
    #[clap(long)]
    pub(crate) azure_storage_dns_suffix: Option<String>,
    #[clap(long, default_value = "AZUREPUBLICCLOUD")]
    pub(crate) azure_cloud: String,
    #[clap(long, env = "AZURE_CLIENT_ID")]
    pub(crate) azure_msi_client_id: Option<String>,
    #[clap(long)]
    pub(crate) azure_msi_endpoint: Option<String>,
    #[clap(long, env = "AZURE_CONTAINER")]
    pub(crate) azure_container: Option<String>,
    #[clap(long, default_value = "2019-08-15")]
    pub(crate) azure_imds_api_version: String,
    /// Minutes between managed identity token refreshes.
    #[clap(long, default_value_t = 60)]
    pub(crate) azure_token_refresh_interval: u64,
    #[clap(long, default_value = DEFAULT_OBJECT_KEY_FORMAT)]
    pub(crate) azure_object_key_format: String,
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    pub(crate) auto_create_container: bool,
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    pub(crate) compute_checksums: bool,
    #[clap(long, default_value = "%Y%m%d")]
    pub(crate) time_slice_format: String,
    #[clap(long)]
    pub(crate) localtime: bool,
    /// Seconds before a single storage request is abandoned.
    #[clap(long, default_value_t = 30)]
    pub(crate) request_timeout: u64,
    #[clap(long, default_value_t = DEFAULT_BLOCK_SIZE_LIMIT)]
    pub(crate) block_size_limit: usize,

    /// Tag written into every formatted line.
    #[clap(long, default_value = "blob.forwarder")]
    pub(crate) tag: String,
    /// Width of a time bucket in seconds.
    #[clap(long, default_value_t = 86400)]
    pub(crate) timekey_secs: u64,
    #[clap(long, default_value_t = 60)]
    pub(crate) flush_interval_secs: u64,
    /// Buffered size that triggers a flush.
    #[clap(long, default_value_t = 8 * 1024 * 1024)]
    pub(crate) flush_bytes: usize,
    /// Write into a local directory instead of Azure.
    #[clap(long)]
    pub(crate) local_dir: Option<PathBuf>,
}

impl Args {
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            path: self.path.clone(),
            storage_account: self.azure_storage_account.clone(),
            storage_access_key: self.azure_storage_access_key.clone(),
            connection_string: self.azure_storage_connection_string.clone(),
            dns_suffix: self.azure_storage_dns_suffix.clone(),
            sas_token: self.azure_storage_sas_token.clone(),
            cloud: self.azure_cloud.clone(),
            msi_client_id: self.azure_msi_client_id.clone(),
            msi_endpoint: self.azure_msi_endpoint.clone(),
            container: self.azure_container.clone(),
            imds_api_version: self.azure_imds_api_version.clone(),
            token_refresh_interval: self.azure_token_refresh_interval,
            object_key_format: self.azure_object_key_format.clone(),
            auto_create_container: self.auto_create_container,
            compute_checksums: self.compute_checksums,
            time_slice_format: self.time_slice_format.clone(),
            localtime: self.localtime,
            request_timeout: self.request_timeout,
            block_size_limit: self.block_size_limit,
        }
    }
}
