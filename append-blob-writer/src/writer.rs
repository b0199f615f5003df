use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use crate::appender::ChunkedAppender;
use crate::azure::{AzureBlobService, StorageAuth};
use crate::bootstrap::ContainerBootstrap;
use crate::config::{AuthMethod, ResolvedConfig, WriterConfig};
use crate::credential::{ImdsTokenSource, TokenRefresher};
use crate::cursor::WriterCursor;
use crate::errors::WriterError;
use crate::naming::{NameGenerator, ObjectName};
use crate::services::BlobServices;

/// Streams flushed chunks into rotating append blobs.
///
/// Flushes are serialized by `&mut self`: the cursor is only ever touched by
/// one flush at a time.
#[derive(Debug)]
pub struct AppendBlobWriter {
    service: BlobServices,
    container: String,
    naming: NameGenerator,
    cursor: WriterCursor,
    block_size_limit: usize,
    refresher: Option<TokenRefresher>,
}

impl AppendBlobWriter {
    /// Validates the configuration, obtains credentials and makes sure the
    /// container exists. Fails before any append when any of these fail.
    pub async fn start(config: &WriterConfig) -> Result<Self, WriterError> {
        let resolved = config.resolve()?;
        Self::start_resolved(resolved).await
    }

    pub async fn start_resolved(config: ResolvedConfig) -> Result<Self, WriterError> {
        let naming = NameGenerator::from_config(&config)?;

        let (auth, refresher) = match config.auth {
            AuthMethod::Static(auth) => (auth, None),
            AuthMethod::ManagedIdentity { client_id, api_version, endpoint, refresh_interval } => {
                let mut source = ImdsTokenSource::new(api_version, client_id, config.request_timeout)?;
                if let Some(endpoint) = endpoint {
                    source = source.with_endpoint(&endpoint)?;
                }
                let mut refresher = TokenRefresher::new(Arc::new(source), refresh_interval);
                let credential = refresher.start().await?;
                (StorageAuth::Bearer(credential), Some(refresher))
            }
        };

        let service = AzureBlobService::new(
            config.endpoint,
            auth,
            config.request_timeout,
            config.compute_checksums,
        )?;

        Self::from_parts(
            BlobServices::Azure(service),
            config.container,
            naming,
            config.block_size_limit,
            config.auto_create_container,
            refresher,
        )
        .await
    }

    /// Builds a writer over an already constructed service.
    pub async fn from_parts(
        service: BlobServices,
        container: impl Into<String>,
        naming: NameGenerator,
        block_size_limit: usize,
        auto_create_container: bool,
        refresher: Option<TokenRefresher>,
    ) -> Result<Self, WriterError> {
        let container = container.into();
        ContainerBootstrap::new(service.as_trait(), auto_create_container)
            .ensure(&container)
            .await?;
        tracing::info!("append blob writer ready for container {}", container);

        Ok(Self {
            service,
            container,
            naming,
            cursor: WriterCursor::default(),
            block_size_limit,
            refresher,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// The blob the last flush wrote to, or is writing to.
    pub fn current_object(&self) -> &ObjectName {
        self.cursor.current()
    }

    pub fn rotation_index(&self) -> u64 {
        self.cursor.rotation_index()
    }

    /// Writes one flushed chunk. `timekey` is the start of the chunk's time
    /// bucket, if the host keys chunks by time.
    pub async fn write(&mut self, payload: &[u8], timekey: Option<DateTime<Utc>>) -> Result<(), WriterError> {
        let key = self.naming.bucket_key(timekey, Utc::now());
        self.cursor.begin_cycle(&self.naming, &key);

        ChunkedAppender::new(self.service.as_trait(), &self.container, self.block_size_limit)
            .append(payload, &self.naming, &key, &mut self.cursor)
            .await?;

        self.cursor.finish_cycle();
        tracing::debug!("flushed {} bytes to {}", payload.len(), self.cursor.current());
        Ok(())
    }

    /// Reads the whole chunk from `reader` and writes it.
    pub async fn write_from<R>(&mut self, mut reader: R, timekey: Option<DateTime<Utc>>) -> Result<(), WriterError>
    where
        R: AsyncRead + Unpin,
    {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).await?;
        self.write(&payload, timekey).await
    }

    /// Stops token refresh, if any. Consumes the writer so no flush can follow.
    pub async fn shutdown(mut self) {
        if let Some(mut refresher) = self.refresher.take() {
            refresher.stop().await;
        }
        tracing::info!("append blob writer for container {} shut down", self.container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blob_store::BlobError;
    use chrono::TimeZone;
    use crate::credential::{AccessToken, RefresherState, TokenSource};
    use crate::errors::{AppendError, BootstrapError, CredentialError};
    use crate::testing::{limit_exceeded, server_error, Call, ScriptedService};

    fn naming() -> NameGenerator {
        NameGenerator::new("%{path}%{time_slice}-%{index}.log", "log/", "%Y%m%d", false).unwrap()
    }

    fn day(d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap())
    }

    async fn writer(service: Arc<ScriptedService>) -> AppendBlobWriter {
        AppendBlobWriter::from_parts(BlobServices::Custom(service), "logs", naming(), 10, true, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_failure_stops_start() {
        let service = Arc::new(ScriptedService::new().on_exists(Ok(false)));
        let err = AppendBlobWriter::from_parts(BlobServices::Custom(service.clone()), "logs", naming(), 10, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WriterError::Bootstrap(BootstrapError::ContainerMissing { .. })));
        assert_eq!(service.calls(), vec![Call::ContainerExists("logs".to_string())]);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_network() {
        let config = WriterConfig {
            storage_account: Some("acct".to_string()),
            storage_access_key: Some("a2V5".to_string()),
            ..Default::default()
        };
        let err = AppendBlobWriter::start(&config).await.unwrap_err();
        assert!(matches!(err, WriterError::Config(_)));
    }

    #[tokio::test]
    async fn test_write_uses_time_bucket() {
        let service = Arc::new(ScriptedService::new());
        let mut writer = writer(service.clone()).await;

        writer.write(b"first", day(1)).await.unwrap();
        writer.write(b"second", day(2)).await.unwrap();

        let attempts = service.appended();
        assert_eq!(attempts[0].0, "log/20240101-0.log");
        assert_eq!(attempts[1].0, "log/20240102-0.log");
        assert_eq!(writer.current_object().as_str(), "log/20240102-0.log");
    }

    #[tokio::test]
    async fn test_rotation_carries_into_next_flush() {
        let service = Arc::new(ScriptedService::new().on_append(Err(limit_exceeded("log/20240101-0.log"))));
        let mut writer = writer(service.clone()).await;

        writer.write(b"one", day(1)).await.unwrap();
        writer.write(b"two", day(1)).await.unwrap();
        assert_eq!(writer.rotation_index(), 1);

        let attempts = service.appended();
        assert_eq!(attempts.last().unwrap(), &("log/20240101-1.log".to_string(), b"two".to_vec()));

        writer.write(b"three", day(2)).await.unwrap();
        assert_eq!(writer.current_object().as_str(), "log/20240102-0.log");
        assert_eq!(writer.rotation_index(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_is_reported() {
        let service = Arc::new(ScriptedService::new().on_append(Err(server_error())));
        let mut writer = writer(service.clone()).await;

        let err = writer.write(b"payload", day(1)).await.unwrap_err();
        assert!(matches!(err, WriterError::Append(AppendError::Remote(BlobError::Service { .. }))));

        // a retry of the same chunk goes to the same blob
        writer.write(b"payload", day(1)).await.unwrap();
        assert_eq!(service.appended()[1].0, "log/20240101-0.log");
    }

    #[tokio::test]
    async fn test_write_from_reader() {
        let service = Arc::new(ScriptedService::new());
        let mut writer = writer(service.clone()).await;

        writer.write_from(&b"0123456789abcdef"[..], None).await.unwrap();

        assert_eq!(
            service.appended(),
            vec![
                ("log/-0.log".to_string(), b"0123456789".to_vec()),
                ("log/-0.log".to_string(), b"abcdef".to_vec()),
            ]
        );
    }

    struct FixedSource;

    #[async_trait]
    impl TokenSource for FixedSource {
        async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
            Ok(AccessToken::new("token"))
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_refresher() {
        let mut refresher = TokenRefresher::new(Arc::new(FixedSource), std::time::Duration::from_secs(3600));
        let credential = refresher.start().await.unwrap();
        let service = Arc::new(ScriptedService::new());
        let writer = AppendBlobWriter::from_parts(
            BlobServices::Custom(service),
            "logs",
            naming(),
            10,
            true,
            Some(refresher),
        )
        .await
        .unwrap();

        assert_eq!(writer.refresher.as_ref().map(|r| r.state()), Some(RefresherState::Running));
        writer.shutdown().await;
        assert_eq!(credential.current().secret(), "token");
    }
}
