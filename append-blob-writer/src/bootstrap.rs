use std::collections::HashSet;
use blob_store::AppendBlobService;
use tokio::sync::Mutex;
use crate::errors::BootstrapError;

/// Makes sure the target container exists before the first write.
pub struct ContainerBootstrap<'a> {
    service: &'a dyn AppendBlobService,
    auto_create: bool,
    /// Containers already confirmed to exist through this instance.
    ready: Mutex<HashSet<String>>,
}

impl<'a> ContainerBootstrap<'a> {
    pub fn new(service: &'a dyn AppendBlobService, auto_create: bool) -> Self {
        Self { service, auto_create, ready: Mutex::new(HashSet::new()) }
    }

    pub async fn ensure(&self, container: &str) -> Result<(), BootstrapError> {
        let mut ready = self.ready.lock().await;
        if ready.contains(container) {
            return Ok(());
        }

        if self.service.container_exists(container).await? {
            tracing::debug!("container {} exists", container);
        } else if self.auto_create {
            tracing::info!("container {} not found, creating it", container);
            self.service.create_container(container).await?;
        } else {
            return Err(BootstrapError::ContainerMissing { container: container.to_string() });
        }

        ready.insert(container.to_string());
        Ok(())
    }
}

/// One-shot form of [`ContainerBootstrap::ensure`].
pub async fn ensure_container(
    service: &dyn AppendBlobService,
    container: &str,
    auto_create: bool,
) -> Result<(), BootstrapError> {
    ContainerBootstrap::new(service, auto_create).ensure(container).await
}
