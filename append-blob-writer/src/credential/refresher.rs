use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::credential::imds::TokenSource;
use crate::credential::token::SharedCredential;
use crate::errors::CredentialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Idle,
    Running,
    Stopped,
}

/// Keeps a [`SharedCredential`] fresh for the lifetime of a writer.
///
/// `start` blocks until the first token is obtained; afterwards a background
/// task re-fetches the token every `interval` and swaps it in. A failed refresh
/// keeps the previous token and tries again on the next tick.
pub struct TokenRefresher {
    source: Arc<dyn TokenSource>,
    interval: Duration,
    state: RefresherState,
    credential: Option<SharedCredential>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TokenRefresher {
    pub fn new(source: Arc<dyn TokenSource>, interval: Duration) -> Self {
        Self {
            source,
            // tokio intervals cannot tick with a zero period
            interval: interval.max(Duration::from_millis(1)),
            state: RefresherState::Idle,
            credential: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn state(&self) -> RefresherState {
        self.state
    }

    pub fn credential(&self) -> Option<SharedCredential> {
        self.credential.clone()
    }

    /// Fetches the initial token and launches the periodic refresh task.
    pub async fn start(&mut self) -> Result<SharedCredential, CredentialError> {
        match self.state {
            RefresherState::Running => {
                if let Some(credential) = &self.credential {
                    return Ok(credential.clone());
                }
            }
            RefresherState::Stopped => return Err(CredentialError::Stopped),
            RefresherState::Idle => {}
        }

        let token = self.source.fetch_token().await?;
        let credential = SharedCredential::new(token);

        self.task = Some(tokio::spawn(refresh_loop(
            self.source.clone(),
            credential.clone(),
            self.interval,
            self.cancel.clone(),
        )));
        self.credential = Some(credential.clone());
        self.state = RefresherState::Running;
        tracing::info!("token refresh started, refreshing every {:?}", self.interval);
        Ok(credential)
    }

    /// Signals the refresh task and waits for it to exit. No refresh happens
    /// once this returns.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("token refresh task ended abnormally: {}", e);
            }
        }
        self.state = RefresherState::Stopped;
    }
}

impl fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("interval", &self.interval)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for TokenRefresher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn refresh_loop(
    source: Arc<dyn TokenSource>,
    credential: SharedCredential,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            fetched = source.fetch_token() => fetched,
        };

        match fetched {
            Ok(token) => {
                credential.replace(token);
                tracing::debug!("access token refreshed");
            }
            Err(e) => {
                tracing::warn!("access token refresh failed, retrying in {:?}: {}", interval, e);
            }
        }
    }
    tracing::debug!("token refresh task stopped");
}
