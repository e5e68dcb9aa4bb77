use crate::sync::store::ReconciliationStore;
use backon::{ExponentialBuilder, Retryable};
use proclens_core::{ProcessTransport, ProclensError, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle used to request an immediate refetch of the authoritative view
///
/// Invalidation is idempotent: `Notify` holds at most one stored permit, so
/// requesting a refresh while one is already pending collapses into a single
/// wakeup of the poll driver.
#[derive(Clone, Default)]
pub struct RefreshHandle {
    notify: Arc<Notify>,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next poll cycle to run immediately
    pub fn request(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Creates a configured retry strategy based on the retry configuration
pub(crate) fn build_retry_strategy(retry_config: &RetryConfig) -> ExponentialBuilder {
    let mut retry_builder = ExponentialBuilder::default()
        .with_min_delay(retry_config.min_delay())
        .with_max_delay(retry_config.max_delay())
        .with_max_times(retry_config.max_attempts.saturating_sub(1) as usize);

    if retry_config.jitter {
        retry_builder = retry_builder.with_jitter();
    }

    retry_builder
}

/// Background task that keeps the poll-derived slot fresh
///
/// Wakes on a fixed cadence or on an invalidation request; either way it
/// performs one full `list()` fetch and goes back to sleep, so a forced
/// refetch re-arms the timer and the two wakeup paths converge on the same
/// effect.
pub(crate) struct PollDriver {
    transport: Arc<dyn ProcessTransport>,
    store: Arc<ReconciliationStore>,
    refresh: RefreshHandle,
    interval: Duration,
    retry: ExponentialBuilder,
    cancellation_token: CancellationToken,
}

impl PollDriver {
    pub(crate) fn new(
        transport: Arc<dyn ProcessTransport>,
        store: Arc<ReconciliationStore>,
        refresh: RefreshHandle,
        interval: Duration,
        retry_config: &RetryConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            transport,
            store,
            refresh,
            interval,
            retry: build_retry_strategy(retry_config),
            cancellation_token,
        }
    }

    /// Perform one fetch and reconcile the result into the store
    pub(crate) async fn fetch_once(&self) {
        let transport = self.transport.clone();
        let result = (|| async { transport.list().await })
            .retry(self.retry)
            .when(|e: &ProclensError| e.is_retryable())
            .await;

        match result {
            Ok(snapshot) => {
                debug!(projects = snapshot.len(), "Poll fetch succeeded");
                self.store.apply_poll(snapshot).await;
            }
            Err(e) => {
                warn!(error = %e, "Poll fetch failed; keeping last known snapshot");
                self.store.record_fetch_error(&e).await;
            }
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("Poll driver stopped");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.refresh.wait() => {
                    debug!("Refetch requested; polling immediately");
                }
            }

            self.fetch_once().await;
        }
    }
}
