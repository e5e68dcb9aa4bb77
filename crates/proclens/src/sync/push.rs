use crate::sync::store::ReconciliationStore;
use proclens_core::PushEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Background task draining raw push payloads into the store
///
/// The channel may deliver zero, one or many messages over a session; if it
/// closes or never connects, the listener exits quietly and the view keeps
/// working from polling alone. A payload that does not parse as a full
/// snapshot message is discarded without touching the view.
pub(crate) struct PushListener {
    store: Arc<ReconciliationStore>,
    cancellation_token: CancellationToken,
}

impl PushListener {
    pub(crate) fn new(store: Arc<ReconciliationStore>, cancellation_token: CancellationToken) -> Self {
        Self {
            store,
            cancellation_token,
        }
    }

    pub(crate) fn spawn(self, mut payloads: mpsc::Receiver<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancellation_token.cancelled() => {
                        info!("Push listener stopped");
                        break;
                    }
                    message = payloads.recv() => match message {
                        Some(payload) => match PushEvent::from_json(&payload) {
                            Ok(event) => self.store.apply_push(event.processes).await,
                            Err(e) => warn!(error = %e, "Discarding malformed push message"),
                        },
                        None => {
                            info!("Push channel closed; polling remains the only source");
                            break;
                        }
                    }
                }
            }
        })
    }
}
