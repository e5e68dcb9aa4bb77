use crate::sync::dispatcher::CommandDispatcher;
use crate::sync::poller::{PollDriver, RefreshHandle};
use crate::sync::push::PushListener;
use crate::sync::store::{ReconciliationStore, ViewState};
use proclens_core::{
    LayerConfig, Pid, ProcessNode, ProcessTransport, ProclensError, PushEvent, Snapshot, flatten,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Copy)]
pub struct Initialized;

#[derive(Clone, Copy)]
pub struct Uninitialized;

/// The process view layer
///
/// Created against a [`ProcessTransport`] implementation, then brought live
/// with [`connect`](ProclensLayer::connect), which performs the startup fetch
/// and spawns the poll driver. The initialized layer is cheap to clone and
/// share with the Presentation Adapter.
#[derive(Clone)]
pub struct ProclensLayer<Status> {
    config: LayerConfig,
    transport: Arc<dyn ProcessTransport>,
    store: Arc<ReconciliationStore>,
    dispatcher: Arc<CommandDispatcher>,
    refresh: RefreshHandle,
    cancellation_token: CancellationToken,
    _status: std::marker::PhantomData<Status>,
}

impl<Status> std::fmt::Debug for ProclensLayer<Status> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProclensLayer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProclensLayer<Uninitialized> {
    pub fn new(
        config: LayerConfig,
        transport: Arc<dyn ProcessTransport>,
    ) -> Result<Self, ProclensError> {
        config
            .validate()
            .map_err(|e| ProclensError::configuration(e.to_string()))?;

        let store = Arc::new(ReconciliationStore::new());
        let refresh = RefreshHandle::new();
        let dispatcher = Arc::new(CommandDispatcher::new(
            transport.clone(),
            store.clone(),
            refresh.clone(),
        ));

        Ok(Self {
            config,
            transport,
            store,
            dispatcher,
            refresh,
            cancellation_token: CancellationToken::new(),
            _status: Default::default(),
        })
    }

    /// Perform the startup fetch and start the periodic poll driver
    ///
    /// A failed startup fetch does not fail `connect`: the error is recorded
    /// next to the (still loading) view and the poll cadence keeps retrying,
    /// so a transient backend outage at startup resolves by itself.
    pub async fn connect(self) -> Result<ProclensLayer<Initialized>, ProclensError> {
        info!(name = %self.config.name, "Connecting process view layer");

        let driver = PollDriver::new(
            self.transport.clone(),
            self.store.clone(),
            self.refresh.clone(),
            self.config.poll_interval(),
            &self.config.retry_config,
            self.cancellation_token.clone(),
        );

        driver.fetch_once().await;
        driver.spawn();

        Ok(ProclensLayer {
            config: self.config,
            transport: self.transport,
            store: self.store,
            dispatcher: self.dispatcher,
            refresh: self.refresh,
            cancellation_token: self.cancellation_token,
            _status: Default::default(),
        })
    }
}

impl ProclensLayer<Initialized> {
    /// The authoritative view: push-derived once any push has been seen,
    /// else poll-derived, else empty
    pub async fn current_view(&self) -> Arc<Snapshot> {
        self.store.current_view().await
    }

    /// Loading-state versus (possibly empty) data
    pub async fn view_state(&self) -> ViewState {
        self.store.view_state().await
    }

    /// Pre-order flat listing of every process in the current view, for
    /// simpler displays and filtering
    pub async fn flat_view(&self) -> Vec<ProcessNode> {
        let view = self.store.current_view().await;
        flatten(&view).into_iter().cloned().collect()
    }

    /// Total number of processes in the current view
    pub async fn process_count(&self) -> usize {
        self.store.process_count().await
    }

    /// The most recent fetch failure, shown alongside stale data until a
    /// poll succeeds again
    pub async fn last_fetch_error(&self) -> Option<String> {
        self.store.last_fetch_error().await
    }

    /// Request an immediate refetch of the authoritative view. Idempotent:
    /// requesting while a refetch is already pending is a no-op beyond
    /// re-arming the poll timer.
    pub fn invalidate(&self) {
        self.refresh.request();
    }

    pub async fn kill_process(&self, pid: Pid, force: bool) -> Result<(), ProclensError> {
        self.dispatcher.kill_process(pid, force).await
    }

    pub async fn kill_all_processes(&self, force: bool) -> Result<(), ProclensError> {
        self.dispatcher.kill_all_processes(force).await
    }

    pub async fn kill_project_processes(
        &self,
        project_name: &str,
        force: bool,
    ) -> Result<(), ProclensError> {
        self.dispatcher
            .kill_project_processes(project_name, force)
            .await
    }

    pub async fn pause_process(&self, pid: Pid) -> Result<(), ProclensError> {
        self.dispatcher.pause_process(pid).await
    }

    pub async fn resume_process(&self, pid: Pid) -> Result<(), ProclensError> {
        self.dispatcher.resume_process(pid).await
    }

    pub fn kill_in_flight(&self) -> bool {
        self.dispatcher.kill_in_flight()
    }

    pub fn kill_all_in_flight(&self) -> bool {
        self.dispatcher.kill_all_in_flight()
    }

    /// Apply an already-parsed push snapshot
    pub async fn apply_push_snapshot(&self, snapshot: Snapshot) {
        self.store.apply_push(snapshot).await;
    }

    /// Parse and apply one raw push payload; a malformed payload is
    /// discarded without touching the view
    pub async fn ingest_push_payload(&self, payload: &str) {
        match PushEvent::from_json(payload) {
            Ok(event) => self.store.apply_push(event.processes).await,
            Err(e) => warn!(error = %e, "Discarding malformed push message"),
        }
    }

    /// Spawn a listener draining raw push payloads from the given channel.
    /// Returns the sender half sized per `push_buffer`, plus the task handle.
    pub fn attach_push_channel(&self) -> (mpsc::Sender<String>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.push_buffer);
        let listener = PushListener::new(self.store.clone(), self.cancellation_token.clone());
        (tx, listener.spawn(rx))
    }

    /// Stop the poll driver and any push listeners
    pub async fn cancel(self) -> Result<(), ProclensError> {
        info!(name = %self.config.name, "Cancelling process view layer");
        self.cancellation_token.cancel();
        Ok(())
    }
}
