use proclens_core::{ProclensError, Snapshot, snapshot_process_count};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// What the Presentation Adapter should render
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// No snapshot has ever been received from either source
    Loading,
    /// At least one snapshot has arrived; an empty one is the empty-state,
    /// not a loading-state
    Ready(Arc<Snapshot>),
}

#[derive(Default)]
struct Slots {
    push: Option<Arc<Snapshot>>,
    poll: Option<Arc<Snapshot>>,
    last_fetch_error: Option<String>,
}

/// Holds the authoritative "current processes" view
///
/// Two independently replaceable slots, one per update source, plus a pure
/// selection rule: the push-derived snapshot wins once one has ever been
/// seen, because push updates are strictly fresher once the channel is live.
/// Snapshots are immutable once stored; every update replaces a slot
/// wholesale and readers receive a cloned `Arc`, never a mutated value.
pub struct ReconciliationStore {
    slots: RwLock<Slots>,
    empty: Arc<Snapshot>,
}

impl Default for ReconciliationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationStore {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            empty: Arc::new(Snapshot::new()),
        }
    }

    /// Replace the push-derived snapshot. Always the full state, never a
    /// partial merge.
    pub async fn apply_push(&self, snapshot: Snapshot) {
        debug!(projects = snapshot.len(), "Applying push snapshot");
        self.slots.write().await.push = Some(Arc::new(snapshot));
    }

    /// Replace the poll-derived snapshot. A successful fetch supersedes any
    /// previously recorded fetch failure.
    pub async fn apply_poll(&self, snapshot: Snapshot) {
        debug!(projects = snapshot.len(), "Applying poll snapshot");
        let mut slots = self.slots.write().await;
        slots.poll = Some(Arc::new(snapshot));
        slots.last_fetch_error = None;
    }

    /// Record a failed fetch, keeping the last-known-good snapshot so a
    /// transient failure does not blank the display
    pub async fn record_fetch_error(&self, error: &ProclensError) {
        self.slots.write().await.last_fetch_error = Some(error.to_string());
    }

    pub async fn last_fetch_error(&self) -> Option<String> {
        self.slots.read().await.last_fetch_error.clone()
    }

    /// The authoritative view: push-derived if ever received, else
    /// poll-derived, else empty
    pub async fn current_view(&self) -> Arc<Snapshot> {
        let slots = self.slots.read().await;
        slots
            .push
            .clone()
            .or_else(|| slots.poll.clone())
            .unwrap_or_else(|| self.empty.clone())
    }

    /// Sum of `total_count` over all projects in the current view
    pub async fn process_count(&self) -> usize {
        snapshot_process_count(&*self.current_view().await)
    }

    /// Whether any snapshot has ever been received from either source
    pub async fn has_received(&self) -> bool {
        let slots = self.slots.read().await;
        slots.push.is_some() || slots.poll.is_some()
    }

    pub async fn view_state(&self) -> ViewState {
        let slots = self.slots.read().await;
        match slots.push.clone().or_else(|| slots.poll.clone()) {
            Some(view) => ViewState::Ready(view),
            None => ViewState::Loading,
        }
    }

    /// Optimistic clear after a confirmed kill-all: the push slot becomes an
    /// empty snapshot so the view reports empty before the next authoritative
    /// update arrives. Only called once the remote call has succeeded.
    pub async fn clear_view(&self) {
        debug!("Clearing view after confirmed kill-all");
        self.slots.write().await.push = Some(self.empty.clone());
    }
}
