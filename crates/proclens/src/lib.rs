//! Proclens - client-side process state synchronization and control dispatch
//!
//! The layer reconciles two competing sources of truth for backend process
//! state, a periodic poll fetch and a push-update channel, into one
//! authoritative view, and dispatches control commands (kill, kill-all,
//! pause, resume) with stale-state invalidation after every mutation.
//!
//! Rendering, confirmation dialogs and the backend supervisor itself are
//! external collaborators; the supervisor is reached only through the
//! [`ProcessTransport`] contract.

mod layer;
mod sync;

pub use layer::{Initialized, ProclensLayer, Uninitialized};
pub use sync::dispatcher::CommandDispatcher;
pub use sync::poller::RefreshHandle;
pub use sync::store::{ReconciliationStore, ViewState};

// Re-export core functionality
pub use proclens_core::*;
