use crate::error::ProclensError;
use crate::model::{Pid, Snapshot};
use async_trait::async_trait;

/// Remote operations exposed by the backend process supervisor
///
/// This is the boundary of the layer: everything that actually touches
/// processes (signals, waits, registry bookkeeping) happens on the other side
/// of these five calls. Implementations are expected to map both
/// transport-level failures (network, timeout) and backend-level failures
/// ("no such pid", "access denied") onto [`ProclensError`]: the layer
/// reports them uniformly and never inspects which side failed.
///
/// Timeout policy belongs to the implementation; the layer only distinguishes
/// pending, succeeded and failed.
#[async_trait]
pub trait ProcessTransport: Send + Sync {
    /// Fetch the full current process state
    async fn list(&self) -> Result<Snapshot, ProclensError>;

    /// Kill a specific process. `force` requests immediate termination
    /// instead of a graceful shutdown.
    async fn kill(&self, pid: Pid, force: bool) -> Result<(), ProclensError>;

    /// Kill every process the backend knows about
    async fn kill_all(&self, force: bool) -> Result<(), ProclensError>;

    /// Kill all processes belonging to one project
    async fn kill_project(&self, project_name: &str, force: bool) -> Result<(), ProclensError>;

    /// Pause a running process
    async fn pause(&self, pid: Pid) -> Result<(), ProclensError>;

    /// Resume a paused process
    async fn resume(&self, pid: Pid) -> Result<(), ProclensError>;
}
