use crate::sync::poller::RefreshHandle;
use crate::sync::store::ReconciliationStore;
use proclens_core::{Pid, ProcessTransport, ProclensError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

/// Turns user control intents into transport calls with correct invalidation
///
/// Every successful mutation requests an immediate refetch so the view never
/// displays state the backend has already changed. Failures are surfaced to
/// the caller untouched; the view stays exactly as it was before the call.
///
/// The dispatcher tracks whether a kill and a kill-all are in flight so the
/// Presentation Adapter can disable duplicate submission. Kills of different
/// pids run concurrently and resolve independently; only a duplicate kill-all
/// is refused outright, since its shape carries nothing to tell two requests
/// apart.
pub struct CommandDispatcher {
    transport: Arc<dyn ProcessTransport>,
    store: Arc<ReconciliationStore>,
    refresh: RefreshHandle,
    kills_in_flight: AtomicUsize,
    kill_all_in_flight: AtomicBool,
}

impl CommandDispatcher {
    pub fn new(
        transport: Arc<dyn ProcessTransport>,
        store: Arc<ReconciliationStore>,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            transport,
            store,
            refresh,
            kills_in_flight: AtomicUsize::new(0),
            kill_all_in_flight: AtomicBool::new(false),
        }
    }

    /// Whether any kill command is currently outstanding
    pub fn kill_in_flight(&self) -> bool {
        self.kills_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Whether a kill-all command is currently outstanding
    pub fn kill_all_in_flight(&self) -> bool {
        self.kill_all_in_flight.load(Ordering::SeqCst)
    }

    /// Kill one process. The pid is not validated against the view; the
    /// backend is authoritative and reports unknown pids as failures.
    pub async fn kill_process(&self, pid: Pid, force: bool) -> Result<(), ProclensError> {
        let _guard = CounterGuard::enter(&self.kills_in_flight);
        info!(pid, force, "Dispatching kill");
        self.transport.kill(pid, force).await?;
        self.refresh.request();
        Ok(())
    }

    /// Emergency stop: kill every process the backend knows about
    ///
    /// On success the view is optimistically cleared before the next
    /// authoritative update arrives; on failure nothing is applied and the
    /// pre-call view survives untouched.
    pub async fn kill_all_processes(&self, force: bool) -> Result<(), ProclensError> {
        let Some(_guard) = FlagGuard::try_enter(&self.kill_all_in_flight) else {
            return Err(ProclensError::CommandInFlight("kill-all"));
        };
        info!(force, "Dispatching kill-all");
        self.transport.kill_all(force).await?;
        self.store.clear_view().await;
        self.refresh.request();
        Ok(())
    }

    /// Kill all processes belonging to one project. Plain invalidation, no
    /// optimistic clear: other projects' processes survive the command.
    pub async fn kill_project_processes(
        &self,
        project_name: &str,
        force: bool,
    ) -> Result<(), ProclensError> {
        info!(project_name, force, "Dispatching project kill");
        self.transport.kill_project(project_name, force).await?;
        self.refresh.request();
        Ok(())
    }

    /// Pause a process. The caller should only offer this for processes in
    /// `running` status; the precondition is not enforced here.
    pub async fn pause_process(&self, pid: Pid) -> Result<(), ProclensError> {
        info!(pid, "Dispatching pause");
        self.transport.pause(pid).await?;
        self.refresh.request();
        Ok(())
    }

    /// Resume a paused process
    pub async fn resume_process(&self, pid: Pid) -> Result<(), ProclensError> {
        info!(pid, "Dispatching resume");
        self.transport.resume(pid).await?;
        self.refresh.request();
        Ok(())
    }
}

/// Increments on entry, decrements on drop so an error or a dropped future
/// cannot leak an in-flight count
struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive in-flight flag; acquisition fails while another holder lives
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn try_enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use proclens_core::{ProcessNode, ProcessStatus, ProjectProcesses, Snapshot};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use tokio::time::{Duration, timeout};

    fn demo_snapshot(pids: &[Pid]) -> Snapshot {
        let processes = pids
            .iter()
            .map(|&pid| ProcessNode {
                pid,
                name: format!("proc-{pid}"),
                status: ProcessStatus::Running,
                started_at: Utc::now(),
                parent_pid: None,
                cmdline: String::new(),
                children: vec![],
            })
            .collect::<Vec<_>>();
        vec![ProjectProcesses {
            project_name: "demo".to_string(),
            total_count: processes.len(),
            processes,
        }]
    }

    /// Transport whose kill calls block until released, for exercising
    /// in-flight bookkeeping and concurrency
    #[derive(Default)]
    struct ScriptedTransport {
        fail_kill_all: bool,
        fail_pids: HashSet<Pid>,
        gates: Mutex<Vec<oneshot::Receiver<()>>>,
        killed: Mutex<Vec<Pid>>,
    }

    impl ScriptedTransport {
        fn gated(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<()>>) {
            let transport = Self::default();
            let mut senders = Vec::new();
            {
                let mut gates = transport.gates.lock().unwrap();
                for _ in 0..count {
                    let (tx, rx) = oneshot::channel();
                    senders.push(tx);
                    gates.push(rx);
                }
            }
            (Arc::new(transport), senders)
        }

        async fn wait_gate(&self) {
            let gate = self.gates.lock().unwrap().pop();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
        }
    }

    #[async_trait]
    impl ProcessTransport for ScriptedTransport {
        async fn list(&self) -> Result<Snapshot, ProclensError> {
            Ok(demo_snapshot(&[1]))
        }

        async fn kill(&self, pid: Pid, _force: bool) -> Result<(), ProclensError> {
            self.wait_gate().await;
            if self.fail_pids.contains(&pid) {
                return Err(ProclensError::backend(format!("no such pid {pid}")));
            }
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }

        async fn kill_all(&self, _force: bool) -> Result<(), ProclensError> {
            self.wait_gate().await;
            if self.fail_kill_all {
                return Err(ProclensError::backend("emergency stop failed"));
            }
            Ok(())
        }

        async fn kill_project(&self, _project: &str, _force: bool) -> Result<(), ProclensError> {
            Ok(())
        }

        async fn pause(&self, pid: Pid) -> Result<(), ProclensError> {
            if self.fail_pids.contains(&pid) {
                return Err(ProclensError::backend(format!("no such pid {pid}")));
            }
            Ok(())
        }

        async fn resume(&self, pid: Pid) -> Result<(), ProclensError> {
            if self.fail_pids.contains(&pid) {
                return Err(ProclensError::backend(format!("no such pid {pid}")));
            }
            Ok(())
        }
    }

    fn dispatcher(transport: Arc<ScriptedTransport>) -> (CommandDispatcher, Arc<ReconciliationStore>, RefreshHandle) {
        let store = Arc::new(ReconciliationStore::new());
        let refresh = RefreshHandle::new();
        let dispatcher = CommandDispatcher::new(transport, store.clone(), refresh.clone());
        (dispatcher, store, refresh)
    }

    #[tokio::test]
    async fn test_kill_success_requests_refetch() {
        let (transport, _) = ScriptedTransport::gated(0);
        let (dispatcher, _store, refresh) = dispatcher(transport.clone());

        dispatcher.kill_process(1, false).await.unwrap();
        assert_eq!(*transport.killed.lock().unwrap(), vec![1]);
        assert!(!dispatcher.kill_in_flight());

        // The invalidation permit must be waiting for the poll driver.
        timeout(Duration::from_millis(50), refresh.wait())
            .await
            .expect("refetch should have been requested");
    }

    #[tokio::test]
    async fn test_kill_failure_leaves_view_untouched() {
        let mut transport = ScriptedTransport::default();
        transport.fail_pids.insert(42);
        let (dispatcher, store, refresh) = dispatcher(Arc::new(transport));
        store.apply_poll(demo_snapshot(&[42])).await;

        let err = dispatcher.kill_process(42, false).await.unwrap_err();
        assert!(matches!(err, ProclensError::Backend(_)));
        assert_eq!(store.process_count().await, 1);
        assert!(!dispatcher.kill_in_flight());

        // No invalidation on failure.
        assert!(
            timeout(Duration::from_millis(20), refresh.wait())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_kill_in_flight_flag_tracks_outstanding_call() {
        let (transport, mut gates) = ScriptedTransport::gated(1);
        let (dispatcher, _store, _refresh) = dispatcher(transport);
        let dispatcher = Arc::new(dispatcher);

        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.kill_process(1, false).await })
        };

        // Wait until the call is parked on the gate.
        while !dispatcher.kill_in_flight() {
            tokio::task::yield_now().await;
        }

        gates.pop().unwrap().send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!dispatcher.kill_in_flight());
    }

    #[tokio::test]
    async fn test_concurrent_kills_resolve_independently() {
        let mut transport = ScriptedTransport::default();
        transport.fail_pids.insert(2);
        let (dispatcher, _store, _refresh) = dispatcher(Arc::new(transport));
        let dispatcher = Arc::new(dispatcher);

        let ok = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.kill_process(1, false).await })
        };
        let failing = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.kill_process(2, true).await })
        };

        assert!(ok.await.unwrap().is_ok());
        let err = failing.await.unwrap().unwrap_err();
        assert!(format!("{err}").contains("no such pid 2"));
    }

    #[tokio::test]
    async fn test_kill_all_success_clears_view_immediately() {
        let (transport, _) = ScriptedTransport::gated(0);
        let (dispatcher, store, _refresh) = dispatcher(transport);
        store.apply_push(demo_snapshot(&[1, 2])).await;

        dispatcher.kill_all_processes(true).await.unwrap();

        // Empty before any subsequent poll arrives.
        assert!(store.current_view().await.is_empty());
        assert!(!dispatcher.kill_all_in_flight());
    }

    #[tokio::test]
    async fn test_kill_all_failure_keeps_precall_view() {
        let transport = ScriptedTransport {
            fail_kill_all: true,
            ..Default::default()
        };
        let (dispatcher, store, _refresh) = dispatcher(Arc::new(transport));
        store.apply_push(demo_snapshot(&[1, 2])).await;

        let err = dispatcher.kill_all_processes(false).await.unwrap_err();
        assert!(matches!(err, ProclensError::Backend(_)));
        assert_eq!(store.process_count().await, 2);
        assert!(!dispatcher.kill_all_in_flight());
    }

    #[tokio::test]
    async fn test_duplicate_kill_all_is_refused() {
        let (transport, mut gates) = ScriptedTransport::gated(1);
        let (dispatcher, _store, _refresh) = dispatcher(transport);
        let dispatcher = Arc::new(dispatcher);

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.kill_all_processes(false).await })
        };

        while !dispatcher.kill_all_in_flight() {
            tokio::task::yield_now().await;
        }

        let err = dispatcher.kill_all_processes(false).await.unwrap_err();
        assert!(matches!(err, ProclensError::CommandInFlight("kill-all")));

        gates.pop().unwrap().send(()).unwrap();
        first.await.unwrap().unwrap();

        // Once resolved, a new kill-all is accepted again.
        assert!(dispatcher.kill_all_processes(false).await.is_ok());
    }

    #[tokio::test]
    async fn test_pause_and_resume_invalidate_on_success() {
        let (transport, _) = ScriptedTransport::gated(0);
        let (dispatcher, _store, refresh) = dispatcher(transport);

        dispatcher.pause_process(1).await.unwrap();
        timeout(Duration::from_millis(50), refresh.wait())
            .await
            .expect("pause should request a refetch");

        dispatcher.resume_process(1).await.unwrap();
        timeout(Duration::from_millis(50), refresh.wait())
            .await
            .expect("resume should request a refetch");
    }

    #[tokio::test]
    async fn test_project_kill_invalidates_without_clearing() {
        let (transport, _) = ScriptedTransport::gated(0);
        let (dispatcher, store, refresh) = dispatcher(transport);
        store.apply_push(demo_snapshot(&[1])).await;

        dispatcher
            .kill_project_processes("demo", false)
            .await
            .unwrap();
        assert_eq!(store.process_count().await, 1);
        timeout(Duration::from_millis(50), refresh.wait())
            .await
            .expect("project kill should request a refetch");
    }
}
