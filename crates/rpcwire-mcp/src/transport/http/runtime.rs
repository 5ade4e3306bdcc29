//! Per-worker runtime: lifecycle, timers, SSE fan-out and stats.
//!
//! Every worker thread owns exactly one [`WorkerRuntime`]. Nothing in here is
//! shared across workers; worker 0 is the primary and is the only one that
//! arms the heartbeat and stats timers.

use std::cell::OnceCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::HttpConfig;
use crate::protocol::{HandlerRegistry, ProtocolHandler};
use crate::types::{InitOptions, McpError, McpResult};

use super::session::{SessionTable, SESSION_IDLE_TIMEOUT};
use super::sse::{ConnectionHandle, SseHub, SseStream};
use super::stats::{Counters, SseFigures, StatsSnapshot};

/// Index of the worker that owns the timers.
pub const PRIMARY_WORKER: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerState::Stopped => "stopped",
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Default)]
struct Timers {
    heartbeat: Option<JoinHandle<()>>,
    stats: Option<JoinHandle<()>>,
}

pub struct WorkerRuntime {
    index: usize,
    config: HttpConfig,
    handler: ProtocolHandler,
    counters: Counters,
    sessions: SessionTable,
    hub: Option<Arc<SseHub>>,
    state: Mutex<WorkerState>,
    timers: Mutex<Timers>,
    heartbeat_ticks: AtomicU64,
    stats_ticks: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for WorkerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRuntime")
            .field("index", &self.index)
            .field("state", &self.state())
            .field("sse_enabled", &self.hub.is_some())
            .finish_non_exhaustive()
    }
}

impl WorkerRuntime {
    pub fn new(
        index: usize,
        config: HttpConfig,
        registry: Arc<HandlerRegistry>,
        init: InitOptions,
    ) -> Arc<Self> {
        let hub = config
            .sse_enabled
            .then(|| Arc::new(SseHub::new(config.max_connections)));
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            index,
            handler: ProtocolHandler::new(registry, init),
            counters: Counters::new(),
            sessions: SessionTable::for_connections(config.max_connections),
            hub,
            state: Mutex::new(WorkerState::Stopped),
            timers: Mutex::new(Timers::default()),
            heartbeat_ticks: AtomicU64::new(0),
            stats_ticks: AtomicU64::new(0),
            shutdown,
            config,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_primary(&self) -> bool {
        self.index == PRIMARY_WORKER
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn handler(&self) -> &ProtocolHandler {
        &self.handler
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn sse_hub(&self) -> Option<&Arc<SseHub>> {
        self.hub.as_ref()
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    fn set_state(&self, state: WorkerState) {
        *lock(&self.state) = state;
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Lifecycle hook run when this worker's event loop comes up.
    pub fn on_worker_start(self: &Arc<Self>, worker_index: usize) -> McpResult<()> {
        if worker_index != self.index {
            return Err(McpError::InvalidState(format!(
                "worker {} received start hook for worker {worker_index}",
                self.index
            )));
        }
        tracing::info!(worker = self.index, primary = self.is_primary(), "worker started");
        self.start()
    }

    /// Lifecycle hook run when this worker is asked to shut down.
    pub fn on_worker_stop(&self, worker_index: usize) {
        if worker_index != self.index {
            tracing::warn!(
                worker = self.index,
                "ignoring stop hook addressed to worker {worker_index}"
            );
            return;
        }
        self.stop();
    }

    /// `Stopped -> Starting -> Running`. The primary arms both timers.
    pub fn start(self: &Arc<Self>) -> McpResult<()> {
        {
            let mut state = lock(&self.state);
            if *state != WorkerState::Stopped {
                return Err(McpError::InvalidState(format!(
                    "cannot start worker {} while {}",
                    self.index, *state
                )));
            }
            *state = WorkerState::Starting;
        }
        self.shutdown.send_replace(false);

        if self.is_primary() {
            self.start_heartbeat_timer();
            self.start_stats_timer();
        }

        self.set_state(WorkerState::Running);
        tracing::debug!(worker = self.index, "worker running");
        Ok(())
    }

    /// `Running -> Stopping -> Stopped`. Clears timers, closes SSE
    /// connections and signals the HTTP server to drain. Calling it again
    /// once stopped does nothing.
    pub fn stop(&self) -> bool {
        {
            let mut state = lock(&self.state);
            match *state {
                WorkerState::Stopped | WorkerState::Stopping => return false,
                WorkerState::Starting | WorkerState::Running => *state = WorkerState::Stopping,
            }
        }

        self.clear_timers();
        if let Some(hub) = &self.hub {
            let closed = hub.close_all();
            if closed > 0 {
                tracing::info!(worker = self.index, closed, "closed SSE connections");
            }
        }
        self.shutdown.send_replace(true);

        self.set_state(WorkerState::Stopped);
        tracing::info!(worker = self.index, "worker stopped");
        true
    }

    /// Resolves once [`WorkerRuntime::stop`] has run.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }

    // -- Timers ------------------------------------------------------------

    /// Arm the heartbeat timer. Returns false if it was already armed.
    pub fn start_heartbeat_timer(self: &Arc<Self>) -> bool {
        let mut timers = lock(&self.timers);
        if timers.heartbeat.is_some() {
            return false;
        }
        let period = self.config.heartbeat_interval;
        timers.heartbeat = Some(spawn_periodic(Arc::downgrade(self), period, Self::heartbeat_tick));
        tracing::debug!(worker = self.index, period_secs = period.as_secs(), "heartbeat timer armed");
        true
    }

    /// Arm the stats timer. Returns false if it was already armed.
    pub fn start_stats_timer(self: &Arc<Self>) -> bool {
        let mut timers = lock(&self.timers);
        if timers.stats.is_some() {
            return false;
        }
        let period = self.config.stats_interval;
        timers.stats = Some(spawn_periodic(Arc::downgrade(self), period, Self::stats_tick));
        tracing::debug!(worker = self.index, period_secs = period.as_secs(), "stats timer armed");
        true
    }

    fn clear_timers(&self) {
        let mut timers = lock(&self.timers);
        if let Some(task) = timers.heartbeat.take() {
            task.abort();
            tracing::debug!(worker = self.index, "heartbeat timer cleared");
        }
        if let Some(task) = timers.stats.take() {
            task.abort();
            tracing::debug!(worker = self.index, "stats timer cleared");
        }
    }

    pub fn timers_armed(&self) -> bool {
        let timers = lock(&self.timers);
        timers.heartbeat.is_some() || timers.stats.is_some()
    }

    pub fn heartbeat_ticks(&self) -> u64 {
        self.heartbeat_ticks.load(Ordering::Relaxed)
    }

    pub fn stats_ticks(&self) -> u64 {
        self.stats_ticks.load(Ordering::Relaxed)
    }

    fn heartbeat_tick(&self) {
        self.heartbeat_ticks.fetch_add(1, Ordering::Relaxed);
        if let Some(hub) = &self.hub {
            let pruned = hub.flush();
            tracing::trace!(
                worker = self.index,
                connections = hub.connection_count(),
                pruned,
                "heartbeat"
            );
        }
    }

    fn stats_tick(&self) {
        self.stats_ticks.fetch_add(1, Ordering::Relaxed);
        if !self.config.stats_enabled {
            return;
        }
        let stats = self.get_stats();
        tracing::info!(
            worker = self.index,
            uptime_seconds = stats.uptime_seconds,
            requests_total = stats.requests_total,
            requests_per_second = stats.requests_per_second,
            sse_connections_active = ?stats.sse_connections_active,
            sse_sessions_active = ?stats.sse_sessions_active,
            "stats"
        );
    }

    // -- Requests and sessions ---------------------------------------------

    /// Resolve the session for a request. Creating a session sweeps idle
    /// ones and caps the table; sessions with an open stream are kept.
    pub fn touch_session(&self, session_id: Option<&str>) -> String {
        let streaming = OnceCell::new();
        let (id, _) = self.sessions.touch(session_id, SESSION_IDLE_TIMEOUT, |sid| {
            streaming
                .get_or_init(|| self.hub.as_ref().map(|hub| hub.session_ids()).unwrap_or_default())
                .contains(sid)
        });
        id
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    // -- SSE ---------------------------------------------------------------

    /// Open an SSE stream for a session. `None` when SSE is disabled or the
    /// connection limit is reached; see [`WorkerRuntime::sse_enabled`].
    pub fn open_stream(&self, session_id: &str) -> Option<SseStream> {
        self.hub.as_ref()?.subscribe(session_id)
    }

    pub fn sse_enabled(&self) -> bool {
        self.hub.is_some()
    }

    pub fn broadcast(&self, data: &str, event_id: Option<&str>) -> usize {
        match &self.hub {
            Some(hub) => hub.broadcast(data, event_id),
            None => 0,
        }
    }

    pub fn send_to_session(&self, session_id: &str, data: &str, event_id: Option<&str>) -> usize {
        match &self.hub {
            Some(hub) => hub.send_to_session(session_id, data, event_id),
            None => 0,
        }
    }

    /// Release whatever SSE subscription belongs to a dropped connection.
    pub fn on_connection_closed(&self, handle: ConnectionHandle) -> bool {
        self.hub.as_ref().is_some_and(|hub| hub.close(handle))
    }

    // -- Stats -------------------------------------------------------------

    pub fn get_stats(&self) -> StatsSnapshot {
        let sse = self.hub.as_ref().map(|hub| SseFigures {
            connections_active: hub.connection_count(),
            sessions_active: hub.session_count(),
            max_connections: hub.max_connections(),
        });
        self.counters.snapshot(sse)
    }
}

impl Drop for WorkerRuntime {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(|e| e.into_inner());
        for task in [timers.heartbeat.take(), timers.stats.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Run `tick` every `period`, first after one full period. The task ends on
/// its own once the runtime is gone.
fn spawn_periodic(
    runtime: Weak<WorkerRuntime>,
    period: Duration,
    tick: fn(&WorkerRuntime),
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(runtime) = runtime.upgrade() else {
                break;
            };
            tick(&runtime);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::http::session::SESSIONS_PER_CONNECTION;

    fn runtime(index: usize, config: HttpConfig) -> Arc<WorkerRuntime> {
        let registry = Arc::new(HandlerRegistry::builder().build());
        WorkerRuntime::new(index, config, registry, InitOptions::default())
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let rt = runtime(1, HttpConfig::default());
        rt.start().unwrap();
        assert_eq!(rt.state(), WorkerState::Running);
        assert!(matches!(rt.start(), Err(McpError::InvalidState(_))));
        rt.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let rt = runtime(0, HttpConfig::default());
        rt.start().unwrap();
        assert!(rt.timers_armed());

        assert!(rt.stop());
        assert!(!rt.timers_armed());
        assert!(!rt.stop());
        assert_eq!(rt.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_only_primary_arms_timers() {
        let primary = runtime(0, HttpConfig::default());
        let secondary = runtime(3, HttpConfig::default());
        primary.on_worker_start(0).unwrap();
        secondary.on_worker_start(3).unwrap();

        assert!(primary.timers_armed());
        assert!(!secondary.timers_armed());

        primary.on_worker_stop(0);
        secondary.on_worker_stop(3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotating_session_ids_are_capped() {
        let config = HttpConfig {
            max_connections: 1,
            ..HttpConfig::default()
        };
        let rt = runtime(0, config);
        let held = rt.touch_session(Some("held"));
        let _stream = rt.open_stream(&held).unwrap();

        for n in 0..40 {
            tokio::time::advance(Duration::from_millis(5)).await;
            rt.touch_session(Some(format!("rotated-{n}").as_str()));
        }

        assert_eq!(rt.sessions().len(), SESSIONS_PER_CONNECTION);
        assert!(rt.sessions().contains("held"));
        assert!(rt.sessions().contains("rotated-39"));
    }

    #[tokio::test]
    async fn test_mismatched_start_hook() {
        let rt = runtime(2, HttpConfig::default());
        assert!(rt.on_worker_start(0).is_err());
        assert_eq!(rt.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_timer_arming_is_single_shot() {
        let rt = runtime(0, HttpConfig::default());
        assert!(rt.start_heartbeat_timer());
        assert!(!rt.start_heartbeat_timer());
        rt.clear_timers();
        assert!(!rt.timers_armed());
    }

    #[tokio::test]
    async fn test_sse_disabled_is_noop() {
        let config = HttpConfig {
            sse_enabled: false,
            ..HttpConfig::default()
        };
        let rt = runtime(0, config);
        assert_eq!(rt.broadcast("x", None), 0);
        assert_eq!(rt.send_to_session("s", "x", None), 0);
        assert!(rt.open_stream("s").is_none());
        assert!(rt.get_stats().sse_connections_active.is_none());
    }

    #[tokio::test]
    async fn test_stop_signals_shutdown() {
        let rt = runtime(0, HttpConfig::default());
        rt.start().unwrap();
        let signal = rt.shutdown_signal();
        rt.stop();
        tokio::time::timeout(Duration::from_secs(1), signal).await.unwrap();
    }
}
