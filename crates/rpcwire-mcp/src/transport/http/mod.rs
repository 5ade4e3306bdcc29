//! Streaming HTTP transport - N workers sharing one listening socket.
//!
//! Each worker is an OS thread running its own current-thread tokio runtime,
//! its own [`WorkerRuntime`] and its own axum server over a clone of the
//! listener. Workers share nothing but the handler registry.

pub mod routes;
pub mod runtime;
pub mod session;
pub mod sse;
pub mod stats;

use std::future::Future;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::config::HttpConfig;
use crate::protocol::HandlerRegistry;
use crate::types::{InitOptions, McpError, McpResult};

use super::TransportDriver;

pub use runtime::{WorkerRuntime, WorkerState, PRIMARY_WORKER};
pub use session::{SessionTable, SESSION_HEADER};
pub use sse::{ConnectionHandle, SseFrame, SseHub, SseStream};
pub use stats::{Counters, StatsSnapshot};

/// Multi-worker HTTP driver.
#[derive(Debug, Clone)]
pub struct HttpDriver {
    config: HttpConfig,
}

#[async_trait]
impl TransportDriver for HttpDriver {
    async fn run(self: Box<Self>, registry: Arc<HandlerRegistry>, init: InitOptions) -> McpResult<()> {
        let listener = self.bind()?;
        self.serve(listener, registry, init, ctrl_c()).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl HttpDriver {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Bind the configured address. Failure here is fatal for the process.
    pub fn bind(&self) -> McpResult<StdTcpListener> {
        let listener = StdTcpListener::bind(&self.config.addr).map_err(|e| {
            McpError::Transport(format!("failed to bind {}: {e}", self.config.addr))
        })?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    /// Run every worker on `listener` until `shutdown` resolves or a worker
    /// fails, then stop all of them and wait for their threads.
    pub async fn serve<F>(
        &self,
        listener: StdTcpListener,
        registry: Arc<HandlerRegistry>,
        init: InitOptions,
        shutdown: F,
    ) -> McpResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.config.validate()?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let (stop_tx, _) = watch::channel(false);
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let mut threads: Vec<JoinHandle<()>> = Vec::with_capacity(self.config.workers);

        for index in 0..self.config.workers {
            let worker = Worker {
                runtime: WorkerRuntime::new(index, self.config.clone(), registry.clone(), init.clone()),
                listener: listener.try_clone()?,
                stop: stop_tx.subscribe(),
            };
            let exit_tx = exit_tx.clone();
            let thread = std::thread::Builder::new()
                .name(format!("rpcwire-worker-{index}"))
                .spawn(move || {
                    let result = worker.run();
                    let _ = exit_tx.send((index, result));
                })?;
            threads.push(thread);
        }
        drop(exit_tx);

        tracing::info!(
            "HTTP transport listening on {addr} ({} worker{})",
            self.config.workers,
            if self.config.workers == 1 { "" } else { "s" }
        );

        let mut first_error = None;
        let mut exited = 0;
        tokio::select! {
            _ = shutdown => tracing::info!("Shutdown requested"),
            Some((index, result)) = exit_rx.recv() => {
                exited += 1;
                match result {
                    Ok(()) => tracing::warn!(worker = index, "worker exited early"),
                    Err(e) => {
                        tracing::error!(worker = index, "worker failed: {e}");
                        first_error = Some(e);
                    }
                }
            }
        }

        stop_tx.send_replace(true);

        while exited < threads.len() {
            let Some((index, result)) = exit_rx.recv().await else {
                break;
            };
            exited += 1;
            if let Err(e) = result {
                tracing::error!(worker = index, "worker failed: {e}");
                first_error.get_or_insert(e);
            }
        }

        let joined = tokio::task::spawn_blocking(move || {
            threads
                .into_iter()
                .map(JoinHandle::join)
                .filter(Result::is_err)
                .count()
        })
        .await
        .map_err(|e| McpError::Transport(e.to_string()))?;
        if joined > 0 {
            tracing::error!(panicked = joined, "worker threads panicked");
        }

        tracing::info!("HTTP transport stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Everything one worker thread owns.
struct Worker {
    runtime: Arc<WorkerRuntime>,
    listener: StdTcpListener,
    stop: watch::Receiver<bool>,
}

impl Worker {
    fn run(self) -> McpResult<()> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.serve())
    }

    async fn serve(self) -> McpResult<()> {
        let index = self.runtime.index();
        let listener = tokio::net::TcpListener::from_std(self.listener)?;
        self.runtime.on_worker_start(index)?;

        let runtime = self.runtime.clone();
        let mut stop = self.stop;
        tokio::spawn(async move {
            let _ = stop.wait_for(|stopped| *stopped).await;
            runtime.on_worker_stop(index);
        });

        let app = routes::router(self.runtime.clone());
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(self.runtime.shutdown_signal())
            .await;

        self.runtime.on_worker_stop(index);
        served.map_err(|e| McpError::Transport(e.to_string()))
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        futures::future::pending::<()>().await;
    }
}
