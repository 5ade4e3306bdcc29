//! Per-worker table of open SSE connections.
//!
//! Each connection is an mpsc channel whose receiving half is wrapped in an
//! [`SseStream`] and handed to the HTTP layer. Dropping that stream (client
//! went away, server shut down) releases the connection from the hub, so a
//! later broadcast never addresses a dead socket.

use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use pin_project_lite::pin_project;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

/// Frames the channel holds before new ones spill into the pending queue.
const CHANNEL_CAPACITY: usize = 64;
/// Pending frames kept per slow connection; older ones are dropped first.
const MAX_PENDING: usize = 256;

/// Identifies one open SSE connection within a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sse-{}", self.0)
    }
}

/// One outbound item on an SSE connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Event {
        event: Option<String>,
        id: Option<String>,
        data: String,
    },
    KeepAlive,
}

impl SseFrame {
    pub fn message(data: impl Into<String>, id: Option<String>) -> Self {
        SseFrame::Event {
            event: None,
            id,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        SseFrame::Event {
            event: Some(event.into()),
            id: None,
            data: data.into(),
        }
    }
}

#[derive(Debug)]
struct SseConnection {
    session_id: String,
    opened_at: DateTime<Utc>,
    sender: mpsc::Sender<SseFrame>,
    pending: VecDeque<SseFrame>,
}

impl SseConnection {
    /// Queue a frame behind any backlog. Returns false once the receiving side is gone.
    fn deliver(&mut self, frame: SseFrame) -> bool {
        if !self.drain() {
            return false;
        }
        if !self.pending.is_empty() {
            self.push_pending(frame);
            return true;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                self.push_pending(frame);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn push_pending(&mut self, frame: SseFrame) {
        if self.pending.len() == MAX_PENDING {
            self.pending.pop_front();
            tracing::warn!(session_id = %self.session_id, "SSE backlog full, dropping oldest event");
        }
        self.pending.push_back(frame);
    }

    /// Move pending frames into the channel until it fills up.
    fn drain(&mut self) -> bool {
        while let Some(frame) = self.pending.pop_front() {
            match self.sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    self.pending.push_front(frame);
                    return true;
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }
        !self.sender.is_closed()
    }

    /// Drain the backlog and send a keep-alive if caught up.
    fn flush(&mut self) -> bool {
        if !self.drain() {
            return false;
        }
        if !self.pending.is_empty() {
            return true;
        }
        !matches!(
            self.sender.try_send(SseFrame::KeepAlive),
            Err(TrySendError::Closed(_))
        )
    }
}

/// Registry of open SSE connections for one worker.
#[derive(Debug)]
pub struct SseHub {
    max_connections: usize,
    next_handle: AtomicU64,
    connections: Mutex<HashMap<ConnectionHandle, SseConnection>>,
}

impl SseHub {
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            next_handle: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, SseConnection>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Register a connection for `session_id`, or `None` at the limit.
    pub fn open(&self, session_id: &str) -> Option<(ConnectionHandle, mpsc::Receiver<SseFrame>)> {
        let mut connections = self.lock();
        if connections.len() >= self.max_connections {
            tracing::warn!(
                session_id,
                limit = self.max_connections,
                "SSE connection refused: limit reached"
            );
            return None;
        }

        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        connections.insert(
            handle,
            SseConnection {
                session_id: session_id.to_string(),
                opened_at: Utc::now(),
                sender,
                pending: VecDeque::new(),
            },
        );
        tracing::debug!(%handle, session_id, "SSE connection opened");
        Some((handle, receiver))
    }

    /// Like [`SseHub::open`], wrapping the receiver so that dropping it closes the connection.
    pub fn subscribe(self: &Arc<Self>, session_id: &str) -> Option<SseStream> {
        let (handle, receiver) = self.open(session_id)?;
        Some(SseStream {
            inner: ReceiverStream::new(receiver),
            handle,
            hub: Arc::clone(self),
        })
    }

    /// Push to every open connection. Returns the number of recipients.
    pub fn broadcast(&self, data: &str, event_id: Option<&str>) -> usize {
        self.deliver_where(data, event_id, |_| true)
    }

    /// Push to the connections of one session. Returns the number of recipients.
    pub fn send_to_session(&self, session_id: &str, data: &str, event_id: Option<&str>) -> usize {
        self.deliver_where(data, event_id, |conn| conn.session_id == session_id)
    }

    fn deliver_where(
        &self,
        data: &str,
        event_id: Option<&str>,
        filter: impl Fn(&SseConnection) -> bool,
    ) -> usize {
        let frame = SseFrame::message(data, event_id.map(str::to_string));
        let mut connections = self.lock();
        let mut delivered = 0;
        connections.retain(|handle, conn| {
            if !filter(conn) {
                return true;
            }
            if conn.deliver(frame.clone()) {
                delivered += 1;
                true
            } else {
                tracing::debug!(%handle, "dropping dead SSE connection");
                false
            }
        });
        delivered
    }

    /// Release a connection. Returns false if it was already gone.
    pub fn close(&self, handle: ConnectionHandle) -> bool {
        match self.lock().remove(&handle) {
            Some(conn) => {
                let open_for = Utc::now() - conn.opened_at;
                tracing::debug!(
                    %handle,
                    session_id = %conn.session_id,
                    open_secs = open_for.num_seconds(),
                    "SSE connection closed"
                );
                true
            }
            None => false,
        }
    }

    /// Release every connection; their streams end once drained.
    pub fn close_all(&self) -> usize {
        let mut connections = self.lock();
        let count = connections.len();
        connections.clear();
        count
    }

    /// Heartbeat: drain backlogs, send keep-alives, prune dead connections.
    /// Returns the number pruned.
    pub fn flush(&self) -> usize {
        let mut connections = self.lock();
        let before = connections.len();
        connections.retain(|_, conn| conn.flush());
        before - connections.len()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of distinct sessions with at least one open connection.
    pub fn session_count(&self) -> usize {
        self.lock()
            .values()
            .map(|conn| conn.session_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Sessions holding at least one open connection.
    pub fn session_ids(&self) -> HashSet<String> {
        self.lock()
            .values()
            .map(|conn| conn.session_id.clone())
            .collect()
    }
}

pin_project! {
    /// Receiving side of one SSE connection.
    pub struct SseStream {
        #[pin]
        inner: ReceiverStream<SseFrame>,
        handle: ConnectionHandle,
        hub: Arc<SseHub>,
    }

    impl PinnedDrop for SseStream {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if this.hub.close(*this.handle) {
                tracing::info!(handle = %this.handle, "SSE client disconnected");
            }
        }
    }
}

impl SseStream {
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }
}

impl Stream for SseStream {
    type Item = SseFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_limit_enforced() {
        let hub = SseHub::new(2);
        let _a = hub.open("s1").unwrap();
        let _b = hub.open("s2").unwrap();
        assert!(hub.open("s3").is_none());
        assert_eq!(hub.connection_count(), 2);
    }

    #[test]
    fn test_broadcast_counts_open_connections() {
        let hub = SseHub::new(10);
        let (h1, _r1) = hub.open("s1").unwrap();
        let (_h2, _r2) = hub.open("s1").unwrap();
        let (_h3, _r3) = hub.open("s2").unwrap();

        assert_eq!(hub.broadcast("hello", None), 3);
        assert_eq!(hub.session_count(), 2);

        assert!(hub.close(h1));
        assert!(!hub.close(h1));
        assert_eq!(hub.broadcast("again", Some("7")), 2);
    }

    #[test]
    fn test_send_to_session_filters() {
        let hub = SseHub::new(10);
        let (_h1, mut r1) = hub.open("s1").unwrap();
        let (_h2, mut r2) = hub.open("s2").unwrap();

        assert_eq!(hub.send_to_session("s1", "only-you", None), 1);
        assert_eq!(hub.send_to_session("nobody", "x", None), 0);
        assert_eq!(r1.try_recv().unwrap(), SseFrame::message("only-you", None));
        assert!(r2.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let hub = SseHub::new(10);
        let (_h1, r1) = hub.open("s1").unwrap();
        let (_h2, _r2) = hub.open("s2").unwrap();
        drop(r1);

        assert_eq!(hub.broadcast("x", None), 1);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_backlog_survives_until_flush() {
        let hub = SseHub::new(1);
        let (_h, mut rx) = hub.open("s").unwrap();

        for i in 0..CHANNEL_CAPACITY + 5 {
            assert_eq!(hub.broadcast(&i.to_string(), None), 1);
        }
        for _ in 0..CHANNEL_CAPACITY {
            rx.try_recv().unwrap();
        }
        assert!(rx.try_recv().is_err());

        assert_eq!(hub.flush(), 0);
        assert_eq!(rx.try_recv().unwrap(), SseFrame::message(CHANNEL_CAPACITY.to_string(), None));
    }

    #[tokio::test]
    async fn test_stream_drop_releases_connection() {
        let hub = Arc::new(SseHub::new(4));
        let mut stream = hub.subscribe("s1").unwrap();
        assert_eq!(hub.connection_count(), 1);

        hub.broadcast("ping", None);
        assert_eq!(stream.next().await, Some(SseFrame::message("ping", None)));

        drop(stream);
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.broadcast("nobody home", None), 0);
    }

    #[tokio::test]
    async fn test_close_all_ends_streams() {
        let hub = Arc::new(SseHub::new(4));
        let mut stream = hub.subscribe("s1").unwrap();
        assert_eq!(hub.close_all(), 1);
        assert_eq!(stream.next().await, None);
    }
}
