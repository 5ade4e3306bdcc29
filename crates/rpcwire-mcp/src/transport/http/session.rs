//! Per-worker session table keyed by the `Mcp-Session-Id` header.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Header carrying the session id on requests and replies.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Sessions idle for longer than this are dropped the next time a new
/// session is created on the same worker.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Session slots per allowed SSE connection.
pub const SESSIONS_PER_CONNECTION: usize = 4;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    last_active: Instant,
}

/// Sessions known to one worker.
///
/// New sessions are admitted up to `limit`; past that the least recently
/// active session without an open stream is evicted.
#[derive(Debug)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, Session>>,
    limit: usize,
}

impl SessionTable {
    pub fn new(limit: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limit: limit.max(1),
        }
    }

    /// Table sized for a worker accepting `max_connections` SSE streams.
    pub fn for_connections(max_connections: usize) -> Self {
        Self::new(max_connections.saturating_mul(SESSIONS_PER_CONNECTION))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up or create the session for a request.
    ///
    /// Returns the id to echo back and whether this worker had not seen it
    /// before. A missing or blank id mints a fresh UUID; an id minted by
    /// another worker is adopted as-is. Creating a session first drops
    /// sessions idle past `idle_timeout`, then evicts the stalest one if the
    /// table is full. Sessions for which `keep` holds are never dropped.
    pub fn touch(
        &self,
        session_id: Option<&str>,
        idle_timeout: Duration,
        keep: impl Fn(&str) -> bool,
    ) -> (String, bool) {
        let id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let now = Instant::now();
        let mut sessions = self.lock();
        if let Some(session) = sessions.get_mut(&id) {
            session.last_active = now;
            return (id, false);
        }

        let before = sessions.len();
        sessions.retain(|sid, session| now - session.last_active < idle_timeout || keep(sid));
        let expired = before - sessions.len();

        if sessions.len() >= self.limit {
            let stalest = sessions
                .iter()
                .filter(|(sid, _)| !keep(sid))
                .min_by_key(|(_, session)| session.last_active)
                .map(|(sid, _)| sid.clone());
            if let Some(stalest) = stalest {
                sessions.remove(&stalest);
                tracing::debug!(session_id = %stalest, "session table full, evicted");
            }
        }

        sessions.insert(
            id.clone(),
            Session {
                session_id: id.clone(),
                created_at: Utc::now(),
                last_active: now,
            },
        );
        tracing::debug!(session_id = %id, expired, "session created");
        (id, true)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(table: &SessionTable, id: Option<&str>) -> (String, bool) {
        table.touch(id, SESSION_IDLE_TIMEOUT, |_| false)
    }

    #[test]
    fn test_mint_and_reuse() {
        let table = SessionTable::new(8);
        let (id, created) = touch(&table, None);
        assert!(created);
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let (again, created) = touch(&table, Some(&id));
        assert_eq!(again, id);
        assert!(!created);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_foreign_id_is_adopted() {
        let table = SessionTable::new(8);
        let (id, created) = touch(&table, Some("from-another-worker"));
        assert_eq!(id, "from-another-worker");
        assert!(created);
        assert!(table.contains("from-another-worker"));
    }

    #[test]
    fn test_blank_id_mints() {
        let table = SessionTable::new(8);
        let (id, _) = touch(&table, Some("  "));
        assert!(!id.trim().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire_on_new_session() {
        let table = SessionTable::new(8);
        let timeout = Duration::from_secs(60);
        let keep = |id: &str| id == "streaming";
        table.touch(Some("idle"), timeout, keep);
        table.touch(Some("streaming"), timeout, keep);

        tokio::time::advance(Duration::from_secs(61)).await;
        table.touch(Some("fresh"), timeout, keep);

        assert!(!table.contains("idle"));
        assert!(table.contains("streaming"));
        assert!(table.contains("fresh"));
        assert_eq!(table.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotating_ids_stay_bounded() {
        let table = SessionTable::new(3);
        let keep = |id: &str| id == "streaming";
        table.touch(Some("streaming"), SESSION_IDLE_TIMEOUT, keep);

        for n in 0..50 {
            tokio::time::advance(Duration::from_millis(10)).await;
            table.touch(Some(format!("rotated-{n}").as_str()), SESSION_IDLE_TIMEOUT, keep);
        }

        assert_eq!(table.len(), 3);
        assert!(table.contains("streaming"));
        assert!(table.contains("rotated-49"));
        assert!(table.contains("rotated-48"));
        assert!(!table.contains("rotated-0"));
    }

    #[test]
    fn test_limit_scales_with_connections() {
        let table = SessionTable::for_connections(2);
        for n in 0..20 {
            touch(&table, Some(format!("s{n}").as_str()));
        }
        assert_eq!(table.len(), 2 * SESSIONS_PER_CONNECTION);
    }
}
