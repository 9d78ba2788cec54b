//! SQLite-backed store
//!
//! The connection lives behind a mutex and every statement runs on the
//! blocking pool so async callers never stall a runtime worker.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::{EventSink, ReportStore};
use crate::error::StorageError;
use crate::types::{now_millis, EventRecord, NewEvent, NewReport, UserReport};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  service TEXT NOT NULL,
  state TEXT NOT NULL,
  status INTEGER,
  message TEXT,
  created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);

CREATE TABLE IF NOT EXISTS user_reports (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  reference TEXT NOT NULL,
  fingerprint TEXT NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_user_reports_created_at ON user_reports(created_at);
";

/// SQLite implementation of [`EventSink`] and [`ReportStore`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn run<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    let status: Option<i64> = row.get(3)?;
    Ok(EventRecord {
        id: row.get(0)?,
        service: row.get(1)?,
        state: row.get(2)?,
        status: status.and_then(|s| u16::try_from(s).ok()),
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserReport> {
    Ok(UserReport {
        id: row.get(0)?,
        reference: row.get(1)?,
        fingerprint: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[async_trait]
impl EventSink for SqliteStore {
    async fn insert_events(&self, events: &[NewEvent]) -> Result<usize, StorageError> {
        let events = events.to_vec();
        self.run(move |conn| {
            let created_at = now_millis();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO events (service, state, status, message, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for event in &events {
                    stmt.execute(params![
                        event.service,
                        event.state,
                        event.status.map(i64::from),
                        event.message,
                        created_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(events.len())
        })
        .await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, service, state, status, message, created_at
                 FROM events ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_event)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn insert_report(&self, report: &NewReport) -> Result<UserReport, StorageError> {
        let report = report.clone();
        self.run(move |conn| {
            let created_at = now_millis();
            conn.execute(
                "INSERT INTO user_reports (reference, fingerprint, created_at) VALUES (?1, ?2, ?3)",
                params![report.reference, report.fingerprint, created_at],
            )?;
            Ok(UserReport {
                id: conn.last_insert_rowid(),
                reference: report.reference,
                fingerprint: report.fingerprint,
                created_at,
            })
        })
        .await
    }

    async fn reports_since(&self, since_ms: i64) -> Result<Vec<UserReport>, StorageError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, reference, fingerprint, created_at
                 FROM user_reports WHERE created_at >= ?1 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![since_ms], row_to_report)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("events.db")).unwrap();
        (temp_dir, store)
    }

    fn event(service: &str, status: Option<u16>) -> NewEvent {
        NewEvent {
            service: service.to_string(),
            state: "Down".to_string(),
            status,
            message: Some("timeout".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_events() {
        let (_temp_dir, store) = create_test_store();

        let written = store
            .insert_events(&[event("HITMAN PC", None), event("HITMAN FORUM", Some(503))])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let recent = store.recent_events(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].service, "HITMAN FORUM");
        assert_eq!(recent[0].status, Some(503));
        assert_eq!(recent[1].status, None);
        assert_eq!(recent[1].message.as_deref(), Some("timeout"));
        assert!(recent[0].created_at > 0);

        assert_eq!(store.recent_events(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_events_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_events(&[event("A", None)]).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let events = store.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].service, "A");
    }

    #[tokio::test]
    async fn test_reports() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stored = store
            .insert_report(&NewReport {
                reference: "h1ps".to_string(),
                fingerprint: "f00".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(stored.reference, "h1ps");

        let reports = store.reports_since(0).await.unwrap();
        assert_eq!(reports, vec![stored]);
    }
}
