//! Process-local store

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{EventSink, ReportStore};
use crate::error::StorageError;
use crate::types::{now_millis, EventRecord, NewEvent, NewReport, UserReport};

#[derive(Debug, Default)]
struct Tables {
    events: Vec<EventRecord>,
    reports: Vec<UserReport>,
}

/// In-memory implementation of [`EventSink`] and [`ReportStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored events, oldest first
    pub fn events(&self) -> Vec<EventRecord> {
        self.tables.read().events.clone()
    }

    /// Number of stored events
    pub fn event_count(&self) -> usize {
        self.tables.read().events.len()
    }
}

#[async_trait]
impl EventSink for MemoryStore {
    async fn insert_events(&self, events: &[NewEvent]) -> Result<usize, StorageError> {
        let created_at = now_millis();
        let mut tables = self.tables.write();
        for event in events {
            let id = tables.events.len() as i64 + 1;
            tables.events.push(EventRecord {
                id,
                service: event.service.clone(),
                state: event.state.clone(),
                status: event.status,
                message: event.message.clone(),
                created_at,
            });
        }
        Ok(events.len())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: &NewReport) -> Result<UserReport, StorageError> {
        let mut tables = self.tables.write();
        let stored = UserReport {
            id: tables.reports.len() as i64 + 1,
            reference: report.reference.clone(),
            fingerprint: report.fingerprint.clone(),
            created_at: now_millis(),
        };
        tables.reports.push(stored.clone());
        Ok(stored)
    }

    async fn reports_since(&self, since_ms: i64) -> Result<Vec<UserReport>, StorageError> {
        Ok(self
            .tables
            .read()
            .reports
            .iter()
            .filter(|r| r.created_at >= since_ms)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(service: &str) -> NewEvent {
        NewEvent {
            service: service.to_string(),
            state: "Down".to_string(),
            status: None,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_recent_events_newest_first() {
        let store = MemoryStore::new();
        store
            .insert_events(&[event("A"), event("B"), event("C")])
            .await
            .unwrap();

        let recent = store.recent_events(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].service, "C");
        assert_eq!(recent[1].service, "B");
        assert_eq!(store.event_count(), 3);
    }

    #[tokio::test]
    async fn test_reports_since() {
        let store = MemoryStore::new();
        let report = NewReport {
            reference: "h2pc".to_string(),
            fingerprint: "abc".to_string(),
        };
        let stored = store.insert_report(&report).await.unwrap();
        assert_eq!(stored.id, 1);

        assert_eq!(store.reports_since(0).await.unwrap().len(), 1);
        assert!(store
            .reports_since(stored.created_at + 1)
            .await
            .unwrap()
            .is_empty());
    }
}
