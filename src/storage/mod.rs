//! Durable storage for accepted events and user reports
//!
//! The gate and the report service only see the [`EventSink`] and
//! [`ReportStore`] traits. Two backends are provided:
//!
//! - [`SqliteStore`]: file-backed, used by the server
//! - [`MemoryStore`]: process-local, used in tests and for dry runs

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{EventRecord, NewEvent, NewReport, UserReport};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Sink for events accepted by the debounce gate
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persist a batch of events atomically, returning how many were written
    async fn insert_events(&self, events: &[NewEvent]) -> Result<usize, StorageError>;

    /// Most recent events, newest first
    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError>;
}

/// Store for visitor outage reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a report
    async fn insert_report(&self, report: &NewReport) -> Result<UserReport, StorageError>;

    /// Reports created at or after `since_ms`, oldest first
    async fn reports_since(&self, since_ms: i64) -> Result<Vec<UserReport>, StorageError>;
}
