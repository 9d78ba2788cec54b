//! User Reports
//!
//! Players can flag a service they have trouble with. Each browser
//! fingerprint may report a given service once per cooldown window; the
//! cooldown is a TTL marker in the transient cache. Stored reports are
//! aggregated per hour for the dashboard chart.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::cache::{CacheValue, TransientCache};
use crate::health::{catalog, CATALOG};
use crate::storage::ReportStore;
use crate::types::{NewReport, UserReport};

const HOUR_MS: i64 = 3_600_000;

/// Result of a report submission, shown to the user as a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum ReportOutcome {
    /// Report stored
    Success(String),
    /// Not stored, the fingerprint already reported this service recently
    Info(String),
    /// Rejected or failed
    Error(String),
}

/// Hourly report counts for the chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartData {
    /// Hour labels, oldest first
    pub categories: Vec<String>,
    /// One series per service
    pub series: Vec<ChartSeries>,
}

/// Report counts of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSeries {
    /// Service display name
    pub name: String,
    /// Count per hour, aligned with [`ChartData::categories`]
    pub data: Vec<u32>,
}

/// Accepts user reports and serves their aggregation
pub struct ReportService {
    cache: Arc<dyn TransientCache>,
    store: Arc<dyn ReportStore>,
    cooldown: Duration,
    /// Serializes the cooldown check with the cooldown write
    submissions: Mutex<()>,
}

impl ReportService {
    /// Create a service with the given per-fingerprint cooldown
    pub fn new(
        cache: Arc<dyn TransientCache>,
        store: Arc<dyn ReportStore>,
        cooldown: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            cooldown,
            submissions: Mutex::new(()),
        }
    }

    /// Submit a report for the service `reference`
    pub async fn submit(&self, reference: &str, fingerprint: &str) -> ReportOutcome {
        let Some(entry) = catalog::by_reference(reference) else {
            return ReportOutcome::Error("Unknown service".to_string());
        };
        let fingerprint = fingerprint.trim();
        if fingerprint.is_empty() {
            return ReportOutcome::Error("Missing fingerprint".to_string());
        }

        let cooldown_key = format!("report:{reference}:{fingerprint}");
        let _guard = self.submissions.lock().await;
        match self.cache.contains(&cooldown_key).await {
            Ok(true) => {
                return ReportOutcome::Info("You already reported this service recently".to_string())
            }
            Ok(false) => {}
            // The cooldown is anti-abuse only; accept the report without it
            Err(e) => tracing::warn!(error = %e, "Report cooldown lookup failed"),
        }

        let report = NewReport {
            reference: reference.to_string(),
            fingerprint: fingerprint.to_string(),
        };
        if let Err(e) = self.store.insert_report(&report).await {
            tracing::error!(reference, error = %e, "Failed to store user report");
            return ReportOutcome::Error("Your report could not be saved".to_string());
        }

        if let Err(e) = self
            .cache
            .set_with_ttl(&cooldown_key, CacheValue::Marker, self.cooldown)
            .await
        {
            tracing::warn!(error = %e, "Failed to set report cooldown");
        }

        tracing::info!(reference, service = entry.name, "User report saved");
        ReportOutcome::Success(format!("Your report has been saved. Platform : {}", entry.name))
    }

    /// Hourly report counts over the last `hours` hours, ending at `now_ms`
    pub async fn chart(&self, now_ms: i64, hours: u32) -> crate::error::Result<ChartData> {
        let since = window_start(now_ms, hours);
        let reports = self.store.reports_since(since).await?;
        Ok(build_chart(&reports, now_ms, hours))
    }
}

fn window_start(now_ms: i64, hours: u32) -> i64 {
    let current_hour = now_ms.div_euclid(HOUR_MS) * HOUR_MS;
    current_hour - i64::from(hours.saturating_sub(1)) * HOUR_MS
}

/// Bucket reports per catalog service and UTC hour.
///
/// The last bucket is the current, partial hour. Reports outside the window
/// or for unknown references are skipped.
pub fn build_chart(reports: &[UserReport], now_ms: i64, hours: u32) -> ChartData {
    let start = window_start(now_ms, hours);
    let buckets = hours as usize;

    let categories = (0..buckets)
        .map(|i| {
            let hour = (start + i as i64 * HOUR_MS).div_euclid(HOUR_MS).rem_euclid(24);
            format!("{hour:02}:00")
        })
        .collect();

    let mut series: Vec<ChartSeries> = CATALOG
        .iter()
        .map(|entry| ChartSeries {
            name: entry.name.to_string(),
            data: vec![0; buckets],
        })
        .collect();

    for report in reports {
        if report.created_at < start || report.created_at > now_ms {
            continue;
        }
        let Some(index) = CATALOG.iter().position(|e| e.reference == report.reference) else {
            continue;
        };
        let bucket = ((report.created_at - start) / HOUR_MS) as usize;
        if let Some(count) = series[index].data.get_mut(bucket) {
            *count += 1;
        }
    }

    ChartData { categories, series }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::StorageError;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl ReportStore for BrokenStore {
        async fn insert_report(&self, _report: &NewReport) -> Result<UserReport, StorageError> {
            Err(StorageError::Task("disk full".to_string()))
        }

        async fn reports_since(&self, _since_ms: i64) -> Result<Vec<UserReport>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn service(store: Arc<dyn ReportStore>) -> (Arc<MemoryCache>, ReportService) {
        let cache = Arc::new(MemoryCache::new());
        let service = ReportService::new(cache.clone(), store, Duration::from_secs(1800));
        (cache, service)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_per_fingerprint() {
        let (_cache, reports) = service(Arc::new(MemoryStore::new()));

        assert!(matches!(reports.submit("h2pc", "abc").await, ReportOutcome::Success(_)));
        assert!(matches!(reports.submit("h2pc", "abc").await, ReportOutcome::Info(_)));
        // Other service or other fingerprint is independent
        assert!(matches!(reports.submit("h1pc", "abc").await, ReportOutcome::Success(_)));
        assert!(matches!(reports.submit("h2pc", "def").await, ReportOutcome::Success(_)));

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(matches!(reports.submit("h2pc", "abc").await, ReportOutcome::Success(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_saved_once() {
        let store = Arc::new(MemoryStore::new());
        let (_cache, reports) = service(store.clone());
        let reports = Arc::new(reports);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let reports = reports.clone();
                tokio::spawn(async move { reports.submit("h2pc", "abc").await })
            })
            .collect();

        let mut saved = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ReportOutcome::Success(_)) {
                saved += 1;
            }
        }

        assert_eq!(saved, 1);
        assert_eq!(store.reports_since(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let (_cache, reports) = service(Arc::new(MemoryStore::new()));
        assert!(matches!(reports.submit("h3pc", "abc").await, ReportOutcome::Error(_)));
        assert!(matches!(reports.submit("h2pc", "  ").await, ReportOutcome::Error(_)));
    }

    #[tokio::test]
    async fn test_failed_store_sets_no_cooldown() {
        let (cache, reports) = service(Arc::new(BrokenStore));
        assert!(matches!(reports.submit("h2pc", "abc").await, ReportOutcome::Error(_)));
        assert!(!cache.contains("report:h2pc:abc").await.unwrap());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ReportOutcome::Info("slow down".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "info", "message": "slow down"}));
    }

    #[test]
    fn test_build_chart_buckets() {
        // 1970-01-02 10:30 UTC
        let now = 34 * HOUR_MS + HOUR_MS / 2;
        let report = |reference: &str, created_at: i64| UserReport {
            id: 0,
            reference: reference.to_string(),
            fingerprint: "f".to_string(),
            created_at,
        };
        let reports = vec![
            report("h2pc", now),
            report("h2pc", now - HOUR_MS),
            report("h2pc", now - HOUR_MS - 60_000),
            report("hmfc", 32 * HOUR_MS),
            // Outside the window
            report("h2pc", 31 * HOUR_MS),
            report("zzzz", now),
        ];

        let chart = build_chart(&reports, now, 3);
        assert_eq!(chart.categories, vec!["08:00", "09:00", "10:00"]);
        assert_eq!(chart.series.len(), CATALOG.len());

        let data = |name: &str| &chart.series.iter().find(|s| s.name == name).unwrap().data;
        assert_eq!(data("HITMAN 2 PC"), &vec![0, 2, 1]);
        assert_eq!(data("HITMAN FORUM"), &vec![1, 0, 0]);
        assert_eq!(data("HITMAN PC"), &vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn test_chart_reads_store() {
        let store = Arc::new(MemoryStore::new());
        let (_cache, reports) = service(store);
        reports.submit("h1ps", "abc").await;

        let chart = reports.chart(crate::types::now_millis(), 24).await.unwrap();
        assert_eq!(chart.categories.len(), 24);
        let ps4 = chart.series.iter().find(|s| s.name == "HITMAN PS4").unwrap();
        assert_eq!(ps4.data.iter().sum::<u32>(), 1);
    }
}
