//! Debounce/Backoff Gate
//!
//! Turns a stream of health observations into rate-limited event writes.
//! Each logical key moves through the following states:
//!
//! ```text
//!  Quiet ──first event──▶ Armed ──next event──▶ Locked ──ttl──▶ Armed (history)
//!    ▲                    counter=1             counter=N          │
//!    │                    no write              one write          │ next event
//!    │                                                             ▼
//!    └──────────── all-clear ◀────────────────────────────── Locked (N+1)
//! ```
//!
//! A single blip is never written. The second one confirms the trend: the
//! events are persisted once and further observations are dropped for
//! `counter * multiplier * lockout_unit`. The counter survives lockout expiry,
//! so a source that keeps flapping gets longer and longer quiet periods until
//! an all-clear resets it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::cache::{CacheValue, TransientCache};
use crate::error::Result;
use crate::storage::EventSink;
use crate::types::{HealthObservation, NewEvent};

pub mod keys;

pub use keys::{GateKeys, KeyTable, HITMAN_AUTHENTICATION, HITMAN_FORUM, HITMAN_SERVICES};

// ============================================================================
// Configuration
// ============================================================================

/// Tuning for the lockout computation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Base unit of a lockout window
    #[serde(with = "duration_secs")]
    pub lockout_unit: Duration,

    /// Multiplier applied once a counter has history
    pub escalation_multiplier: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            lockout_unit: Duration::from_secs(60),
            escalation_multiplier: 2,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// Outcome of a single gate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Unknown logical key or a classification that is not an event
    Ignored,
    /// First observation with no history, noted but not written
    Isolated,
    /// Events were handed to the sink and a lockout window opened
    Persisted {
        /// Counter value after this call
        counter: u32,
        /// Multiplier used for the lockout
        multiplier: u32,
        /// Length of the lockout window
        lockout: Duration,
        /// Events written, 0 if the write failed
        written: usize,
    },
    /// A lockout window is active, the observation was dropped
    Locked,
    /// The aggregate check found nothing to report and state was reset
    AllClear,
}

/// Debounce state of a logical key as currently held in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    /// Occurrence counter, `None` when quiet
    pub counter: Option<u32>,
    /// Whether a lockout window is active
    pub locked: bool,
}

impl DebounceState {
    /// True when no state is held for the key
    pub fn is_quiet(&self) -> bool {
        self.counter.is_none() && !self.locked
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
struct GateCounters {
    isolated: AtomicU64,
    persisted: AtomicU64,
    locked: AtomicU64,
    ignored: AtomicU64,
    all_clear: AtomicU64,
    write_failures: AtomicU64,
    cache_failures: AtomicU64,
}

/// Snapshot of gate activity since startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Isolated observations suppressed
    pub isolated: u64,
    /// Lockout windows opened
    pub persisted: u64,
    /// Observations dropped inside a lockout window
    pub locked: u64,
    /// Observations ignored
    pub ignored: u64,
    /// All-clear resets
    pub all_clear: u64,
    /// Failed durable writes
    pub write_failures: u64,
    /// Calls failed by the cache
    pub cache_failures: u64,
}

// ============================================================================
// Gate
// ============================================================================

struct KeySlot {
    keys: GateKeys,
    // Serializes the read-modify-write on this key's cache entries
    lock: Mutex<()>,
}

/// Rate-limits event persistence per logical key
pub struct DebounceGate {
    config: GateConfig,
    slots: HashMap<String, KeySlot>,
    cache: Arc<dyn TransientCache>,
    sink: Arc<dyn EventSink>,
    counters: GateCounters,
}

impl DebounceGate {
    /// Create a gate over a validated key table
    pub fn new(
        config: GateConfig,
        keys: KeyTable,
        cache: Arc<dyn TransientCache>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let slots = keys
            .iter()
            .map(|(logical, keys)| {
                (
                    logical.to_string(),
                    KeySlot {
                        keys: keys.clone(),
                        lock: Mutex::new(()),
                    },
                )
            })
            .collect();

        Self {
            config,
            slots,
            cache,
            sink,
            counters: GateCounters::default(),
        }
    }

    /// Create a gate with the default configuration and key table
    pub fn with_defaults(cache: Arc<dyn TransientCache>, sink: Arc<dyn EventSink>) -> Self {
        Self::new(GateConfig::default(), KeyTable::standard(), cache, sink)
    }

    /// Gate configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Submit a single observation for a logical key.
    ///
    /// Unknown keys and classifications without a display label are ignored.
    /// Persistence failures are logged and swallowed; cache failures fail the
    /// call.
    pub async fn submit(&self, key: &str, observation: &HealthObservation) -> Result<GateDecision> {
        let Some(slot) = self.slots.get(key) else {
            tracing::trace!(key, "Unrecognized gate key, observation ignored");
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(GateDecision::Ignored);
        };

        let Some(event) = observation.to_new_event() else {
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(GateDecision::Ignored);
        };

        tracing::debug!(
            key,
            source = %observation.source,
            state = %event.state,
            "Submission request initiated"
        );

        self.admit(key, slot, vec![event]).await
    }

    /// Submit one polling cycle of the multi-service aggregate check.
    ///
    /// All qualifying observations share the aggregate key's gate decision and
    /// are written as one batch. A cycle with no qualifying observation runs
    /// the all-clear path.
    pub async fn submit_aggregate(
        &self,
        key: &str,
        observations: &[HealthObservation],
    ) -> Result<GateDecision> {
        let Some(slot) = self.slots.get(key) else {
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(GateDecision::Ignored);
        };

        let events: Vec<NewEvent> = observations
            .iter()
            .filter_map(HealthObservation::to_new_event)
            .collect();

        if events.is_empty() {
            tracing::debug!(key, "No events to process, all services operate without issue");
            self.clear_slot(key, slot).await?;
            return Ok(GateDecision::AllClear);
        }

        tracing::debug!(key, events = events.len(), "Submission request initiated");

        self.admit(key, slot, events).await
    }

    /// Reset a key to the quiet state, returning whether any state was held
    pub async fn all_clear(&self, key: &str) -> Result<bool> {
        match self.slots.get(key) {
            Some(slot) => self.clear_slot(key, slot).await,
            None => Ok(false),
        }
    }

    /// Current debounce state of a key, `None` for unknown keys
    pub async fn state(&self, key: &str) -> Result<Option<DebounceState>> {
        let Some(slot) = self.slots.get(key) else {
            return Ok(None);
        };
        let counter = self.cache.get_counter(&slot.keys.counter_key).await?;
        let locked = self.cache.contains(&slot.keys.lockout_key).await?;
        Ok(Some(DebounceState { counter, locked }))
    }

    /// Activity counters since startup
    pub fn stats(&self) -> GateStats {
        let c = &self.counters;
        GateStats {
            isolated: c.isolated.load(Ordering::Relaxed),
            persisted: c.persisted.load(Ordering::Relaxed),
            locked: c.locked.load(Ordering::Relaxed),
            ignored: c.ignored.load(Ordering::Relaxed),
            all_clear: c.all_clear.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
            cache_failures: c.cache_failures.load(Ordering::Relaxed),
        }
    }

    async fn clear_slot(&self, key: &str, slot: &KeySlot) -> Result<bool> {
        let _guard = slot.lock.lock().await;
        let mut removed = false;
        for cache_key in [&slot.keys.counter_key, &slot.keys.lockout_key] {
            match self.cache.remove(cache_key).await {
                Ok(existed) => {
                    if existed {
                        tracing::debug!(key, cache_key = %cache_key, "Removing cache entry");
                    }
                    removed |= existed;
                }
                Err(e) => {
                    self.counters.cache_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(key, error = %e, "Cache failure while clearing gate state");
                    return Err(e.into());
                }
            }
        }
        self.counters.all_clear.fetch_add(1, Ordering::Relaxed);
        Ok(removed)
    }

    async fn admit(&self, key: &str, slot: &KeySlot, events: Vec<NewEvent>) -> Result<GateDecision> {
        let _guard = slot.lock.lock().await;

        let transition = match self.transition(key, &slot.keys).await {
            Ok(transition) => transition,
            Err(e) => {
                self.counters.cache_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(key, error = %e, "Cache failure, submission aborted");
                return Err(e);
            }
        };

        let (counter, multiplier, lockout) = match transition {
            Transition::Locked => {
                self.counters.locked.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "Database is locked by a delay, no events submitted");
                return Ok(GateDecision::Locked);
            }
            Transition::Isolated => {
                self.counters.isolated.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "Isolated event, waiting for the next one");
                return Ok(GateDecision::Isolated);
            }
            Transition::Open {
                counter,
                multiplier,
                lockout,
            } => (counter, multiplier, lockout),
        };

        // Best effort: losing a record is preferable to losing the lockout
        let written = match self.sink.insert_events(&events).await {
            Ok(written) => {
                tracing::debug!(key, written, "Event(s) added in the database");
                written
            }
            Err(e) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(key, error = %e, "Database insert failed, lockout kept");
                0
            }
        };

        self.counters.persisted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            key,
            delay_secs = lockout.as_secs(),
            counter,
            multiplier,
            "Lock database submissions"
        );

        Ok(GateDecision::Persisted {
            counter,
            multiplier,
            lockout,
            written,
        })
    }

    /// Apply the cache side of a submission. Caller holds the key lock.
    async fn transition(&self, key: &str, keys: &GateKeys) -> Result<Transition> {
        if self.cache.contains(&keys.lockout_key).await? {
            return Ok(Transition::Locked);
        }

        let Some(previous) = self.cache.get_counter(&keys.counter_key).await? else {
            self.cache
                .set(&keys.counter_key, CacheValue::Counter(1))
                .await?;
            return Ok(Transition::Isolated);
        };

        let counter = previous.saturating_add(1);
        let multiplier = self.config.escalation_multiplier;
        let lockout = self
            .config
            .lockout_unit
            .saturating_mul(counter.saturating_mul(multiplier));

        self.cache
            .set_with_ttl(&keys.lockout_key, CacheValue::Marker, lockout)
            .await?;

        if let Err(e) = self
            .cache
            .set(&keys.counter_key, CacheValue::Counter(counter))
            .await
        {
            // Keep the pair consistent: no lockout without its counter bump
            if let Err(rollback) = self.cache.remove(&keys.lockout_key).await {
                tracing::warn!(key, error = %rollback, "Failed to roll back lockout marker");
            }
            return Err(e.into());
        }

        Ok(Transition::Open {
            counter,
            multiplier,
            lockout,
        })
    }
}

enum Transition {
    Locked,
    Isolated,
    Open {
        counter: u32,
        multiplier: u32,
        lockout: Duration,
    },
}

// ============================================================================
// Tests
// ============================================================================
