//! Logical key table
//!
//! Maps each logical key the gate accepts to the pair of cache keys holding
//! its debounce state. Built once and validated at startup.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

/// Aggregate key for the multi-service game status check
pub const HITMAN_SERVICES: &str = "HITMAN SERVICES";

/// Endpoint key for the authentication service
pub const HITMAN_AUTHENTICATION: &str = "HITMAN AUTHENTICATION";

/// Endpoint key for the community forum
pub const HITMAN_FORUM: &str = "HITMAN FORUM";

/// Cache keys holding the debounce state of one logical key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateKeys {
    /// Occurrence counter, never expires on its own
    pub counter_key: String,
    /// Lockout marker, expires after the computed delay
    pub lockout_key: String,
}

impl GateKeys {
    /// Build a key pair
    pub fn new(counter_key: impl Into<String>, lockout_key: impl Into<String>) -> Self {
        Self {
            counter_key: counter_key.into(),
            lockout_key: lockout_key.into(),
        }
    }
}

/// Validated table from logical key to [`GateKeys`]
#[derive(Debug, Clone)]
pub struct KeyTable {
    entries: HashMap<String, GateKeys>,
}

impl KeyTable {
    /// Build a table, rejecting empty keys and cache keys shared between entries
    pub fn new<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, GateKeys)>,
        K: Into<String>,
    {
        let mut table = HashMap::new();
        let mut cache_keys = HashSet::new();

        for (logical, keys) in entries {
            let logical = logical.into();
            if logical.is_empty() || keys.counter_key.is_empty() || keys.lockout_key.is_empty() {
                return Err(Error::Configuration(format!(
                    "gate key table entry {logical:?} has an empty key"
                )));
            }
            for cache_key in [&keys.counter_key, &keys.lockout_key] {
                if !cache_keys.insert(cache_key.clone()) {
                    return Err(Error::Configuration(format!(
                        "cache key {cache_key:?} is used more than once"
                    )));
                }
            }
            if table.insert(logical.clone(), keys).is_some() {
                return Err(Error::Configuration(format!(
                    "logical key {logical:?} is declared twice"
                )));
            }
        }

        Ok(Self { entries: table })
    }

    /// The table used by the status pollers
    pub fn standard() -> Self {
        Self {
            entries: HashMap::from([
                (
                    HITMAN_SERVICES.to_string(),
                    GateKeys::new("hitman:entity:count", "hitman:entity:event"),
                ),
                (
                    HITMAN_AUTHENTICATION.to_string(),
                    GateKeys::new("hitman:error:count", "hitman:error:event"),
                ),
                (
                    HITMAN_FORUM.to_string(),
                    GateKeys::new("hitmanforum:error:count", "hitmanforum:error:event"),
                ),
            ]),
        }
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GateKeys)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let table = KeyTable::standard();
        let logical: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(logical.len(), 3);
        assert!(logical.contains(&HITMAN_FORUM));
        assert!(!logical.contains(&"HITMAN 3 STADIA"));

        // Standard table passes its own validation
        let rebuilt = KeyTable::new(table.iter().map(|(k, v)| (k.to_string(), v.clone())));
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn test_rejects_shared_cache_key() {
        let result = KeyTable::new([
            ("A", GateKeys::new("a:count", "shared")),
            ("B", GateKeys::new("b:count", "shared")),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_empty_key() {
        let result = KeyTable::new([("A", GateKeys::new("", "a:lock"))]);
        assert!(result.is_err());
    }
}
