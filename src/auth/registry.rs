use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::error::AuthError;
use super::types::{ApiKeyRecord, KeySnapshot, Tier};

struct KeyEntry {
    tier: Tier,
    limit: Option<u64>,
    used: AtomicU64,
}

impl KeyEntry {
    fn snapshot(&self, key: &str, used: u64) -> KeySnapshot {
        KeySnapshot {
            key: key.to_string(),
            tier: self.tier.clone(),
            limit: self.limit,
            used,
        }
    }
}

/// In-memory table of valid API keys and their daily usage.
///
/// The key set is fixed once built. Each counter is updated with its own
/// compare-and-swap, so admissions on different keys never contend.
pub struct KeyRegistry {
    keys: HashMap<String, KeyEntry>,
}

impl KeyRegistry {
    pub fn new(records: Vec<ApiKeyRecord>) -> Result<Self> {
        let mut keys = HashMap::with_capacity(records.len());
        for record in records {
            if record.key.is_empty() {
                anyhow::bail!("API key must not be empty");
            }
            let entry = KeyEntry {
                tier: record.tier,
                limit: record.limit,
                used: AtomicU64::new(0),
            };
            if keys.insert(record.key.clone(), entry).is_some() {
                anyhow::bail!("Duplicate API key: {}", record.key);
            }
        }
        Ok(Self { keys })
    }

    /// The two keys the demo front desk ships with.
    pub fn demo() -> Self {
        let mut keys = HashMap::new();
        keys.insert(
            "atlas-demo-key".to_string(),
            KeyEntry { tier: Tier::free(), limit: Some(50), used: AtomicU64::new(0) },
        );
        keys.insert(
            "atlas-paid-key".to_string(),
            KeyEntry { tier: Tier::paid(), limit: Some(500), used: AtomicU64::new(0) },
        );
        Self { keys }
    }

    /// Loads keys from a JSON array of `{ "key", "tier", "limit"? }` objects.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading API keys from {}", path.display());
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        let records: Vec<ApiKeyRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse key file {}", path.display()))?;
        Self::new(records)
    }

    pub fn validate(&self, api_key: Option<&str>) -> Result<KeySnapshot, AuthError> {
        let api_key = match api_key {
            Some(k) if !k.is_empty() => k,
            _ => return Err(AuthError::MissingApiKey),
        };
        let entry = self.keys.get(api_key).ok_or(AuthError::InvalidApiKey)?;
        Ok(entry.snapshot(api_key, entry.used.load(Ordering::Acquire)))
    }

    /// Consumes one request from the key's quota.
    ///
    /// Returns the snapshot after the increment. A key already at its limit
    /// is rejected and its counter is left untouched.
    pub fn admit(&self, api_key: &str) -> Result<KeySnapshot, AuthError> {
        let entry = self.keys.get(api_key).ok_or(AuthError::InvalidApiKey)?;
        let limit = entry.limit;

        let previous = entry
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| match limit {
                Some(limit) if used >= limit => None,
                _ => Some(used.saturating_add(1)),
            })
            .map_err(|_| AuthError::QuotaExceeded {
                tier: entry.tier.to_string(),
            })?;

        debug!("Admitted request for {} tier ({} used)", entry.tier, previous + 1);
        Ok(entry.snapshot(api_key, previous + 1))
    }

    pub fn reset_all(&self) {
        for entry in self.keys.values() {
            entry.used.store(0, Ordering::Release);
        }
    }

    pub fn snapshot(&self) -> Vec<KeySnapshot> {
        let mut all: Vec<KeySnapshot> = self
            .keys
            .iter()
            .map(|(key, entry)| entry.snapshot(key, entry.used.load(Ordering::Acquire)))
            .collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
