use serde::{Deserialize, Serialize};
use std::fmt;

/// Quota class attached to an API key, e.g. `free` or `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(String);

impl Tier {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn free() -> Self {
        Self::new("free")
    }

    pub fn paid() -> Self {
        Self::new("paid")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of a key as loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub key: String,
    pub tier: Tier,
    /// `None` means unlimited.
    #[serde(default)]
    pub limit: Option<u64>,
}

impl ApiKeyRecord {
    pub fn new(key: impl Into<String>, tier: Tier, limit: Option<u64>) -> Self {
        Self {
            key: key.into(),
            tier,
            limit,
        }
    }
}

/// Point-in-time view of a key and its counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySnapshot {
    pub key: String,
    pub tier: Tier,
    pub limit: Option<u64>,
    pub used: u64,
}

impl KeySnapshot {
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }
}
