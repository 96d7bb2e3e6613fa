pub mod csv;
pub mod usage_log;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub use usage_log::CsvUsageLog;

pub const USAGE_LOG_HEADER: &str = "timestamp,apiKey,tier,question,reply\n";

/// One completed exchange, flattened for the log.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub api_key: String,
    pub tier: String,
    pub question: String,
    pub reply: String,
}

impl UsageRecord {
    pub fn new(api_key: &str, tier: &str, question: &str, reply: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            api_key: api_key.to_string(),
            tier: tier.to_string(),
            question: question.to_string(),
            reply: reply.to_string(),
        }
    }

    pub fn to_csv_row(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        csv::encode_row(&[
            &timestamp,
            &self.api_key,
            &self.tier,
            &self.question,
            &self.reply,
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub counts_by_tier: BTreeMap<String, u64>,
}

#[async_trait]
pub trait UsageStore: Send + Sync + 'static {
    /// Queues a record for writing. Never fails the caller.
    fn append(&self, record: UsageRecord);

    /// Waits until every record queued before this call has been written.
    async fn flush(&self);

    async fn summarize(&self) -> Result<UsageSummary>;
}
