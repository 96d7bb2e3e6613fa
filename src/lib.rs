pub mod auth;
pub mod guardrail;
pub mod llm;
pub mod pipeline;
pub mod schedule;
pub mod storage;
pub mod utils;
pub mod web;

use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::pipeline::RequestPipeline;
use crate::storage::UsageStore;

/// Shared state handed to every HTTP handler.
pub struct AppContext {
    pub pipeline: Arc<RequestPipeline>,
    pub usage: Arc<dyn UsageStore>,
}

pub fn init_env() {
    dotenv::dotenv().ok();
}

pub static PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
});

pub static USAGE_LOG_PATH: Lazy<String> = Lazy::new(|| {
    std::env::var("USAGE_LOG_PATH").unwrap_or_else(|_| "./usage_log.csv".to_string())
});

pub static LOG_DIR: Lazy<String> = Lazy::new(|| {
    std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string())
});

// Optional JSON key file; demo keys are used when unset.
pub static KEYS_PATH: Lazy<Option<String>> = Lazy::new(|| std::env::var("ATLAS_KEYS_PATH").ok());

pub static GUARDRAIL_TERMS_PATH: Lazy<Option<String>> =
    Lazy::new(|| std::env::var("GUARDRAIL_TERMS_PATH").ok());
