use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::llm::{ModelReply, MAX_CONFIDENCE};

/// Phrases that route a question to a technician instead of the model.
pub const DEFAULT_TERMS: [&str; 15] = [
    "price", "cost", "how much", "quote", "estimate",
    "fix", "repair myself", "diy", "step by step",
    "diagnose", "what's wrong", "why is my car", "engine noise", "check engine", "warning light",
];

pub const DEFLECTION_REPLY: &str =
    "A technician will be happy to assist you with that. Would you like to book an appointment?";

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Intercepted(ModelReply),
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct Guardrail {
    terms: Vec<String>,
    deflection: String,
}

impl Default for Guardrail {
    fn default() -> Self {
        Self::new(DEFAULT_TERMS.iter().copied(), DEFLECTION_REPLY)
    }
}

impl Guardrail {
    pub fn new<I, S>(terms: I, deflection: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            terms,
            deflection: deflection.into(),
        }
    }

    /// Reads one term per line; blank lines and `#` comments are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read guardrail terms from {}", path.display()))?;
        let terms = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        Ok(Self::new(terms, DEFLECTION_REPLY))
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn classify(&self, question: &str) -> Verdict {
        let question = question.to_lowercase();
        match self.terms.iter().find(|term| question.contains(term.as_str())) {
            Some(term) => {
                debug!("Guardrail matched term {:?}", term);
                Verdict::Intercepted(ModelReply {
                    text: self.deflection.clone(),
                    confidence: Some(MAX_CONFIDENCE),
                })
            }
            None => Verdict::PassThrough,
        }
    }
}
