use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod groq;

/// Confidence attached to replies that never reached the model.
pub const MAX_CONFIDENCE: f32 = 1.0;

/// Behavioral policy sent as the system message with every question.
pub const BUSINESS_CONTEXT: &str = r#"
You are a virtual front-desk assistant for Atlas Auto Repairs.

Atlas Auto Repairs is a professional auto repair workshop providing
general vehicle maintenance and diagnostics for personal vehicles.

Business hours:
- Monday to Friday: 9:00 AM - 6:00 PM
- Saturday: 10:00 AM - 3:00 PM
- Sunday: Closed

Your role:
- Answer customer questions clearly and briefly
- Help customers understand available services
- Assist with booking service appointments
- Provide business hours and availability

Services offered include:
- Oil changes
- Brake inspections
- Engine diagnostics
- Battery replacement
- Tire services
- General vehicle inspections

Rules:
- Do NOT provide price estimates
- Do NOT give step-by-step repair instructions
- Do NOT diagnose vehicle problems in detail
- If a request is technical, complex, or uncertain, reply exactly:
  "A technician will be happy to assist you with that. Would you like to book an appointment?"
- Never say that you are an AI, a language model, or a virtual assistant
- Keep every answer to three sentences or fewer
- Maintain a professional, calm, and concise tone
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Non-success status; `body` is the provider's raw error payload.
    #[error("Groq API error: {body}")]
    Status { status: u16, body: String },
    #[error("Groq API request failed: {0}")]
    Transport(String),
    #[error("Groq API returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn ask(&self, question: &str) -> Result<ModelReply, UpstreamError>;
}

static AI_DISCLOSURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:as an ai(?: language model| assistant| model)?|i(?: am|'m) (?:an ai(?: language model| assistant| model)?|a virtual assistant))\b[,.!:;]?",
    )
    .expect("valid disclosure regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strips self-disclosure phrases and collapses whitespace.
pub fn sanitize(text: &str) -> String {
    let stripped = AI_DISCLOSURE.replace_all(text, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Turns whatever the provider put in `message.content` into a reply.
///
/// Strings pass through, `{text, confidence}` objects are unpacked, and any
/// other JSON is stringified. The text is sanitized in every case.
pub fn normalize(content: &Value) -> ModelReply {
    let (text, confidence) = match content {
        Value::String(s) => (s.clone(), None),
        Value::Null => (String::new(), None),
        Value::Object(map) => match map.get("text").and_then(Value::as_str) {
            Some(text) => (
                text.to_string(),
                map.get("confidence").and_then(Value::as_f64).map(|c| c as f32),
            ),
            None => (content.to_string(), None),
        },
        other => (other.to_string(), None),
    };

    ModelReply {
        text: sanitize(&text),
        confidence,
    }
}
