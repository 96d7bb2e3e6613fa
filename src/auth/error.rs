use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingApiKey,
    InvalidApiKey,
    QuotaExceeded { tier: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Absent and unknown keys look the same to callers.
            AuthError::MissingApiKey | AuthError::InvalidApiKey => write!(f, "Invalid API key"),
            AuthError::QuotaExceeded { tier } => {
                write!(f, "Request limit reached for {} tier", tier)
            }
        }
    }
}

impl std::error::Error for AuthError {}
