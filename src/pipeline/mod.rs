use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, KeyRegistry};
use crate::guardrail::{Guardrail, Verdict};
use crate::llm::{ModelClient, UpstreamError};
use crate::storage::{UsageRecord, UsageStore};


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    pub tier: String,
    pub reply: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Question is required")]
    BadInput,
    #[error("{0}")]
    Unauthorized(AuthError),
    #[error("{0}")]
    Throttled(AuthError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::BadInput => 400,
            PipelineError::Unauthorized(_) => 401,
            PipelineError::Throttled(_) => 429,
            PipelineError::Upstream(_) => 500,
        }
    }
}

impl From<AuthError> for PipelineError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::QuotaExceeded { .. } => PipelineError::Throttled(err),
            AuthError::MissingApiKey | AuthError::InvalidApiKey => PipelineError::Unauthorized(err),
        }
    }
}

/// Admission, guardrail, upstream call and logging for one question.
pub struct RequestPipeline {
    registry: Arc<KeyRegistry>,
    guardrail: Arc<Guardrail>,
    model: Arc<dyn ModelClient>,
    usage: Arc<dyn UsageStore>,
}

impl RequestPipeline {
    pub fn new(
        registry: Arc<KeyRegistry>,
        guardrail: Arc<Guardrail>,
        model: Arc<dyn ModelClient>,
        usage: Arc<dyn UsageStore>,
    ) -> Self {
        Self {
            registry,
            guardrail,
            model,
            usage,
        }
    }

    pub fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    pub async fn handle(
        &self,
        api_key: Option<&str>,
        question: Option<&str>,
    ) -> Result<AskResponse, PipelineError> {
        let request_id = Uuid::new_v4();

        let question = match question {
            Some(q) if !q.trim().is_empty() => q,
            _ => {
                warn!(%request_id, "Rejected request without a question");
                return Err(PipelineError::BadInput);
            }
        };

        let key = self.registry.validate(api_key).map_err(|e| {
            warn!(%request_id, "Rejected request: {}", e);
            PipelineError::from(e)
        })?;

        let admitted = self.registry.admit(&key.key).map_err(|e| {
            warn!(%request_id, tier = %key.tier, "Rejected request: {}", e);
            PipelineError::from(e)
        })?;
        let tier = admitted.tier.to_string();
        info!(
            %request_id,
            %tier,
            used = admitted.used,
            remaining = ?admitted.remaining(),
            "Admitted request"
        );

        let reply = match self.guardrail.classify(question) {
            Verdict::Intercepted(reply) => {
                info!(%request_id, "Guardrail intercepted question");
                reply
            }
            Verdict::PassThrough => match self.model.ask(question).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(%request_id, "Upstream model failed: {}", e);
                    return Err(e.into());
                }
            },
        };

        self.usage
            .append(UsageRecord::new(&admitted.key, &tier, question, &reply.text));

        Ok(AskResponse {
            tier,
            reply: reply.text,
        })
    }
}
