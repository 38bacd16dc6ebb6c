//! Remote generator: drives a [`Provider`] under a per-call deadline.
//!
//! Any provider failure or timeout is logged and turned into a degraded
//! result; callers never see an error from here.

use async_trait::async_trait;
use pmassist_core::error::ProviderError;
use pmassist_core::generation::{GenerationOptions, GenerationResult, Generator};
use pmassist_core::provider::{Message, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Text returned in place of an answer when the backend fails.
pub const APOLOGY: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

/// Confidence reported for a successful backend answer.
pub const REMOTE_CONFIDENCE: f32 = 0.95;

pub struct RemoteGenerator {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl RemoteGenerator {
    pub fn new(provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// The per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn degraded(
        options: &GenerationOptions,
        started: Instant,
        error: &ProviderError,
    ) -> GenerationResult {
        GenerationResult {
            content: APOLOGY.to_string(),
            token_count: 0,
            model_id: options.model.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            confidence: 0.0,
            degraded: true,
            error: Some(error.to_string()),
        }
    }
}

/// The user-role content actually sent: the assembled prompt, followed by an
/// `Additional Context:` block of `key: value` lines when facts are present.
pub fn compose_user_content(
    user_content: &str,
    extra_context: &serde_json::Map<String, serde_json::Value>,
) -> String {
    if extra_context.is_empty() {
        return user_content.to_string();
    }
    let mut out = format!("{user_content}\n\nAdditional Context:");
    for (key, value) in extra_context {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push('\n');
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&rendered);
    }
    out
}

#[async_trait]
impl Generator for RemoteGenerator {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(&self, user_content: &str, options: &GenerationOptions) -> GenerationResult {
        let started = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options
            .system_instructions
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(compose_user_content(
            user_content,
            &options.extra_context,
        )));

        let request = ProviderRequest {
            model: options.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: Some(options.max_tokens),
        };

        let outcome = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}s",
                self.provider.name(),
                self.timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(response) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                let token_count = response.usage.map(|u| u.total_tokens).unwrap_or(0);
                info!(
                    provider = %self.provider.name(),
                    model = %response.model,
                    tokens = token_count,
                    latency_ms,
                    "Generation complete"
                );
                GenerationResult {
                    content: response.content,
                    token_count,
                    model_id: if response.model.is_empty() {
                        options.model.clone()
                    } else {
                        response.model
                    },
                    latency_ms,
                    confidence: REMOTE_CONFIDENCE,
                    degraded: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    provider = %self.provider.name(),
                    error = %e,
                    "Generation failed, returning degraded answer"
                );
                Self::degraded(options, started, &e)
            }
        }
    }
}
