//! The generation seam used by the query pipeline.
//!
//! A [`Generator`] never fails: backend trouble is folded into a degraded
//! [`GenerationResult`] so a question always gets an answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Label that precedes the caller's question in assembled user content.
pub const QUESTION_LABEL: &str = "User Question:";

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// System-role instructions, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,
    /// Structured facts appended to the user content as `key: value` lines.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra_context: serde_json::Map<String, serde_json::Value>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4".into(),
            temperature: 0.7,
            max_tokens: 1500,
            system_instructions: None,
            extra_context: serde_json::Map::new(),
        }
    }
}

/// What a generation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub token_count: u32,
    pub model_id: String,
    pub latency_ms: u64,
    /// In [0, 1].
    pub confidence: f32,
    /// Set when the backend failed and `content` is a stand-in apology.
    #[serde(default)]
    pub degraded: bool,
    /// What went wrong, when `degraded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Short name for logs (e.g., "openai", "offline").
    fn name(&self) -> &str;

    /// Produce a completion for `user_content`.
    async fn generate(&self, user_content: &str, options: &GenerationOptions) -> GenerationResult;
}

/// The question segment of assembled user content: everything after the last
/// [`QUESTION_LABEL`], or the whole input when the label is absent.
pub fn question_segment(user_content: &str) -> &str {
    match user_content.rfind(QUESTION_LABEL) {
        Some(idx) => user_content[idx + QUESTION_LABEL.len()..].trim(),
        None => user_content.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_segment_after_label() {
        let content = "Projects:\n- Status report (Status: Active)\n\nUser Question: any risks?";
        assert_eq!(question_segment(content), "any risks?");
    }

    #[test]
    fn question_segment_without_label() {
        assert_eq!(question_segment("  hello  "), "hello");
    }

    #[test]
    fn default_options_match_service_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.model, "gpt-4");
        assert_eq!(opts.max_tokens, 1500);
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
    }
}
