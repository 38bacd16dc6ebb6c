//! Offline generator: deterministic canned answers when no backend key is
//! configured.

use async_trait::async_trait;
use pmassist_core::generation::{question_segment, GenerationOptions, GenerationResult, Generator};
use std::time::Instant;

pub const OFFLINE_MODEL: &str = "mock";
pub const OFFLINE_CONFIDENCE: f32 = 0.5;

pub const TASK_ANSWER: &str = "I can help you with task management. Currently, I'm running in mock mode. When OpenAI is configured, I'll provide detailed insights about your tasks.";
pub const PROJECT_ANSWER: &str = "Based on your project data, I can see you're working on several projects. Would you like more details about a specific project?";
pub const RISK_ANSWER: &str = "Risk analysis is a key feature. Once OpenAI is configured, I'll analyze your projects for potential risks and delays.";
pub const GENERIC_ANSWER: &str = "I'm here to help you manage your projects. I'm currently running in mock mode. Please configure an API key to enable full AI capabilities.";

/// Keyword groups checked in order; the first group with a hit wins.
const RULES: [(&[&str], &str); 3] = [
    (&["task", "todo"], TASK_ANSWER),
    (&["project", "status"], PROJECT_ANSWER),
    (&["risk", "delay"], RISK_ANSWER),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGenerator;

impl OfflineGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Pick the canned answer for `user_content`, matching only its question.
    pub fn answer_for(user_content: &str) -> &'static str {
        let question = question_segment(user_content).to_lowercase();
        RULES
            .iter()
            .find(|(words, _)| words.iter().any(|w| question.contains(w)))
            .map(|(_, answer)| *answer)
            .unwrap_or(GENERIC_ANSWER)
    }
}

#[async_trait]
impl Generator for OfflineGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, user_content: &str, _options: &GenerationOptions) -> GenerationResult {
        let started = Instant::now();
        GenerationResult {
            content: Self::answer_for(user_content).to_string(),
            token_count: 0,
            model_id: OFFLINE_MODEL.to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            confidence: OFFLINE_CONFIDENCE,
            degraded: false,
            error: None,
        }
    }
}
