//! Interaction log: one row per generation call, successful or not.
//!
//! Sessions hold what the caller sees. The log holds what was sent to the
//! backend and how the call went, including the failure behind a degraded
//! answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::generation::GenerationResult;
use crate::ids::{InteractionId, ProjectId, SessionId, TenantId, UserId};
use crate::store::TenantScoped;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionStatus {
    Success,
    Error,
}

impl InteractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Self::Success),
            "Error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!(
                "unknown interaction status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    pub id: InteractionId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// The session the answer was stored as. Cleared if that session is
    /// deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// User-role content handed to the generator.
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub token_count: u32,
    pub response_time_ms: u64,
    pub status: InteractionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InteractionLog {
    /// Log entry for one generation. Degraded results are recorded as
    /// [`InteractionStatus::Error`] with the backend failure attached.
    pub fn from_generation(
        tenant_id: TenantId,
        user_id: UserId,
        prompt: impl Into<String>,
        result: &GenerationResult,
    ) -> Self {
        let status = if result.degraded {
            InteractionStatus::Error
        } else {
            InteractionStatus::Success
        };
        Self {
            id: InteractionId::new(),
            tenant_id,
            user_id,
            project_id: None,
            session_id: None,
            prompt: prompt.into(),
            response: result.content.clone(),
            model: result.model_id.clone(),
            token_count: result.token_count,
            response_time_ms: result.latency_ms,
            status,
            error_message: result.error.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

impl TenantScoped for InteractionLog {
    type Id = InteractionId;
    const KIND: &'static str = "Interaction log";

    fn id(&self) -> InteractionId {
        self.id
    }
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(degraded: bool) -> GenerationResult {
        GenerationResult {
            content: "answer".into(),
            token_count: 12,
            model_id: "gpt-4".into(),
            latency_ms: 30,
            confidence: if degraded { 0.0 } else { 0.95 },
            degraded,
            error: degraded.then(|| "Network error: refused".to_string()),
        }
    }

    #[test]
    fn success_has_no_error() {
        let log = InteractionLog::from_generation(TenantId::new(), UserId::new(), "p", &result(false));
        assert_eq!(log.status, InteractionStatus::Success);
        assert_eq!(log.error_message, None);
        assert_eq!(log.token_count, 12);
        assert_eq!(log.response_time_ms, 30);
    }

    #[test]
    fn degraded_is_error_with_message() {
        let log = InteractionLog::from_generation(TenantId::new(), UserId::new(), "p", &result(true));
        assert_eq!(log.status, InteractionStatus::Error);
        assert_eq!(log.error_message.as_deref(), Some("Network error: refused"));
    }

    #[test]
    fn status_parses_its_own_output() {
        for status in [InteractionStatus::Success, InteractionStatus::Error] {
            assert_eq!(status.as_str().parse::<InteractionStatus>().unwrap(), status);
        }
        assert!("Pending".parse::<InteractionStatus>().is_err());
    }
}
