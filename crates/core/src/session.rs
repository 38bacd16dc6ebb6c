//! Conversation sessions: one question and its answer, optionally threaded
//! under an earlier session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::ids::{ProjectId, SessionId, TenantId, UserId};
use crate::store::TenantScoped;

/// What kind of record a [`Source`] points at.
///
/// Serialized as a bare tag. Unrecognised tags are kept verbatim so a
/// rewritten session stores the same list it read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    Project,
    Task,
    Other(String),
}

impl SourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Project => "Project",
            Self::Task => "Task",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for SourceKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Project" => Self::Project,
            "Task" => Self::Task,
            _ => Self::Other(tag),
        }
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// A record the answer may have drawn on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Source {
    pub fn project(id: ProjectId, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: SourceKind::Project,
            id: id.as_uuid(),
            name: name.into(),
            description,
        }
    }

    pub fn task(id: crate::ids::TaskId, title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: SourceKind::Task,
            id: id.as_uuid(),
            name: title.into(),
            description,
        }
    }
}

/// Encode sources for a storage column.
pub fn encode_sources(sources: &[Source]) -> String {
    serde_json::to_string(sources).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a stored source list. A corrupt value degrades to an empty list.
pub fn decode_sources(raw: &str) -> Vec<Source> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(sources) => sources,
        Err(e) => {
            warn!(error = %e, "Discarding unreadable session sources");
            Vec::new()
        }
    }
}

/// One persisted question/answer exchange.
///
/// Immutable once written. `parent_session_id` is a weak reference: the
/// parent may be deleted later and readers must tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub question: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<SessionId>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub token_count: u32,
    #[serde(default)]
    pub response_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ConversationSession {
    /// A fresh unanswered session; the pipeline fills in the answer fields.
    pub fn new(tenant_id: TenantId, user_id: UserId, question: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            tenant_id,
            user_id,
            project_id: None,
            question: question.into(),
            response: None,
            parent_session_id: None,
            confidence: None,
            sources: Vec::new(),
            model: None,
            token_count: 0,
            response_time_ms: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_parent(mut self, parent: Option<SessionId>) -> Self {
        self.parent_session_id = parent;
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Root sessions start a thread; follow-ups don't.
    pub fn is_root(&self) -> bool {
        self.parent_session_id.is_none()
    }

    pub fn is_owned_by(&self, tenant_id: TenantId, user_id: UserId) -> bool {
        self.tenant_id == tenant_id && self.user_id == user_id
    }
}

impl TenantScoped for ConversationSession {
    type Id = SessionId;
    const KIND: &'static str = "Chat session";

    fn id(&self) -> SessionId {
        self.id
    }
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
