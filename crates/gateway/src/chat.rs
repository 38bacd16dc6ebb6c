//! Chat API: the HTTP surface of the query pipeline.
//!
//! Endpoints (nested under `/api/chat`):
//!
//! | Method | Path | Returns |
//! |--------|------|---------|
//! | `POST` | `/query` | the stored session's answer |
//! | `GET` | `/history` | root sessions, newest first |
//! | `GET` | `/history/{id}` | one session |
//! | `GET` | `/history/{id}/follow-ups` | direct follow-ups, oldest first |
//! | `DELETE` | `/history/{id}` | 204 |
//! | `GET` | `/style-profile` | the caller's profile, created on first read |
//! | `PUT` | `/style-profile` | the patched profile |
//!
//! Every route needs a [`Principal`], installed by the gateway's principal
//! middleware. Field names are camelCase on the wire.

use axum::{
    Extension, Router,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pmassist_assistant::{HistoryQuery, QueryRequest, SessionView};
use pmassist_core::ids::{ProfileId, ProjectId, SessionId};
use pmassist_core::model::{Principal, StyleProfile, StyleProfilePatch, Tone};
use pmassist_core::session::{ConversationSession, Source};

use crate::SharedState;
use crate::error::ApiError;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the chat router. Nest this under "/api/chat".
pub fn chat_router(state: SharedState) -> Router {
    Router::new()
        .route("/query", post(submit_query_handler))
        .route("/history", get(list_history_handler))
        .route(
            "/history/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/history/{id}/follow-ups", get(list_follow_ups_handler))
        .route(
            "/style-profile",
            get(get_style_profile_handler).put(update_style_profile_handler),
        )
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQueryBody {
    pub question: String,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub parent_session_id: Option<SessionId>,
    #[serde(default = "default_true")]
    pub include_history: bool,
}

impl From<ChatQueryBody> for QueryRequest {
    fn from(body: ChatQueryBody) -> Self {
        Self {
            question: body.question,
            project_id: body.project_id,
            parent_session_id: body.parent_session_id,
            include_history: body.include_history,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseDto {
    pub session_id: SessionId,
    pub response: String,
    pub confidence: Option<f32>,
    pub sources: Vec<Source>,
    pub model: Option<String>,
    pub token_count: u32,
    pub response_time_ms: u64,
}

impl From<ConversationSession> for ChatResponseDto {
    fn from(session: ConversationSession) -> Self {
        Self {
            session_id: session.id,
            response: session.response.unwrap_or_default(),
            confidence: session.confidence,
            sources: session.sources,
            model: session.model,
            token_count: session.token_count,
            response_time_ms: session.response_time_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionDto {
    pub id: SessionId,
    pub project_id: Option<ProjectId>,
    pub project_name: Option<String>,
    pub question: String,
    pub response: Option<String>,
    pub confidence: Option<f32>,
    pub sources: Vec<Source>,
    pub parent_session_id: Option<SessionId>,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionView> for ChatSessionDto {
    fn from(view: SessionView) -> Self {
        let s = view.session;
        Self {
            id: s.id,
            project_id: s.project_id,
            project_name: view.project_name,
            question: s.question,
            response: s.response,
            confidence: s.confidence,
            sources: s.sources,
            parent_session_id: s.parent_session_id,
            model: s.model,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub project_id: Option<ProjectId>,
    pub date_from: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProfileDto {
    pub id: ProfileId,
    pub tone: Tone,
    pub prefer_bullets: bool,
    pub include_risks_by_default: bool,
    pub auto_create_tasks: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<StyleProfile> for StyleProfileDto {
    fn from(p: StyleProfile) -> Self {
        Self {
            id: p.id,
            tone: p.tone,
            prefer_bullets: p.prefer_bullets,
            include_risks_by_default: p.include_risks_by_default,
            auto_create_tasks: p.auto_create_tasks,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Tone arrives as free text so a bad value is reported as invalid input
/// rather than a body rejection.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStyleProfileBody {
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub prefer_bullets: Option<bool>,
    #[serde(default)]
    pub include_risks_by_default: Option<bool>,
    #[serde(default)]
    pub auto_create_tasks: Option<bool>,
}

impl TryFrom<UpdateStyleProfileBody> for StyleProfilePatch {
    type Error = ApiError;

    fn try_from(body: UpdateStyleProfileBody) -> Result<Self, Self::Error> {
        let tone = body.tone.as_deref().map(str::parse::<Tone>).transpose()?;
        Ok(Self {
            tone,
            prefer_bullets: body.prefer_bullets,
            include_risks_by_default: body.include_risks_by_default,
            auto_create_tasks: body.auto_create_tasks,
        })
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn submit_query_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<ChatQueryBody>, JsonRejection>,
) -> Result<Json<ChatResponseDto>, ApiError> {
    let Json(body) = body?;
    debug!(
        tenant = %principal.tenant_id,
        question_chars = body.question.chars().count(),
        "Chat query received"
    );
    let session = state
        .orchestrator
        .submit_query(principal, body.into())
        .await?;
    Ok(Json(session.into()))
}

async fn list_history_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<ChatSessionDto>>, ApiError> {
    let Query(params) = params?;
    let query = HistoryQuery {
        project_id: params.project_id,
        date_from: params.date_from,
        limit: params.limit,
    };
    let views = state.orchestrator.list_history(principal, query).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<SessionId>, PathRejection>,
) -> Result<Json<ChatSessionDto>, ApiError> {
    let Path(id) = id?;
    let view = state.orchestrator.get_session(principal, id).await?;
    Ok(Json(view.into()))
}

async fn list_follow_ups_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<SessionId>, PathRejection>,
) -> Result<Json<Vec<ChatSessionDto>>, ApiError> {
    let Path(id) = id?;
    let views = state.orchestrator.list_follow_ups(principal, id).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<SessionId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.orchestrator.delete_session(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_style_profile_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<StyleProfileDto>, ApiError> {
    let profile = state.orchestrator.get_style_profile(principal).await?;
    Ok(Json(profile.into()))
}

async fn update_style_profile_handler(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<UpdateStyleProfileBody>, JsonRejection>,
) -> Result<Json<StyleProfileDto>, ApiError> {
    let Json(body) = body?;
    let patch = StyleProfilePatch::try_from(body)?;
    let profile = state
        .orchestrator
        .update_style_profile(principal, patch)
        .await?;
    Ok(Json(profile.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_body_defaults_include_history() {
        let body: ChatQueryBody = serde_json::from_str(r#"{"question":"Status?"}"#).unwrap();
        assert!(body.include_history);
        assert!(body.project_id.is_none());

        let body: ChatQueryBody =
            serde_json::from_str(r#"{"question":"q","includeHistory":false}"#).unwrap();
        assert!(!body.include_history);
    }

    #[test]
    fn bad_tone_is_invalid_input() {
        let body = UpdateStyleProfileBody {
            tone: Some("Sarcastic".into()),
            ..Default::default()
        };
        let err = StyleProfilePatch::try_from(body).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Pipeline(pmassist_core::error::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn tone_parsed_case_insensitively() {
        let body = UpdateStyleProfileBody {
            tone: Some("technical".into()),
            prefer_bullets: Some(false),
            ..Default::default()
        };
        let patch = StyleProfilePatch::try_from(body).unwrap();
        assert_eq!(patch.tone, Some(Tone::Technical));
        assert_eq!(patch.prefer_bullets, Some(false));
        assert_eq!(patch.auto_create_tasks, None);
    }
}
