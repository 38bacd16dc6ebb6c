//! The query orchestrator: entry point for every chat operation.
//!
//! `submit_query` runs the pipeline in a fixed order:
//!
//! 1. Validate the question
//! 2. Check the user, then the project, then the parent session
//! 3. Get or create the user's style profile
//! 4. Build context and load history
//! 5. Assemble the prompt and generate
//! 6. Persist the session, then the interaction log entry
//!
//! Steps 1-2 fail before any write. Generation never fails; a backend
//! problem comes back as a degraded answer and the session is still stored.
//! The interaction log records every generation with its status and error;
//! a failure to write it is logged and does not fail the query.
//! Nothing is written until generation returns, so a cancelled call leaves
//! no session behind.

use crate::context::{ContextBuilder, HistoryMode, PromptAssembler};
use chrono::{DateTime, Utc};
use pmassist_config::{AppConfig, GenerationConfig, PromptLimits};
use pmassist_core::error::{Error, Result};
use pmassist_core::generation::{GenerationOptions, Generator};
use pmassist_core::ids::{ProjectId, SessionId};
use pmassist_core::interaction::InteractionLog;
use pmassist_core::model::{Principal, StyleProfile, StyleProfilePatch};
use pmassist_core::session::ConversationSession;
use pmassist_core::store::{SessionQuery, StorageBackend};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A question to answer.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub project_id: Option<ProjectId>,
    pub parent_session_id: Option<SessionId>,
    /// Render recent root sessions when there is no parent.
    pub include_history: bool,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            project_id: None,
            parent_session_id: None,
            include_history: true,
        }
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_parent(mut self, parent: SessionId) -> Self {
        self.parent_session_id = Some(parent);
        self
    }

    pub fn without_history(mut self) -> Self {
        self.include_history = false;
        self
    }
}

/// Filters for [`QueryOrchestrator::list_history`].
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub project_id: Option<ProjectId>,
    pub date_from: Option<DateTime<Utc>>,
    /// Defaults to `prompt.default_history_limit`.
    pub limit: Option<usize>,
}

/// A session as shown to its owner, with the project name resolved.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: ConversationSession,
    /// `None` when the session has no project or the project is gone.
    pub project_name: Option<String>,
}

pub struct QueryOrchestrator {
    storage: Arc<dyn StorageBackend>,
    generator: Arc<dyn Generator>,
    context: ContextBuilder,
    assembler: PromptAssembler,
    limits: PromptLimits,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl QueryOrchestrator {
    /// Create an orchestrator with default limits and generation settings.
    pub fn new(storage: Arc<dyn StorageBackend>, generator: Arc<dyn Generator>) -> Self {
        let limits = PromptLimits::default();
        let defaults = GenerationOptions::default();
        Self {
            context: ContextBuilder::new(storage.clone(), limits),
            assembler: PromptAssembler::new(limits),
            storage,
            generator,
            limits,
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Create an orchestrator from the full application config.
    pub fn from_config(
        storage: Arc<dyn StorageBackend>,
        generator: Arc<dyn Generator>,
        config: &AppConfig,
    ) -> Self {
        Self::new(storage, generator)
            .with_limits(config.prompt)
            .with_generation(&config.generation)
    }

    /// Set the prompt and listing bounds.
    pub fn with_limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self.context = ContextBuilder::new(self.storage.clone(), limits);
        self.assembler = PromptAssembler::new(limits);
        self
    }

    /// Set the model, temperature and token cap sent with each request.
    pub fn with_generation(mut self, config: &GenerationConfig) -> Self {
        self.model = config.model.clone();
        self.temperature = config.temperature;
        self.max_tokens = config.max_tokens;
        self
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Answer a question and store the exchange.
    pub async fn submit_query(
        &self,
        principal: Principal,
        request: QueryRequest,
    ) -> Result<ConversationSession> {
        let Principal { tenant_id, user_id } = principal;
        let question = self.validate_question(&request.question)?;

        self.storage
            .users()
            .get(tenant_id, user_id)
            .await?
            .ok_or_else(|| Error::not_found("User", user_id))?;

        if let Some(project_id) = request.project_id {
            self.storage
                .projects()
                .get(tenant_id, project_id)
                .await?
                .ok_or_else(|| Error::not_found("Project", project_id))?;
        }

        let parent = match request.parent_session_id {
            Some(id) => Some(self.owned_session(principal, id).await?),
            None => None,
        };

        let profile = self
            .storage
            .profiles()
            .get_or_create(tenant_id, user_id)
            .await?;

        let started = Instant::now();
        let bundle = self.context.build(tenant_id, request.project_id).await?;

        let recent = if request.include_history && parent.is_none() {
            let query = SessionQuery::roots().with_limit(self.limits.max_history_sessions);
            self.storage
                .sessions()
                .list_for_user(tenant_id, user_id, &query)
                .await?
        } else {
            Vec::new()
        };
        let history = if request.include_history {
            HistoryMode::Ambient(&recent)
        } else {
            HistoryMode::Off
        };

        let prompt = self.assembler.assemble(
            question,
            &bundle,
            &profile,
            user_id,
            history,
            parent.as_ref(),
        );
        debug!(
            tenant = %tenant_id,
            prompt_chars = prompt.user_content.chars().count(),
            history_sessions = recent.len(),
            "Prompt assembled"
        );

        let options = GenerationOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_instructions: Some(prompt.system_instructions),
            extra_context: bundle.facts,
        };
        let result = self.generator.generate(&prompt.user_content, &options).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        if result.degraded {
            warn!(
                tenant = %tenant_id,
                user = %user_id,
                generator = %self.generator.name(),
                error = result.error.as_deref().unwrap_or_default(),
                "Storing degraded answer"
            );
        }
        let log = InteractionLog::from_generation(tenant_id, user_id, &prompt.user_content, &result)
            .with_project(request.project_id);

        let mut session = ConversationSession::new(tenant_id, user_id, question)
            .with_project(request.project_id)
            .with_parent(parent.map(|p| p.id))
            .with_response(result.content);
        session.confidence = Some(result.confidence);
        session.sources = bundle.sources;
        session.model = Some(result.model_id);
        session.token_count = result.token_count;
        session.response_time_ms = response_time_ms;

        let session = self.storage.sessions().add(session).await?;

        if let Err(e) = self
            .storage
            .interactions()
            .add(log.with_session(session.id))
            .await
        {
            warn!(session = %session.id, error = %e, "Failed to record interaction log");
        }

        info!(
            tenant = %tenant_id,
            user = %user_id,
            session = %session.id,
            model = session.model.as_deref().unwrap_or_default(),
            tokens = session.token_count,
            latency_ms = response_time_ms,
            "Chat query answered"
        );

        Ok(session)
    }

    /// The user's root sessions, newest first.
    pub async fn list_history(
        &self,
        principal: Principal,
        query: HistoryQuery,
    ) -> Result<Vec<SessionView>> {
        let limit = query.limit.unwrap_or(self.limits.default_history_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let session_query = SessionQuery {
            project_id: query.project_id,
            date_from: query.date_from,
            roots_only: true,
            limit: Some(limit),
        };
        let sessions = self
            .storage
            .sessions()
            .list_for_user(principal.tenant_id, principal.user_id, &session_query)
            .await?;

        self.with_project_names(principal, sessions).await
    }

    /// One session, if the caller owns it. A missing session and someone
    /// else's session both come back as the same NotFound.
    pub async fn get_session(&self, principal: Principal, id: SessionId) -> Result<SessionView> {
        let session = self.owned_session(principal, id).await?;
        let project_name = match session.project_id {
            Some(project_id) => self
                .storage
                .projects()
                .get(principal.tenant_id, project_id)
                .await?
                .map(|p| p.name),
            None => None,
        };
        Ok(SessionView {
            session,
            project_name,
        })
    }

    /// Direct follow-ups of an owned session, oldest first.
    pub async fn list_follow_ups(
        &self,
        principal: Principal,
        id: SessionId,
    ) -> Result<Vec<SessionView>> {
        let parent = self.owned_session(principal, id).await?;
        let children = self
            .storage
            .sessions()
            .follow_ups(principal.tenant_id, parent.id)
            .await?
            .into_iter()
            .filter(|s| s.user_id == principal.user_id)
            .collect();
        self.with_project_names(principal, children).await
    }

    /// Delete an owned session. Its follow-ups survive as roots.
    pub async fn delete_session(&self, principal: Principal, id: SessionId) -> Result<()> {
        let session = self.owned_session(principal, id).await?;
        let deleted = self
            .storage
            .sessions()
            .delete(principal.tenant_id, session.id)
            .await?;
        if !deleted {
            // Lost a race with another delete.
            return Err(Error::not_found("Chat session", id));
        }
        info!(tenant = %principal.tenant_id, session = %id, "Chat session deleted");
        Ok(())
    }

    pub async fn get_style_profile(&self, principal: Principal) -> Result<StyleProfile> {
        Ok(self
            .storage
            .profiles()
            .get_or_create(principal.tenant_id, principal.user_id)
            .await?)
    }

    /// Apply `patch` to the caller's profile, creating the default first if
    /// needed.
    pub async fn update_style_profile(
        &self,
        principal: Principal,
        patch: StyleProfilePatch,
    ) -> Result<StyleProfile> {
        let mut profile = self.get_style_profile(principal).await?;
        if patch.is_empty() {
            return Ok(profile);
        }
        patch.apply_to(&mut profile);
        if !self.storage.profiles().update(profile.clone()).await? {
            return Err(Error::Internal(format!(
                "style profile {} vanished during update",
                profile.id
            )));
        }
        info!(
            tenant = %principal.tenant_id,
            user = %principal.user_id,
            tone = %profile.tone,
            "Style profile updated"
        );
        Ok(profile)
    }

    fn validate_question<'q>(&self, question: &'q str) -> Result<&'q str> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("question is required".into()));
        }
        if trimmed.chars().count() > self.limits.max_question_chars {
            return Err(Error::InvalidInput(format!(
                "question must not exceed {} characters",
                self.limits.max_question_chars
            )));
        }
        Ok(trimmed)
    }

    async fn owned_session(&self, principal: Principal, id: SessionId) -> Result<ConversationSession> {
        self.storage
            .sessions()
            .get(principal.tenant_id, id)
            .await?
            .filter(|s| s.user_id == principal.user_id)
            .ok_or_else(|| Error::not_found("Chat session", id))
    }

    async fn with_project_names(
        &self,
        principal: Principal,
        sessions: Vec<ConversationSession>,
    ) -> Result<Vec<SessionView>> {
        let names: HashMap<ProjectId, String> = if sessions.iter().any(|s| s.project_id.is_some()) {
            self.storage
                .projects()
                .list(principal.tenant_id)
                .await?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(sessions
            .into_iter()
            .map(|session| SessionView {
                project_name: session.project_id.and_then(|id| names.get(&id).cloned()),
                session,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_builders() {
        let project = ProjectId::new();
        let parent = SessionId::new();
        let request = QueryRequest::new("Status?")
            .with_project(project)
            .with_parent(parent)
            .without_history();
        assert_eq!(request.project_id, Some(project));
        assert_eq!(request.parent_session_id, Some(parent));
        assert!(!request.include_history);
        assert!(QueryRequest::new("x").include_history);
    }
}
