//! Storage traits: tenant-isolated persistence.
//!
//! Every read and write is scoped by a [`TenantId`]; an entity belonging to
//! another tenant is indistinguishable from one that doesn't exist.
//!
//! Implementations: in-memory (tests, demos) and SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;
use crate::ids::{ProjectId, SessionId, TenantId, UserId};
use crate::interaction::InteractionLog;
use crate::model::{Project, StyleProfile, TaskItem, User};
use crate::session::ConversationSession;

/// An entity that belongs to exactly one tenant.
pub trait TenantScoped: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + fmt::Display + Send + Sync + 'static;

    /// Human-readable entity kind, used in not-found messages.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;
    fn tenant_id(&self) -> TenantId;
}

/// Generic tenant-isolated collection.
#[async_trait]
pub trait TenantStore<T: TenantScoped>: Send + Sync {
    async fn get(&self, tenant: TenantId, id: T::Id) -> Result<Option<T>, StoreError>;

    /// All of the tenant's entities, in insertion order.
    async fn list(&self, tenant: TenantId) -> Result<Vec<T>, StoreError>;

    /// The tenant's entities matching `predicate`, in insertion order.
    async fn find(
        &self,
        tenant: TenantId,
        predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<Vec<T>, StoreError> {
        let all = self.list(tenant).await?;
        Ok(all.into_iter().filter(|e| predicate(e)).collect())
    }

    async fn add(&self, entity: T) -> Result<T, StoreError>;

    /// Replace an existing entity. Returns `false` if it wasn't there.
    async fn update(&self, entity: T) -> Result<bool, StoreError>;

    /// Returns `true` if something was removed.
    async fn delete(&self, tenant: TenantId, id: T::Id) -> Result<bool, StoreError>;
}

/// Filter for a user's session history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Inclusive lower bound on `created_at`.
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    /// Only sessions without a parent.
    #[serde(default)]
    pub roots_only: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SessionQuery {
    pub fn roots() -> Self {
        Self {
            roots_only: true,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `session` passes every filter except the owner and limit.
    pub fn matches(&self, session: &ConversationSession) -> bool {
        if self.roots_only && !session.is_root() {
            return false;
        }
        if let Some(pid) = self.project_id
            && session.project_id != Some(pid)
        {
            return false;
        }
        if let Some(from) = self.date_from
            && session.created_at < from
        {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait SessionStore: TenantStore<ConversationSession> {
    /// The user's sessions matching `query`, newest first. Sessions created
    /// at the same instant come back most-recently-inserted first.
    async fn list_for_user(
        &self,
        tenant: TenantId,
        user: UserId,
        query: &SessionQuery,
    ) -> Result<Vec<ConversationSession>, StoreError>;

    /// Direct children of `parent`, oldest first.
    async fn follow_ups(
        &self,
        tenant: TenantId,
        parent: SessionId,
    ) -> Result<Vec<ConversationSession>, StoreError>;
}

#[async_trait]
pub trait StyleProfileStore: TenantStore<StyleProfile> {
    async fn find_by_user(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<Option<StyleProfile>, StoreError>;

    /// Return the user's profile, creating the default one if absent.
    /// Concurrent callers for the same user all observe the same profile.
    async fn get_or_create(&self, tenant: TenantId, user: UserId)
    -> Result<StyleProfile, StoreError>;
}

/// A complete storage backend: one store per entity kind.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    fn users(&self) -> &dyn TenantStore<User>;
    fn projects(&self) -> &dyn TenantStore<Project>;
    fn tasks(&self) -> &dyn TenantStore<TaskItem>;
    fn sessions(&self) -> &dyn SessionStore;
    fn profiles(&self) -> &dyn StyleProfileStore;
    fn interactions(&self) -> &dyn TenantStore<InteractionLog>;

    /// Can the backend serve requests?
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> ConversationSession {
        ConversationSession::new(TenantId::new(), UserId::new(), "q")
    }

    #[test]
    fn roots_only_excludes_follow_ups() {
        let q = SessionQuery::roots();
        let root = session();
        let child = session().with_parent(Some(root.id));
        assert!(q.matches(&root));
        assert!(!q.matches(&child));
    }

    #[test]
    fn project_filter() {
        let pid = ProjectId::new();
        let q = SessionQuery {
            project_id: Some(pid),
            ..Default::default()
        };
        assert!(q.matches(&session().with_project(Some(pid))));
        assert!(!q.matches(&session()));
        assert!(!q.matches(&session().with_project(Some(ProjectId::new()))));
    }

    #[test]
    fn date_from_is_inclusive() {
        let s = session();
        let q = SessionQuery {
            date_from: Some(s.created_at),
            ..Default::default()
        };
        assert!(q.matches(&s));
        let later = SessionQuery {
            date_from: Some(s.created_at + Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&s));
    }
}
