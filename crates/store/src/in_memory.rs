//! In-memory backend: useful for testing and ephemeral sessions.
//!
//! Each entity kind lives in its own `Vec` behind a `tokio` lock, so
//! insertion order is preserved for free.

use async_trait::async_trait;
use pmassist_core::error::StoreError;
use pmassist_core::ids::{SessionId, TenantId, UserId};
use pmassist_core::interaction::InteractionLog;
use pmassist_core::model::{Project, StyleProfile, TaskItem, User};
use pmassist_core::session::ConversationSession;
use pmassist_core::store::{
    SessionQuery, SessionStore, StorageBackend, StyleProfileStore, TenantScoped, TenantStore,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A tenant-filtered table of one entity kind.
pub struct InMemoryTable<T> {
    rows: Arc<RwLock<Vec<T>>>,
}

impl<T> InMemoryTable<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A second handle onto the same rows.
    fn share(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T> Default for InMemoryTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: TenantScoped> TenantStore<T> for InMemoryTable<T> {
    async fn get(&self, tenant: TenantId, id: T::Id) -> Result<Option<T>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|e| e.tenant_id() == tenant && e.id() == id)
            .cloned())
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<T>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|e| e.tenant_id() == tenant)
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        tenant: TenantId,
        predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<Vec<T>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|e| e.tenant_id() == tenant && predicate(e))
            .cloned()
            .collect())
    }

    async fn add(&self, entity: T) -> Result<T, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|e| e.id() == entity.id()) {
            return Err(StoreError::Storage(format!(
                "{} {} already exists",
                T::KIND,
                entity.id()
            )));
        }
        debug!(kind = T::KIND, id = %entity.id(), "Stored entity");
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: T) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|e| e.tenant_id() == entity.tenant_id() && e.id() == entity.id())
        {
            Some(slot) => {
                *slot = entity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, tenant: TenantId, id: T::Id) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        let len_before = rows.len();
        rows.retain(|e| !(e.tenant_id() == tenant && e.id() == id));
        Ok(rows.len() < len_before)
    }
}

// ── Sessions ─────────────────────────────────────────────────────────────

/// Session table; deleting a session detaches its follow-ups and the
/// interaction log entries that point at it.
#[derive(Default)]
pub struct InMemorySessionStore {
    table: InMemoryTable<ConversationSession>,
    interactions: InMemoryTable<InteractionLog>,
}

#[async_trait]
impl TenantStore<ConversationSession> for InMemorySessionStore {
    async fn get(
        &self,
        tenant: TenantId,
        id: SessionId,
    ) -> Result<Option<ConversationSession>, StoreError> {
        self.table.get(tenant, id).await
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<ConversationSession>, StoreError> {
        self.table.list(tenant).await
    }

    async fn find(
        &self,
        tenant: TenantId,
        predicate: &(dyn for<'a> Fn(&'a ConversationSession) -> bool + Send + Sync),
    ) -> Result<Vec<ConversationSession>, StoreError> {
        self.table.find(tenant, predicate).await
    }

    async fn add(&self, entity: ConversationSession) -> Result<ConversationSession, StoreError> {
        self.table.add(entity).await
    }

    async fn update(&self, entity: ConversationSession) -> Result<bool, StoreError> {
        self.table.update(entity).await
    }

    async fn delete(&self, tenant: TenantId, id: SessionId) -> Result<bool, StoreError> {
        let mut rows = self.table.rows.write().await;
        let len_before = rows.len();
        rows.retain(|s| !(s.tenant_id == tenant && s.id == id));
        let removed = rows.len() < len_before;
        if removed {
            for child in rows
                .iter_mut()
                .filter(|s| s.tenant_id == tenant && s.parent_session_id == Some(id))
            {
                child.parent_session_id = None;
            }
            let mut logs = self.interactions.rows.write().await;
            for log in logs
                .iter_mut()
                .filter(|l| l.tenant_id == tenant && l.session_id == Some(id))
            {
                log.session_id = None;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn list_for_user(
        &self,
        tenant: TenantId,
        user: UserId,
        query: &SessionQuery,
    ) -> Result<Vec<ConversationSession>, StoreError> {
        let rows = self.table.rows.read().await;
        // Newest insertion first, then a stable sort keeps that order for ties.
        let mut matched: Vec<ConversationSession> = rows
            .iter()
            .rev()
            .filter(|s| s.is_owned_by(tenant, user) && query.matches(s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn follow_ups(
        &self,
        tenant: TenantId,
        parent: SessionId,
    ) -> Result<Vec<ConversationSession>, StoreError> {
        let rows = self.table.rows.read().await;
        let mut children: Vec<ConversationSession> = rows
            .iter()
            .filter(|s| s.tenant_id == tenant && s.parent_session_id == Some(parent))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(children)
    }
}

// ── Style profiles ───────────────────────────────────────────────────────

/// Profile table; at most one profile per (tenant, user).
#[derive(Default)]
pub struct InMemoryProfileStore {
    table: InMemoryTable<StyleProfile>,
}

#[async_trait]
impl TenantStore<StyleProfile> for InMemoryProfileStore {
    async fn get(
        &self,
        tenant: TenantId,
        id: pmassist_core::ids::ProfileId,
    ) -> Result<Option<StyleProfile>, StoreError> {
        self.table.get(tenant, id).await
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<StyleProfile>, StoreError> {
        self.table.list(tenant).await
    }

    async fn add(&self, entity: StyleProfile) -> Result<StyleProfile, StoreError> {
        let mut rows = self.table.rows.write().await;
        if rows.iter().any(|p| {
            p.id == entity.id || (p.tenant_id == entity.tenant_id && p.user_id == entity.user_id)
        }) {
            return Err(StoreError::Storage(format!(
                "style profile for user {} already exists",
                entity.user_id
            )));
        }
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: StyleProfile) -> Result<bool, StoreError> {
        self.table.update(entity).await
    }

    async fn delete(
        &self,
        tenant: TenantId,
        id: pmassist_core::ids::ProfileId,
    ) -> Result<bool, StoreError> {
        self.table.delete(tenant, id).await
    }
}

#[async_trait]
impl StyleProfileStore for InMemoryProfileStore {
    async fn find_by_user(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<Option<StyleProfile>, StoreError> {
        let rows = self.table.rows.read().await;
        Ok(rows
            .iter()
            .find(|p| p.tenant_id == tenant && p.user_id == user)
            .cloned())
    }

    async fn get_or_create(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<StyleProfile, StoreError> {
        // Check and insert under one write lock.
        let mut rows = self.table.rows.write().await;
        if let Some(existing) = rows
            .iter()
            .find(|p| p.tenant_id == tenant && p.user_id == user)
        {
            return Ok(existing.clone());
        }
        let profile = StyleProfile::default_for(tenant, user);
        debug!(tenant = %tenant, user = %user, "Created default style profile");
        rows.push(profile.clone());
        Ok(profile)
    }
}

// ── Backend ──────────────────────────────────────────────────────────────

/// An in-memory storage backend. Nothing survives the process.
pub struct InMemoryBackend {
    users: InMemoryTable<User>,
    projects: InMemoryTable<Project>,
    tasks: InMemoryTable<TaskItem>,
    sessions: InMemorySessionStore,
    profiles: InMemoryProfileStore,
    interactions: InMemoryTable<InteractionLog>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        let interactions = InMemoryTable::new();
        Self {
            users: InMemoryTable::new(),
            projects: InMemoryTable::new(),
            tasks: InMemoryTable::new(),
            sessions: InMemorySessionStore {
                table: InMemoryTable::new(),
                interactions: interactions.share(),
            },
            profiles: InMemoryProfileStore::default(),
            interactions,
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn users(&self) -> &dyn TenantStore<User> {
        &self.users
    }

    fn projects(&self) -> &dyn TenantStore<Project> {
        &self.projects
    }

    fn tasks(&self) -> &dyn TenantStore<TaskItem> {
        &self.tasks
    }

    fn sessions(&self) -> &dyn SessionStore {
        &self.sessions
    }

    fn profiles(&self) -> &dyn StyleProfileStore {
        &self.profiles
    }

    fn interactions(&self) -> &dyn TenantStore<InteractionLog> {
        &self.interactions
    }
}
