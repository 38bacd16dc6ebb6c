//! SQLite backend.
//!
//! One table per entity kind. Each table carries an integer `iid` rowid so
//! listings come back in insertion order and same-instant sessions have a
//! stable tiebreak. Identities and timestamps are stored as TEXT; timestamps
//! always use the same fixed-width RFC 3339 form so they compare as strings.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pmassist_core::error::StoreError;
use pmassist_core::ids::{ProfileId, SessionId, TenantId, UserId};
use pmassist_core::interaction::InteractionLog;
use pmassist_core::model::{Project, StyleProfile, TaskItem, User};
use pmassist_core::session::{decode_sources, encode_sources, ConversationSession};
use pmassist_core::store::{
    SessionQuery, SessionStore, StorageBackend, StyleProfileStore, TenantScoped, TenantStore,
};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::marker::PhantomData;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

type SqlQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Schema, applied in order on every open.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            iid           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT UNIQUE NOT NULL,
            tenant_id     TEXT NOT NULL,
            email         TEXT NOT NULL,
            display_name  TEXT NOT NULL,
            is_active     INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL
        )
        "#,
    ),
    (
        "projects table",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            iid           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT UNIQUE NOT NULL,
            tenant_id     TEXT NOT NULL,
            name          TEXT NOT NULL,
            description   TEXT,
            status        TEXT NOT NULL,
            owner_id      TEXT NOT NULL,
            created_at    TEXT NOT NULL
        )
        "#,
    ),
    (
        "tasks table",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            iid           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT UNIQUE NOT NULL,
            tenant_id     TEXT NOT NULL,
            project_id    TEXT NOT NULL,
            title         TEXT NOT NULL,
            description   TEXT,
            status        TEXT NOT NULL,
            priority      TEXT NOT NULL,
            assigned_to   TEXT,
            due_date      TEXT,
            created_at    TEXT NOT NULL
        )
        "#,
    ),
    (
        "style_profiles table",
        r#"
        CREATE TABLE IF NOT EXISTS style_profiles (
            iid                       INTEGER PRIMARY KEY AUTOINCREMENT,
            id                        TEXT UNIQUE NOT NULL,
            tenant_id                 TEXT NOT NULL,
            user_id                   TEXT NOT NULL,
            tone                      TEXT NOT NULL,
            prefer_bullets            INTEGER NOT NULL,
            include_risks_by_default  INTEGER NOT NULL,
            auto_create_tasks         INTEGER NOT NULL,
            created_at                TEXT NOT NULL,
            updated_at                TEXT,
            UNIQUE (tenant_id, user_id)
        )
        "#,
    ),
    (
        "chat_sessions table",
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            iid                INTEGER PRIMARY KEY AUTOINCREMENT,
            id                 TEXT UNIQUE NOT NULL,
            tenant_id          TEXT NOT NULL,
            user_id            TEXT NOT NULL,
            project_id         TEXT,
            question           TEXT NOT NULL,
            response           TEXT,
            parent_session_id  TEXT REFERENCES chat_sessions(id) ON DELETE SET NULL,
            confidence         REAL,
            sources            TEXT NOT NULL DEFAULT '[]',
            model              TEXT,
            token_count        INTEGER NOT NULL DEFAULT 0,
            response_time_ms   INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL
        )
        "#,
    ),
    (
        "interaction_logs table",
        r#"
        CREATE TABLE IF NOT EXISTS interaction_logs (
            iid               INTEGER PRIMARY KEY AUTOINCREMENT,
            id                TEXT UNIQUE NOT NULL,
            tenant_id         TEXT NOT NULL,
            user_id           TEXT NOT NULL,
            project_id        TEXT,
            session_id        TEXT REFERENCES chat_sessions(id) ON DELETE SET NULL,
            prompt            TEXT NOT NULL,
            response          TEXT NOT NULL,
            model             TEXT NOT NULL,
            token_count       INTEGER NOT NULL DEFAULT 0,
            response_time_ms  INTEGER NOT NULL DEFAULT 0,
            status            TEXT NOT NULL,
            error_message     TEXT,
            created_at        TEXT NOT NULL
        )
        "#,
    ),
    (
        "tasks index",
        "CREATE INDEX IF NOT EXISTS idx_tasks_tenant_project ON tasks(tenant_id, project_id)",
    ),
    (
        "sessions owner index",
        "CREATE INDEX IF NOT EXISTS idx_sessions_owner ON chat_sessions(tenant_id, user_id, created_at DESC)",
    ),
    (
        "sessions parent index",
        "CREATE INDEX IF NOT EXISTS idx_sessions_parent ON chat_sessions(parent_session_id)",
    ),
];

// ── Row mapping ──────────────────────────────────────────────────────────

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn col<'r, V>(row: &'r SqliteRow, name: &str) -> Result<V, StoreError>
where
    V: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_ts(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            reason: format!("timestamp '{raw}': {e}"),
        })
}

fn parse_id<I: From<Uuid>>(table: &'static str, raw: &str) -> Result<I, StoreError> {
    Uuid::parse_str(raw).map(I::from).map_err(|e| StoreError::Corrupt {
        table,
        reason: format!("identity '{raw}': {e}"),
    })
}

fn parse_opt_id<I: From<Uuid>>(table: &'static str, raw: Option<String>) -> Result<Option<I>, StoreError> {
    raw.as_deref().map(|r| parse_id(table, r)).transpose()
}

fn parse_enum<E: FromStr>(table: &'static str, raw: &str) -> Result<E, StoreError>
where
    E::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: E::Err| StoreError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

/// An entity with a table of its own.
trait SqlEntity: TenantScoped {
    const TABLE: &'static str;
    /// Column order for inserts; `id` and `tenant_id` come first.
    const COLUMNS: &'static [&'static str];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q>;
    fn from_row(row: &SqliteRow) -> Result<Self, StoreError>;

    fn insert_sql() -> String {
        let params: Vec<String> = (1..=Self::COLUMNS.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::TABLE,
            Self::COLUMNS.join(", "),
            params.join(", ")
        )
    }

    fn update_sql() -> String {
        let sets: Vec<String> = Self::COLUMNS
            .iter()
            .enumerate()
            .skip(2)
            .map(|(i, c)| format!("{c} = ?{}", i + 1))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE id = ?1 AND tenant_id = ?2",
            Self::TABLE,
            sets.join(", ")
        )
    }
}

impl SqlEntity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["id", "tenant_id", "email", "display_name", "is_active", "created_at"];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q> {
        query
            .bind(self.id.to_string())
            .bind(self.tenant_id.to_string())
            .bind(self.email.clone())
            .bind(self.display_name.clone())
            .bind(self.is_active)
            .bind(ts(&self.created_at))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let t = Self::TABLE;
        Ok(Self {
            id: parse_id(t, &col::<String>(row, "id")?)?,
            tenant_id: parse_id(t, &col::<String>(row, "tenant_id")?)?,
            email: col(row, "email")?,
            display_name: col(row, "display_name")?,
            is_active: col(row, "is_active")?,
            created_at: parse_ts(t, &col::<String>(row, "created_at")?)?,
        })
    }
}

impl SqlEntity for Project {
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "name",
        "description",
        "status",
        "owner_id",
        "created_at",
    ];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q> {
        query
            .bind(self.id.to_string())
            .bind(self.tenant_id.to_string())
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.status.as_str())
            .bind(self.owner_id.to_string())
            .bind(ts(&self.created_at))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let t = Self::TABLE;
        Ok(Self {
            id: parse_id(t, &col::<String>(row, "id")?)?,
            tenant_id: parse_id(t, &col::<String>(row, "tenant_id")?)?,
            name: col(row, "name")?,
            description: col(row, "description")?,
            status: parse_enum(t, &col::<String>(row, "status")?)?,
            owner_id: parse_id(t, &col::<String>(row, "owner_id")?)?,
            created_at: parse_ts(t, &col::<String>(row, "created_at")?)?,
        })
    }
}

impl SqlEntity for TaskItem {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "project_id",
        "title",
        "description",
        "status",
        "priority",
        "assigned_to",
        "due_date",
        "created_at",
    ];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q> {
        query
            .bind(self.id.to_string())
            .bind(self.tenant_id.to_string())
            .bind(self.project_id.to_string())
            .bind(self.title.clone())
            .bind(self.description.clone())
            .bind(self.status.as_str())
            .bind(self.priority.as_str())
            .bind(self.assigned_to.map(|u| u.to_string()))
            .bind(self.due_date.as_ref().map(ts))
            .bind(ts(&self.created_at))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let t = Self::TABLE;
        let due_date: Option<String> = col(row, "due_date")?;
        Ok(Self {
            id: parse_id(t, &col::<String>(row, "id")?)?,
            tenant_id: parse_id(t, &col::<String>(row, "tenant_id")?)?,
            project_id: parse_id(t, &col::<String>(row, "project_id")?)?,
            title: col(row, "title")?,
            description: col(row, "description")?,
            status: parse_enum(t, &col::<String>(row, "status")?)?,
            priority: parse_enum(t, &col::<String>(row, "priority")?)?,
            assigned_to: parse_opt_id(t, col(row, "assigned_to")?)?,
            due_date: due_date.as_deref().map(|d| parse_ts(t, d)).transpose()?,
            created_at: parse_ts(t, &col::<String>(row, "created_at")?)?,
        })
    }
}

impl SqlEntity for StyleProfile {
    const TABLE: &'static str = "style_profiles";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "user_id",
        "tone",
        "prefer_bullets",
        "include_risks_by_default",
        "auto_create_tasks",
        "created_at",
        "updated_at",
    ];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q> {
        query
            .bind(self.id.to_string())
            .bind(self.tenant_id.to_string())
            .bind(self.user_id.to_string())
            .bind(self.tone.as_str())
            .bind(self.prefer_bullets)
            .bind(self.include_risks_by_default)
            .bind(self.auto_create_tasks)
            .bind(ts(&self.created_at))
            .bind(self.updated_at.as_ref().map(ts))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let t = Self::TABLE;
        let updated_at: Option<String> = col(row, "updated_at")?;
        Ok(Self {
            id: parse_id(t, &col::<String>(row, "id")?)?,
            tenant_id: parse_id(t, &col::<String>(row, "tenant_id")?)?,
            user_id: parse_id(t, &col::<String>(row, "user_id")?)?,
            tone: parse_enum(t, &col::<String>(row, "tone")?)?,
            prefer_bullets: col(row, "prefer_bullets")?,
            include_risks_by_default: col(row, "include_risks_by_default")?,
            auto_create_tasks: col(row, "auto_create_tasks")?,
            created_at: parse_ts(t, &col::<String>(row, "created_at")?)?,
            updated_at: updated_at.as_deref().map(|u| parse_ts(t, u)).transpose()?,
        })
    }
}

impl SqlEntity for ConversationSession {
    const TABLE: &'static str = "chat_sessions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "user_id",
        "project_id",
        "question",
        "response",
        "parent_session_id",
        "confidence",
        "sources",
        "model",
        "token_count",
        "response_time_ms",
        "created_at",
    ];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q> {
        query
            .bind(self.id.to_string())
            .bind(self.tenant_id.to_string())
            .bind(self.user_id.to_string())
            .bind(self.project_id.map(|p| p.to_string()))
            .bind(self.question.clone())
            .bind(self.response.clone())
            .bind(self.parent_session_id.map(|p| p.to_string()))
            .bind(self.confidence)
            .bind(encode_sources(&self.sources))
            .bind(self.model.clone())
            .bind(i64::from(self.token_count))
            .bind(i64::try_from(self.response_time_ms).unwrap_or(i64::MAX))
            .bind(ts(&self.created_at))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let t = Self::TABLE;
        let sources: String = col(row, "sources")?;
        let token_count: i64 = col(row, "token_count")?;
        let response_time_ms: i64 = col(row, "response_time_ms")?;
        Ok(Self {
            id: parse_id(t, &col::<String>(row, "id")?)?,
            tenant_id: parse_id(t, &col::<String>(row, "tenant_id")?)?,
            user_id: parse_id(t, &col::<String>(row, "user_id")?)?,
            project_id: parse_opt_id(t, col(row, "project_id")?)?,
            question: col(row, "question")?,
            response: col(row, "response")?,
            parent_session_id: parse_opt_id(t, col(row, "parent_session_id")?)?,
            confidence: col(row, "confidence")?,
            sources: decode_sources(&sources),
            model: col(row, "model")?,
            token_count: u32::try_from(token_count).unwrap_or(0),
            response_time_ms: u64::try_from(response_time_ms).unwrap_or(0),
            created_at: parse_ts(t, &col::<String>(row, "created_at")?)?,
        })
    }
}

impl SqlEntity for InteractionLog {
    const TABLE: &'static str = "interaction_logs";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "user_id",
        "project_id",
        "session_id",
        "prompt",
        "response",
        "model",
        "token_count",
        "response_time_ms",
        "status",
        "error_message",
        "created_at",
    ];

    fn bind_all<'q>(&self, query: SqlQuery<'q>) -> SqlQuery<'q> {
        query
            .bind(self.id.to_string())
            .bind(self.tenant_id.to_string())
            .bind(self.user_id.to_string())
            .bind(self.project_id.map(|p| p.to_string()))
            .bind(self.session_id.map(|s| s.to_string()))
            .bind(self.prompt.clone())
            .bind(self.response.clone())
            .bind(self.model.clone())
            .bind(i64::from(self.token_count))
            .bind(i64::try_from(self.response_time_ms).unwrap_or(i64::MAX))
            .bind(self.status.as_str())
            .bind(self.error_message.clone())
            .bind(ts(&self.created_at))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let t = Self::TABLE;
        let token_count: i64 = col(row, "token_count")?;
        let response_time_ms: i64 = col(row, "response_time_ms")?;
        Ok(Self {
            id: parse_id(t, &col::<String>(row, "id")?)?,
            tenant_id: parse_id(t, &col::<String>(row, "tenant_id")?)?,
            user_id: parse_id(t, &col::<String>(row, "user_id")?)?,
            project_id: parse_opt_id(t, col(row, "project_id")?)?,
            session_id: parse_opt_id(t, col(row, "session_id")?)?,
            prompt: col(row, "prompt")?,
            response: col(row, "response")?,
            model: col(row, "model")?,
            token_count: u32::try_from(token_count).unwrap_or(0),
            response_time_ms: u64::try_from(response_time_ms).unwrap_or(0),
            status: parse_enum(t, &col::<String>(row, "status")?)?,
            error_message: col(row, "error_message")?,
            created_at: parse_ts(t, &col::<String>(row, "created_at")?)?,
        })
    }
}

// ── Generic table ────────────────────────────────────────────────────────

/// Tenant-filtered access to one table.
struct SqliteTable<T> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> SqliteTable<T> {
    fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: SqlEntity> TenantStore<T> for SqliteTable<T> {
    async fn get(&self, tenant: TenantId, id: T::Id) -> Result<Option<T>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1 AND tenant_id = ?2", T::TABLE);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(tenant.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET {}: {e}", T::TABLE)))?;

        row.as_ref().map(T::from_row).transpose()
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<T>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE tenant_id = ?1 ORDER BY iid", T::TABLE);
        let rows = sqlx::query(&sql)
            .bind(tenant.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST {}: {e}", T::TABLE)))?;

        rows.iter().map(T::from_row).collect()
    }

    async fn add(&self, entity: T) -> Result<T, StoreError> {
        let sql = T::insert_sql();
        entity
            .bind_all(sqlx::query(&sql))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT {}: {e}", T::TABLE)))?;

        debug!(kind = T::KIND, id = %entity.id(), "Stored entity");
        Ok(entity)
    }

    async fn update(&self, entity: T) -> Result<bool, StoreError> {
        let sql = T::update_sql();
        let result = entity
            .bind_all(sqlx::query(&sql))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE {}: {e}", T::TABLE)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, tenant: TenantId, id: T::Id) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1 AND tenant_id = ?2", T::TABLE);
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(tenant.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE {}: {e}", T::TABLE)))?;

        Ok(result.rows_affected() > 0)
    }
}

// ── Sessions ─────────────────────────────────────────────────────────────

/// Session table. Deleting a session nulls its follow-ups' parent pointer
/// through the foreign key.
struct SqliteSessionStore {
    table: SqliteTable<ConversationSession>,
}

#[async_trait]
impl TenantStore<ConversationSession> for SqliteSessionStore {
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

    async fn add(&self, entity: ConversationSession) -> Result<ConversationSession, StoreError> {
        self.table.add(entity).await
    }

    async fn update(&self, entity: ConversationSession) -> Result<bool, StoreError> {
        self.table.update(entity).await
    }

    async fn delete(&self, tenant: TenantId, id: SessionId) -> Result<bool, StoreError> {
        self.table.delete(tenant, id).await
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn list_for_user(
        &self,
        tenant: TenantId,
        user: UserId,
        query: &SessionQuery,
    ) -> Result<Vec<ConversationSession>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM chat_sessions WHERE tenant_id = ");
        qb.push_bind(tenant.to_string());
        qb.push(" AND user_id = ");
        qb.push_bind(user.to_string());
        if query.roots_only {
            qb.push(" AND parent_session_id IS NULL");
        }
        if let Some(pid) = query.project_id {
            qb.push(" AND project_id = ");
            qb.push_bind(pid.to_string());
        }
        if let Some(from) = query.date_from {
            qb.push(" AND created_at >= ");
            qb.push_bind(ts(&from));
        }
        qb.push(" ORDER BY created_at DESC, iid DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb
            .build()
            .fetch_all(&self.table.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("session history: {e}")))?;

        rows.iter().map(ConversationSession::from_row).collect()
    }

    async fn follow_ups(
        &self,
        tenant: TenantId,
        parent: SessionId,
    ) -> Result<Vec<ConversationSession>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_sessions WHERE tenant_id = ?1 AND parent_session_id = ?2 \
             ORDER BY created_at ASC, iid ASC",
        )
        .bind(tenant.to_string())
        .bind(parent.to_string())
        .fetch_all(&self.table.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("follow-ups: {e}")))?;

        rows.iter().map(ConversationSession::from_row).collect()
    }
}

// ── Style profiles ───────────────────────────────────────────────────────

struct SqliteProfileStore {
    table: SqliteTable<StyleProfile>,
}

#[async_trait]
impl TenantStore<StyleProfile> for SqliteProfileStore {
    async fn get(&self, tenant: TenantId, id: ProfileId) -> Result<Option<StyleProfile>, StoreError> {
        self.table.get(tenant, id).await
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<StyleProfile>, StoreError> {
        self.table.list(tenant).await
    }

    async fn add(&self, entity: StyleProfile) -> Result<StyleProfile, StoreError> {
        self.table.add(entity).await
    }

    async fn update(&self, entity: StyleProfile) -> Result<bool, StoreError> {
        self.table.update(entity).await
    }

    async fn delete(&self, tenant: TenantId, id: ProfileId) -> Result<bool, StoreError> {
        self.table.delete(tenant, id).await
    }
}

#[async_trait]
impl StyleProfileStore for SqliteProfileStore {
    async fn find_by_user(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<Option<StyleProfile>, StoreError> {
        let row = sqlx::query("SELECT * FROM style_profiles WHERE tenant_id = ?1 AND user_id = ?2")
            .bind(tenant.to_string())
            .bind(user.to_string())
            .fetch_optional(&self.table.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("profile by user: {e}")))?;

        row.as_ref().map(StyleProfile::from_row).transpose()
    }

    async fn get_or_create(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<StyleProfile, StoreError> {
        let sql = format!(
            "{} ON CONFLICT(tenant_id, user_id) DO NOTHING",
            StyleProfile::insert_sql()
        );
        StyleProfile::default_for(tenant, user)
            .bind_all(sqlx::query(&sql))
            .execute(&self.table.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("profile upsert: {e}")))?;

        self.find_by_user(tenant, user).await?.ok_or_else(|| {
            StoreError::Storage(format!("profile for user {user} missing after upsert"))
        })
    }
}

// ── Backend ──────────────────────────────────────────────────────────────

/// A SQLite storage backend.
pub struct SqliteBackend {
    pool: SqlitePool,
    users: SqliteTable<User>,
    projects: SqliteTable<Project>,
    tasks: SqliteTable<TaskItem>,
    sessions: SqliteSessionStore,
    profiles: SqliteProfileStore,
    interactions: SqliteTable<InteractionLog>,
}

impl SqliteBackend {
    /// Open (creating if needed) a SQLite database and migrate it.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self::from_pool(pool).await?;
        info!("SQLite storage initialized at {url}");
        Ok(backend)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let backend = Self {
            users: SqliteTable::new(pool.clone()),
            projects: SqliteTable::new(pool.clone()),
            tasks: SqliteTable::new(pool.clone()),
            sessions: SqliteSessionStore {
                table: SqliteTable::new(pool.clone()),
            },
            profiles: SqliteProfileStore {
                table: SqliteTable::new(pool.clone()),
            },
            interactions: SqliteTable::new(pool.clone()),
            pool,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for (name, sql) in MIGRATIONS {
            sqlx::query(*sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }
        debug!("SQLite migrations complete");
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
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

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("health check: {e}")))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pmassist_core::ids::ProjectId;
    use pmassist_core::model::{ProjectStatus, TaskPriority, TaskStatus, Tone};
    use pmassist_core::session::Source;

    async fn test_backend() -> SqliteBackend {
        SqliteBackend::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let backend = test_backend().await;
        backend.run_migrations().await.unwrap();
        assert!(backend.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn project_and_task_round_trip() {
        let backend = test_backend().await;
        let tenant = TenantId::new();
        let project = Project::new(tenant, UserId::new(), "Apollo")
            .with_description("Moon landing")
            .with_status(ProjectStatus::Completed);
        backend.projects().add(project.clone()).await.unwrap();

        let task = TaskItem::new(tenant, project.id, "Build rocket")
            .with_status(TaskStatus::Blocked)
            .with_priority(TaskPriority::Critical);
        backend.tasks().add(task.clone()).await.unwrap();

        let loaded = backend.projects().get(tenant, project.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Apollo");
        assert_eq!(loaded.status, ProjectStatus::Completed);
        assert_eq!(loaded.description.as_deref(), Some("Moon landing"));

        let tasks = backend.tasks().list(tenant).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Blocked);
        assert_eq!(tasks[0].priority, TaskPriority::Critical);
    }

    #[tokio::test]
    async fn other_tenant_cannot_read_update_or_delete() {
        let backend = test_backend().await;
        let owner = TenantId::new();
        let intruder = TenantId::new();
        let user = backend
            .users()
            .add(User::new(owner, "pm@example.com", "PM"))
            .await
            .unwrap();

        assert!(backend.users().get(intruder, user.id).await.unwrap().is_none());
        assert!(!backend.users().delete(intruder, user.id).await.unwrap());
        let mut hijack = user.clone();
        hijack.tenant_id = intruder;
        hijack.email = "evil@example.com".into();
        assert!(!backend.users().update(hijack).await.unwrap());

        let stored = backend.users().get(owner, user.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "pm@example.com");
    }

    #[tokio::test]
    async fn session_round_trip_with_sources() {
        let backend = test_backend().await;
        let tenant = TenantId::new();
        let user = UserId::new();
        let pid = ProjectId::new();
        let mut session = ConversationSession::new(tenant, user, "How is Apollo?")
            .with_project(Some(pid))
            .with_response("Fine.");
        session.sources = vec![Source::project(pid, "Apollo", None)];
        session.confidence = Some(0.95);
        session.model = Some("gpt-4".into());
        session.token_count = 42;
        session.response_time_ms = 1234;
        backend.sessions().add(session.clone()).await.unwrap();

        let loaded = backend.sessions().get(tenant, session.id).await.unwrap().unwrap();
        assert_eq!(loaded.sources, session.sources);
        assert_eq!(loaded.token_count, 42);
        assert_eq!(loaded.response_time_ms, 1234);
        assert_eq!(loaded.project_id, Some(pid));
        assert_eq!(loaded.created_at, session.created_at);
    }

    #[tokio::test]
    async fn corrupt_sources_column_reads_as_empty() {
        let backend = test_backend().await;
        let tenant = TenantId::new();
        let session = ConversationSession::new(tenant, UserId::new(), "q");
        backend.sessions().add(session.clone()).await.unwrap();
        sqlx::query("UPDATE chat_sessions SET sources = 'not json' WHERE id = ?1")
            .bind(session.id.to_string())
            .execute(&backend.pool)
            .await
            .unwrap();

        let loaded = backend.sessions().get(tenant, session.id).await.unwrap().unwrap();
        assert!(loaded.sources.is_empty());
    }

    #[tokio::test]
    async fn history_ordering_filters_and_limit() {
        let backend = test_backend().await;
        let tenant = TenantId::new();
        let user = UserId::new();
        let pid = ProjectId::new();
        let now = Utc::now();

        let mut old = ConversationSession::new(tenant, user, "old").with_project(Some(pid));
        old.created_at = now - Duration::days(2);
        let mut tie_a = ConversationSession::new(tenant, user, "tie a");
        tie_a.created_at = now;
        let mut tie_b = ConversationSession::new(tenant, user, "tie b").with_project(Some(pid));
        tie_b.created_at = now;
        for s in [old.clone(), tie_a, tie_b] {
            backend.sessions().add(s).await.unwrap();
        }
        backend
            .sessions()
            .add(ConversationSession::new(tenant, user, "child").with_parent(Some(old.id)))
            .await
            .unwrap();

        let all = backend
            .sessions()
            .list_for_user(tenant, user, &SessionQuery::roots())
            .await
            .unwrap();
        let q: Vec<&str> = all.iter().map(|s| s.question.as_str()).collect();
        assert_eq!(q, ["tie b", "tie a", "old"]);

        let by_project = backend
            .sessions()
            .list_for_user(
                tenant,
                user,
                &SessionQuery {
                    project_id: Some(pid),
                    roots_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_project.len(), 2);

        let recent = backend
            .sessions()
            .list_for_user(
                tenant,
                user,
                &SessionQuery {
                    date_from: Some(now - Duration::hours(1)),
                    roots_only: true,
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].question, "tie b");
    }

    #[tokio::test]
    async fn deleting_parent_nulls_follow_up_pointer() {
        let backend = test_backend().await;
        let tenant = TenantId::new();
        let user = UserId::new();
        let root = backend
            .sessions()
            .add(ConversationSession::new(tenant, user, "root"))
            .await
            .unwrap();
        let child = backend
            .sessions()
            .add(ConversationSession::new(tenant, user, "child").with_parent(Some(root.id)))
            .await
            .unwrap();

        let kids = backend.sessions().follow_ups(tenant, root.id).await.unwrap();
        assert_eq!(kids.len(), 1);

        assert!(backend.sessions().delete(tenant, root.id).await.unwrap());
        let orphan = backend.sessions().get(tenant, child.id).await.unwrap().unwrap();
        assert!(orphan.parent_session_id.is_none());
    }

    #[tokio::test]
    async fn interaction_log_round_trip_and_detach() {
        use pmassist_core::generation::GenerationResult;
        use pmassist_core::interaction::InteractionStatus;

        let backend = test_backend().await;
        let tenant = TenantId::new();
        let user = UserId::new();
        let session = backend
            .sessions()
            .add(ConversationSession::new(tenant, user, "q"))
            .await
            .unwrap();
        let failed = GenerationResult {
            content: "sorry".into(),
            token_count: 0,
            model_id: "gpt-4".into(),
            latency_ms: 12,
            confidence: 0.0,
            degraded: true,
            error: Some("Request timed out: 60s".into()),
        };
        let log = InteractionLog::from_generation(tenant, user, "User Question: q", &failed)
            .with_project(Some(ProjectId::new()))
            .with_session(session.id);
        backend.interactions().add(log.clone()).await.unwrap();

        let read = backend
            .interactions()
            .get(tenant, log.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, log);
        assert_eq!(read.status, InteractionStatus::Error);
        assert!(backend.interactions().list(TenantId::new()).await.unwrap().is_empty());

        assert!(backend.sessions().delete(tenant, session.id).await.unwrap());
        let kept = backend
            .interactions()
            .get(tenant, log.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.session_id, None);
    }

    #[tokio::test]
    async fn profile_upsert_and_update() {
        let backend = test_backend().await;
        let tenant = TenantId::new();
        let user = UserId::new();

        let first = backend.profiles().get_or_create(tenant, user).await.unwrap();
        let again = backend.profiles().get_or_create(tenant, user).await.unwrap();
        assert_eq!(first.id, again.id);

        let mut changed = first.clone();
        changed.tone = Tone::Technical;
        changed.prefer_bullets = false;
        changed.updated_at = Some(Utc::now());
        assert!(backend.profiles().update(changed).await.unwrap());

        let loaded = backend.profiles().find_by_user(tenant, user).await.unwrap().unwrap();
        assert_eq!(loaded.tone, Tone::Technical);
        assert!(!loaded.prefer_bullets);
        assert!(loaded.updated_at.is_some());
        assert!(backend.profiles().find_by_user(tenant, UserId::new()).await.unwrap().is_none());
    }

    #[test]
    fn generated_sql_shapes() {
        assert_eq!(
            User::insert_sql(),
            "INSERT INTO users (id, tenant_id, email, display_name, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        );
        assert_eq!(
            User::update_sql(),
            "UPDATE users SET email = ?3, display_name = ?4, is_active = ?5, created_at = ?6 \
             WHERE id = ?1 AND tenant_id = ?2"
        );
    }
}
