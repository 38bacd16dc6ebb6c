//! `pmassist seed`: load users, projects and tasks from a JSON fixture.
//!
//! ```json
//! {
//!   "tenant_id": "optional uuid",
//!   "users":    [{ "email": "pm@example.com", "display_name": "PM" }],
//!   "projects": [{ "name": "Apollo", "owner": "pm@example.com", "status": "Active" }],
//!   "tasks":    [{ "project": "Apollo", "title": "Design lander", "priority": "High" }]
//! }
//! ```
//!
//! Projects name their owner by email; tasks name their project by name and
//! their assignee by email.

use pmassist_core::error::{Error, Result};
use pmassist_core::ids::{ProjectId, TaskId, TenantId, UserId};
use pmassist_core::model::{Project, TaskItem, User};
use pmassist_core::store::StorageBackend;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
    #[serde(default)]
    pub projects: Vec<ProjectFixture>,
    #[serde(default)]
    pub tasks: Vec<TaskFixture>,
}

#[derive(Debug, Deserialize)]
pub struct UserFixture {
    #[serde(default)]
    pub id: Option<UserId>,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectFixture {
    #[serde(default)]
    pub id: Option<ProjectId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Owner's email.
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskFixture {
    #[serde(default)]
    pub id: Option<TaskId>,
    /// Project name.
    pub project: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Assignee's email.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// What got created, for printing.
#[derive(Debug)]
pub struct SeedReport {
    pub tenant_id: TenantId,
    pub users: Vec<(String, UserId)>,
    pub projects: Vec<(String, ProjectId)>,
    pub tasks: usize,
}

pub async fn run(path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;

    let config = super::load_config()?;
    let storage = pmassist_store::open(&config.storage)
        .await
        .map_err(|e| format!("Failed to open storage: {e}"))?;

    let report = load(storage.as_ref(), fixture).await?;

    println!("Seeded tenant {}", report.tenant_id);
    for (email, id) in &report.users {
        println!("  user     {id}  {email}");
    }
    for (name, id) in &report.projects {
        println!("  project  {id}  {name}");
    }
    println!("  {} task(s)", report.tasks);

    Ok(())
}

/// Validate the whole fixture, then write it.
pub async fn load(storage: &dyn StorageBackend, fixture: Fixture) -> Result<SeedReport> {
    let tenant = fixture.tenant_id.unwrap_or_default();

    let users: Vec<User> = fixture
        .users
        .into_iter()
        .map(|u| {
            let mut user = User::new(tenant, u.email, u.display_name);
            if let Some(id) = u.id {
                user.id = id;
            }
            user
        })
        .collect();
    let by_email: HashMap<&str, UserId> =
        users.iter().map(|u| (u.email.as_str(), u.id)).collect();
    let user_id = |email: &str| {
        by_email
            .get(email)
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("unknown user '{email}'")))
    };

    let mut projects = Vec::with_capacity(fixture.projects.len());
    for p in fixture.projects {
        let mut project = Project::new(tenant, user_id(&p.owner)?, p.name);
        if let Some(id) = p.id {
            project.id = id;
        }
        project.description = p.description;
        if let Some(status) = p.status {
            project.status = status.parse()?;
        }
        projects.push(project);
    }
    let by_name: HashMap<&str, ProjectId> =
        projects.iter().map(|p| (p.name.as_str(), p.id)).collect();

    let mut tasks = Vec::with_capacity(fixture.tasks.len());
    for t in fixture.tasks {
        let project_id = by_name
            .get(t.project.as_str())
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("unknown project '{}'", t.project)))?;
        let mut task = TaskItem::new(tenant, project_id, t.title);
        if let Some(id) = t.id {
            task.id = id;
        }
        task.description = t.description;
        if let Some(status) = t.status {
            task.status = status.parse()?;
        }
        if let Some(priority) = t.priority {
            task.priority = priority.parse()?;
        }
        task.assigned_to = t.assigned_to.as_deref().map(user_id).transpose()?;
        tasks.push(task);
    }

    ensure_unique("user email", users.iter().map(|u| u.email.as_str()))?;
    ensure_unique("user id", users.iter().map(|u| u.id))?;
    ensure_unique("project name", projects.iter().map(|p| p.name.as_str()))?;
    ensure_unique("project id", projects.iter().map(|p| p.id))?;
    ensure_unique("task id", tasks.iter().map(|t| t.id))?;
    ensure_absent(storage, tenant, &users, &projects, &tasks).await?;

    let report = SeedReport {
        tenant_id: tenant,
        users: users.iter().map(|u| (u.email.clone(), u.id)).collect(),
        projects: projects.iter().map(|p| (p.name.clone(), p.id)).collect(),
        tasks: tasks.len(),
    };

    for user in users {
        storage.users().add(user).await?;
    }
    for project in projects {
        storage.projects().add(project).await?;
    }
    for task in tasks {
        storage.tasks().add(task).await?;
    }

    info!(
        tenant = %tenant,
        users = report.users.len(),
        projects = report.projects.len(),
        tasks = report.tasks,
        "Fixture loaded"
    );
    Ok(report)
}

fn ensure_unique<K: Display + Eq + std::hash::Hash>(
    what: &str,
    keys: impl IntoIterator<Item = K>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(Error::InvalidInput(format!("duplicate {what} '{key}'")));
        }
        seen.insert(key);
    }
    Ok(())
}

/// Nothing in the fixture may already be in the store.
async fn ensure_absent(
    storage: &dyn StorageBackend,
    tenant: TenantId,
    users: &[User],
    projects: &[Project],
    tasks: &[TaskItem],
) -> Result<()> {
    let existing_users = storage.users().list(tenant).await?;
    for user in users {
        if existing_users
            .iter()
            .any(|u| u.id == user.id || u.email == user.email)
        {
            return Err(Error::InvalidInput(format!(
                "user '{}' already exists",
                user.email
            )));
        }
    }

    let existing_projects = storage.projects().list(tenant).await?;
    for project in projects {
        if existing_projects
            .iter()
            .any(|p| p.id == project.id || p.name == project.name)
        {
            return Err(Error::InvalidInput(format!(
                "project '{}' already exists",
                project.name
            )));
        }
    }

    for task in tasks {
        if storage.tasks().get(tenant, task.id).await?.is_some() {
            return Err(Error::InvalidInput(format!(
                "task {} already exists",
                task.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmassist_core::model::{ProjectStatus, TaskPriority};
    use pmassist_store::InMemoryBackend;

    const FIXTURE: &str = r#"{
        "users": [
            { "email": "pm@example.com", "display_name": "PM" },
            { "email": "dev@example.com", "display_name": "Dev" }
        ],
        "projects": [
            { "name": "Apollo", "owner": "pm@example.com", "description": "Moon" },
            { "name": "Gemini", "owner": "pm@example.com", "status": "Completed" }
        ],
        "tasks": [
            { "project": "Apollo", "title": "Design lander", "priority": "High",
              "assigned_to": "dev@example.com" },
            { "project": "Gemini", "title": "Close out", "status": "Done" }
        ]
    }"#;

    #[tokio::test]
    async fn loads_fixture_with_references() {
        let storage = InMemoryBackend::new();
        let fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();
        let report = load(&storage, fixture).await.unwrap();
        let tenant = report.tenant_id;

        assert_eq!(report.users.len(), 2);
        assert_eq!(report.tasks, 2);

        let projects = storage.projects().list(tenant).await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].status, ProjectStatus::Completed);

        let tasks = storage.tasks().list(tenant).await.unwrap();
        assert_eq!(tasks[0].project_id, projects[0].id);
        assert_eq!(tasks[0].priority, TaskPriority::High);
        assert_eq!(tasks[0].assigned_to, Some(report.users[1].1));
    }

    #[tokio::test]
    async fn bad_reference_writes_nothing() {
        let storage = InMemoryBackend::new();
        let tenant = TenantId::new();
        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "tenant_id": tenant,
            "users": [{ "email": "pm@example.com", "display_name": "PM" }],
            "projects": [{ "name": "Apollo", "owner": "nobody@example.com" }]
        }))
        .unwrap();

        let err = load(&storage, fixture).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(storage.users().list(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicates_rejected_before_any_write() {
        let storage = InMemoryBackend::new();
        let tenant = TenantId::new();
        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "tenant_id": tenant,
            "users": [
                { "email": "pm@example.com", "display_name": "PM" },
                { "email": "pm@example.com", "display_name": "PM again" }
            ]
        }))
        .unwrap();
        let err = load(&storage, fixture).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("pm@example.com")));
        assert!(storage.users().list(tenant).await.unwrap().is_empty());

        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "tenant_id": tenant,
            "users": [{ "email": "pm@example.com", "display_name": "PM" }],
            "projects": [
                { "name": "Apollo", "owner": "pm@example.com" },
                { "name": "Apollo", "owner": "pm@example.com" }
            ]
        }))
        .unwrap();
        assert!(load(&storage, fixture).await.is_err());
        assert!(storage.users().list(tenant).await.unwrap().is_empty());

        let task_id = TaskId::new();
        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "tenant_id": tenant,
            "users": [{ "email": "pm@example.com", "display_name": "PM" }],
            "projects": [{ "name": "Apollo", "owner": "pm@example.com" }],
            "tasks": [
                { "id": task_id, "project": "Apollo", "title": "One" },
                { "id": task_id, "project": "Apollo", "title": "Two" }
            ]
        }))
        .unwrap();
        assert!(load(&storage, fixture).await.is_err());
        assert!(storage.projects().list(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reseeding_is_rejected_without_partial_writes() {
        let storage = InMemoryBackend::new();
        let fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();
        let report = load(&storage, fixture).await.unwrap();
        let tenant = report.tenant_id;

        let mut again: Fixture = serde_json::from_str(FIXTURE).unwrap();
        again.tenant_id = Some(tenant);
        again.users.push(UserFixture {
            id: None,
            email: "new@example.com".into(),
            display_name: "New".into(),
        });
        assert!(load(&storage, again).await.is_err());

        assert_eq!(storage.users().list(tenant).await.unwrap().len(), 2);
        assert_eq!(storage.projects().list(tenant).await.unwrap().len(), 2);
        assert_eq!(storage.tasks().list(tenant).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bad_status_rejected() {
        let storage = InMemoryBackend::new();
        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "users": [{ "email": "pm@example.com", "display_name": "PM" }],
            "projects": [{ "name": "Apollo", "owner": "pm@example.com", "status": "Paused" }]
        }))
        .unwrap();
        assert!(load(&storage, fixture).await.is_err());
    }
}
