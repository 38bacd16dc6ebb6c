//! Context building: a point-in-time snapshot of the tenant's projects and
//! tasks, plus the facts and sources derived from it.
//!
//! The two reads are issued concurrently and are not transactional; projects
//! and tasks may reflect slightly different moments. Nothing here is
//! bounded. Bounds are applied later by the prompt assembler.

use pmassist_config::PromptLimits;
use pmassist_core::error::Result;
use pmassist_core::ids::{ProjectId, TenantId};
use pmassist_core::model::{Project, ProjectStatus, TaskItem};
use pmassist_core::session::Source;
use pmassist_core::store::StorageBackend;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Everything the pipeline knows about the tenant for one query.
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    /// All projects visible to the tenant, in store order.
    pub projects: Vec<Project>,
    /// All tasks visible to the tenant, in store order.
    pub tasks: Vec<TaskItem>,
    /// The requested project, when it resolved.
    pub focus: Option<Project>,
    /// Summary facts, sent to the generator as additional context.
    pub facts: Map<String, Value>,
    /// What fed the answer, most relevant first.
    pub sources: Vec<Source>,
}

impl ContextBundle {
    /// Derive facts and sources from already-loaded data. Pure: identical
    /// inputs give identical bundles.
    pub fn from_snapshot(
        projects: Vec<Project>,
        tasks: Vec<TaskItem>,
        project_id: Option<ProjectId>,
        limits: &PromptLimits,
    ) -> Self {
        let mut facts = Map::new();

        let focus = project_id.and_then(|id| projects.iter().find(|p| p.id == id).cloned());

        if let Some(project) = &focus {
            facts.insert("project_name".into(), json!(project.name));
            facts.insert("project_status".into(), json!(project.status.as_str()));
            facts.insert(
                "project_description".into(),
                json!(project.description.clone().unwrap_or_default()),
            );
        }

        // Task facts are recorded for any requested id, even one that
        // no longer resolves to a project.
        if let Some(id) = project_id {
            let project_tasks: Vec<Value> = tasks
                .iter()
                .filter(|t| t.project_id == id)
                .map(|t| {
                    json!({
                        "title": t.title,
                        "status": t.status.as_str(),
                        "priority": t.priority.as_str(),
                    })
                })
                .collect();
            facts.insert("project_task_count".into(), json!(project_tasks.len()));
            facts.insert("project_tasks".into(), Value::Array(project_tasks));
        }

        facts.insert("total_projects".into(), json!(projects.len()));
        facts.insert("total_tasks".into(), json!(tasks.len()));
        facts.insert(
            "active_projects".into(),
            json!(
                projects
                    .iter()
                    .filter(|p| p.status == ProjectStatus::Active)
                    .count()
            ),
        );

        let sources = prioritized_sources(&projects, &tasks, project_id, limits);

        Self {
            projects,
            tasks,
            focus,
            facts,
            sources,
        }
    }
}

/// Projects then tasks. The focused project and its tasks go first within
/// their group; each group is capped separately.
fn prioritized_sources(
    projects: &[Project],
    tasks: &[TaskItem],
    focus: Option<ProjectId>,
    limits: &PromptLimits,
) -> Vec<Source> {
    let is_focus = |id: ProjectId| focus == Some(id);

    let ordered_projects = projects
        .iter()
        .filter(|p| is_focus(p.id))
        .chain(projects.iter().filter(|p| !is_focus(p.id)));

    let ordered_tasks = tasks
        .iter()
        .filter(|t| is_focus(t.project_id))
        .chain(tasks.iter().filter(|t| !is_focus(t.project_id)));

    ordered_projects
        .take(limits.max_source_projects)
        .map(|p| Source::project(p.id, p.name.clone(), p.description.clone()))
        .chain(
            ordered_tasks
                .take(limits.max_source_tasks)
                .map(|t| Source::task(t.id, t.title.clone(), t.description.clone())),
        )
        .collect()
}

/// Reads tenant data and produces a [`ContextBundle`].
#[derive(Clone)]
pub struct ContextBuilder {
    storage: Arc<dyn StorageBackend>,
    limits: PromptLimits,
}

impl ContextBuilder {
    pub fn new(storage: Arc<dyn StorageBackend>, limits: PromptLimits) -> Self {
        Self { storage, limits }
    }

    /// Snapshot the tenant. Both reads must complete before this returns;
    /// either failing aborts the build.
    pub async fn build(&self, tenant: TenantId, project_id: Option<ProjectId>) -> Result<ContextBundle> {
        let (projects, tasks) = tokio::try_join!(
            self.storage.projects().list(tenant),
            self.storage.tasks().list(tenant),
        )?;

        debug!(
            tenant = %tenant,
            projects = projects.len(),
            tasks = tasks.len(),
            "Context snapshot loaded"
        );

        Ok(ContextBundle::from_snapshot(
            projects,
            tasks,
            project_id,
            &self.limits,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmassist_core::ids::UserId;
    use pmassist_core::model::{TaskPriority, TaskStatus};
    use pmassist_core::session::SourceKind;

    fn fixture() -> (Vec<Project>, Vec<TaskItem>) {
        let tenant = TenantId::new();
        let owner = UserId::new();
        let apollo = Project::new(tenant, owner, "Apollo").with_description("Moonshot");
        let gemini = Project::new(tenant, owner, "Gemini").with_status(ProjectStatus::Completed);
        let mercury = Project::new(tenant, owner, "Mercury");
        let tasks = vec![
            TaskItem::new(tenant, gemini.id, "Close out"),
            TaskItem::new(tenant, apollo.id, "Design lander")
                .with_status(TaskStatus::InProgress)
                .with_priority(TaskPriority::High),
            TaskItem::new(tenant, apollo.id, "Pick crew"),
        ];
        (vec![apollo, gemini, mercury], tasks)
    }

    #[test]
    fn aggregate_facts_always_present() {
        let (projects, tasks) = fixture();
        let bundle = ContextBundle::from_snapshot(projects, tasks, None, &PromptLimits::default());
        assert_eq!(bundle.facts["total_projects"], 3);
        assert_eq!(bundle.facts["total_tasks"], 3);
        assert_eq!(bundle.facts["active_projects"], 2);
        assert!(!bundle.facts.contains_key("project_name"));
        assert!(bundle.focus.is_none());
    }

    #[test]
    fn focused_project_facts() {
        let (projects, tasks) = fixture();
        let apollo = projects[0].id;
        let bundle =
            ContextBundle::from_snapshot(projects, tasks, Some(apollo), &PromptLimits::default());

        assert_eq!(bundle.facts["project_name"], "Apollo");
        assert_eq!(bundle.facts["project_status"], "Active");
        assert_eq!(bundle.facts["project_description"], "Moonshot");
        assert_eq!(bundle.facts["project_task_count"], 2);
        assert_eq!(
            bundle.facts["project_tasks"][0],
            json!({"title": "Design lander", "status": "InProgress", "priority": "High"})
        );
        assert_eq!(bundle.focus.map(|p| p.name), Some("Apollo".to_string()));
    }

    #[test]
    fn unknown_project_keeps_empty_task_facts() {
        let (projects, tasks) = fixture();
        let bundle = ContextBundle::from_snapshot(
            projects,
            tasks,
            Some(ProjectId::new()),
            &PromptLimits::default(),
        );
        assert!(!bundle.facts.contains_key("project_name"));
        assert_eq!(bundle.facts["project_task_count"], 0);
    }

    #[test]
    fn sources_put_focus_first() {
        let (projects, tasks) = fixture();
        let apollo = projects[0].id;
        let gemini = projects[1].id;

        let bundle = ContextBundle::from_snapshot(
            projects.clone(),
            tasks.clone(),
            Some(apollo),
            &PromptLimits::default(),
        );
        let names: Vec<_> = bundle.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["Apollo", "Gemini", "Mercury", "Design lander", "Pick crew", "Close out"]
        );
        assert_eq!(bundle.sources[0].kind, SourceKind::Project);
        assert_eq!(bundle.sources[3].kind, SourceKind::Task);

        let bundle =
            ContextBundle::from_snapshot(projects, tasks, Some(gemini), &PromptLimits::default());
        let names: Vec<_> = bundle.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["Gemini", "Apollo", "Mercury", "Close out", "Design lander", "Pick crew"]
        );
    }

    #[test]
    fn sources_capped_per_kind() {
        let tenant = TenantId::new();
        let owner = UserId::new();
        let projects: Vec<_> = (0..8)
            .map(|i| Project::new(tenant, owner, format!("P{i}")))
            .collect();
        let tasks: Vec<_> = (0..8)
            .map(|i| TaskItem::new(tenant, projects[0].id, format!("T{i}")))
            .collect();
        let limits = PromptLimits::default();
        let bundle = ContextBundle::from_snapshot(projects, tasks, None, &limits);
        assert_eq!(bundle.sources.len(), 10);
        assert_eq!(bundle.sources[4].name, "P4");
        assert_eq!(bundle.sources[5].name, "T0");
    }

    #[test]
    fn snapshot_is_deterministic() {
        let (projects, tasks) = fixture();
        let id = Some(projects[1].id);
        let a = ContextBundle::from_snapshot(projects.clone(), tasks.clone(), id, &PromptLimits::default());
        let b = ContextBundle::from_snapshot(projects, tasks, id, &PromptLimits::default());
        assert_eq!(a.facts, b.facts);
        assert_eq!(a.sources, b.sources);
    }
}
