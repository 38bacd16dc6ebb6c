//! Tenant-scoped entities the assistant reads and writes.
//!
//! Projects, tasks, and users are owned by the surrounding CRUD system; the
//! assistant only reads them. Style profiles are owned here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::ids::{ProfileId, ProjectId, TaskId, TenantId, UserId};
use crate::store::TenantScoped;

/// The authenticated caller. Always derived from the principal, never from a
/// request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl Principal {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }
}

// ── Users ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn new(tenant_id: TenantId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            tenant_id,
            email: email.into(),
            display_name: display_name.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

// ── Projects ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Archived => "Archived",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "Archived" => Ok(Self::Archived),
            other => Err(Error::InvalidInput(format!("unknown project status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub owner_id: UserId,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(tenant_id: TenantId, owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            tenant_id,
            name: name.into(),
            description: None,
            status: ProjectStatus::Active,
            owner_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }
}

// ── Tasks ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "InProgress",
            Self::Done => "Done",
            Self::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Todo" => Ok(Self::Todo),
            "InProgress" => Ok(Self::InProgress),
            "Done" => Ok(Self::Done),
            "Blocked" => Ok(Self::Blocked),
            other => Err(Error::InvalidInput(format!("unknown task status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Critical" => Ok(Self::Critical),
            other => Err(Error::InvalidInput(format!("unknown task priority '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TaskItem {
    pub fn new(tenant_id: TenantId, project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            tenant_id,
            project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assigned_to: None,
            due_date: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ── Style profiles ───────────────────────────────────────────────────────

/// How the assistant should sound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Direct,
    Soft,
    Technical,
}

impl Tone {
    pub const ALL: [Tone; 3] = [Tone::Direct, Tone::Soft, Tone::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "Direct",
            Self::Soft => "Soft",
            Self::Technical => "Technical",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = Error;

    /// Case-insensitive; anything outside the enumeration is invalid input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "tone must be one of Direct, Soft, Technical (got '{s}')"
                ))
            })
    }
}

/// Per-user communication preferences. At most one per (tenant, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub id: ProfileId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub tone: Tone,
    pub prefer_bullets: bool,
    pub include_risks_by_default: bool,
    /// Part of the contract; the query pipeline does not read it.
    pub auto_create_tasks: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StyleProfile {
    /// The profile every user starts with.
    pub fn default_for(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            id: ProfileId::new(),
            tenant_id,
            user_id,
            tone: Tone::Direct,
            prefer_bullets: true,
            include_risks_by_default: true,
            auto_create_tasks: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleProfilePatch {
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub prefer_bullets: Option<bool>,
    #[serde(default)]
    pub include_risks_by_default: Option<bool>,
    #[serde(default)]
    pub auto_create_tasks: Option<bool>,
}

impl StyleProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.prefer_bullets.is_none()
            && self.include_risks_by_default.is_none()
            && self.auto_create_tasks.is_none()
    }

    /// Apply the patch in place and stamp `updated_at`.
    pub fn apply_to(&self, profile: &mut StyleProfile) {
        if let Some(tone) = self.tone {
            profile.tone = tone;
        }
        if let Some(v) = self.prefer_bullets {
            profile.prefer_bullets = v;
        }
        if let Some(v) = self.include_risks_by_default {
            profile.include_risks_by_default = v;
        }
        if let Some(v) = self.auto_create_tasks {
            profile.auto_create_tasks = v;
        }
        profile.updated_at = Some(Utc::now());
    }
}

// ── Tenant scoping ───────────────────────────────────────────────────────

impl TenantScoped for User {
    type Id = UserId;
    const KIND: &'static str = "User";

    fn id(&self) -> UserId {
        self.id
    }
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl TenantScoped for Project {
    type Id = ProjectId;
    const KIND: &'static str = "Project";

    fn id(&self) -> ProjectId {
        self.id
    }
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl TenantScoped for TaskItem {
    type Id = TaskId;
    const KIND: &'static str = "Task";

    fn id(&self) -> TaskId {
        self.id
    }
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl TenantScoped for StyleProfile {
    type Id = ProfileId;
    const KIND: &'static str = "Style profile";

    fn id(&self) -> ProfileId {
        self.id
    }
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_values() {
        let p = StyleProfile::default_for(TenantId::new(), UserId::new());
        assert_eq!(p.tone, Tone::Direct);
        assert!(p.prefer_bullets);
        assert!(p.include_risks_by_default);
        assert!(!p.auto_create_tasks);
        assert!(p.updated_at.is_none());
    }

    #[test]
    fn tone_parsing_is_case_insensitive() {
        assert_eq!("technical".parse::<Tone>().unwrap(), Tone::Technical);
        assert_eq!("SOFT".parse::<Tone>().unwrap(), Tone::Soft);
        let err = "Snarky".parse::<Tone>().unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("Direct, Soft, Technical"));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut p = StyleProfile::default_for(TenantId::new(), UserId::new());
        let patch = StyleProfilePatch {
            tone: Some(Tone::Soft),
            prefer_bullets: Some(false),
            ..Default::default()
        };
        patch.apply_to(&mut p);
        assert_eq!(p.tone, Tone::Soft);
        assert!(!p.prefer_bullets);
        assert!(p.include_risks_by_default);
        assert!(p.updated_at.is_some());
    }

    #[test]
    fn empty_patch_detected() {
        assert!(StyleProfilePatch::default().is_empty());
        let patch = StyleProfilePatch {
            auto_create_tasks: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done, TaskStatus::Blocked] {
            assert_eq!(s.as_str().parse::<TaskStatus>().unwrap(), s);
        }
        assert_eq!("Archived".parse::<ProjectStatus>().unwrap(), ProjectStatus::Archived);
        assert!("Urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn task_builder_defaults() {
        let t = TaskItem::new(TenantId::new(), ProjectId::new(), "Write docs")
            .with_priority(TaskPriority::High);
        assert_eq!(t.status, TaskStatus::Todo);
        assert_eq!(t.priority, TaskPriority::High);
        assert!(t.description.is_none());
    }
}
