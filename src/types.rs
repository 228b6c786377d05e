//! Core domain types for the rockboard access-control core.
//!
//! Every enum here is a closed set used by authorization logic. Parsers
//! return `None` for unrecognized values so that callers fail closed
//! instead of silently granting access.

use serde::{Deserialize, Serialize};

/// Application-level user role.
///
/// Ordered by privilege (`Member < Manager < Admin`) for administrative
/// gates. Task visibility does not consult the role except for the blanket
/// admin override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Member,
    Manager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(UserRole::Member),
            "manager" => Some(UserRole::Manager),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Board column a task sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Backlog,
    Doing,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "Backlog",
            TaskStatus::Doing => "Doing",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Done => "Done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Backlog" => Some(TaskStatus::Backlog),
            "Doing" => Some(TaskStatus::Doing),
            "Blocked" => Some(TaskStatus::Blocked),
            "Done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

/// Task visibility level. The wire name for `ProjectScoped` is
/// `project-scoped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskVisibility {
    Public,
    Private,
    #[serde(rename = "project-scoped")]
    ProjectScoped,
}

impl TaskVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskVisibility::Public => "public",
            TaskVisibility::Private => "private",
            TaskVisibility::ProjectScoped => "project-scoped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(TaskVisibility::Public),
            "private" => Some(TaskVisibility::Private),
            "project-scoped" => Some(TaskVisibility::ProjectScoped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    OnTrack,
    AtRisk,
    OffTrack,
    Complete,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "not_started",
            ProjectStatus::OnTrack => "on_track",
            ProjectStatus::AtRisk => "at_risk",
            ProjectStatus::OffTrack => "off_track",
            ProjectStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(ProjectStatus::NotStarted),
            "on_track" => Some(ProjectStatus::OnTrack),
            "at_risk" => Some(ProjectStatus::AtRisk),
            "off_track" => Some(ProjectStatus::OffTrack),
            "complete" => Some(ProjectStatus::Complete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectVisibility {
    Private,
    Members,
    Public,
}

impl ProjectVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectVisibility::Private => "private",
            ProjectVisibility::Members => "members",
            ProjectVisibility::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(ProjectVisibility::Private),
            "members" => Some(ProjectVisibility::Members),
            "public" => Some(ProjectVisibility::Public),
            _ => None,
        }
    }
}

/// Role a user holds within one project. `Owner` is the only role that
/// passes the project mutation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectMemberRole {
    Owner,
    Member,
    Viewer,
}

impl ProjectMemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectMemberRole::Owner => "owner",
            ProjectMemberRole::Member => "member",
            ProjectMemberRole::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(ProjectMemberRole::Owner),
            "member" => Some(ProjectMemberRole::Member),
            "viewer" => Some(ProjectMemberRole::Viewer),
            _ => None,
        }
    }
}

/// Kind of change recorded in the audit log. One row per logically
/// distinct changed field, never one per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    TitleChanged,
    DescriptionChanged,
    StatusChanged,
    PriorityChanged,
    DueDateChanged,
    CategoryChanged,
    VisibilityChanged,
    ProjectChanged,
    AssignmentChanged,
    AssigneeAdded,
    AssigneeRemoved,
    CollaboratorAdded,
    CollaboratorRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::TitleChanged => "title_changed",
            AuditAction::DescriptionChanged => "description_changed",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::PriorityChanged => "priority_changed",
            AuditAction::DueDateChanged => "due_date_changed",
            AuditAction::CategoryChanged => "category_changed",
            AuditAction::VisibilityChanged => "visibility_changed",
            AuditAction::ProjectChanged => "project_changed",
            AuditAction::AssignmentChanged => "assignment_changed",
            AuditAction::AssigneeAdded => "assignee_added",
            AuditAction::AssigneeRemoved => "assignee_removed",
            AuditAction::CollaboratorAdded => "collaborator_added",
            AuditAction::CollaboratorRemoved => "collaborator_removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(AuditAction::Created),
            "title_changed" => Some(AuditAction::TitleChanged),
            "description_changed" => Some(AuditAction::DescriptionChanged),
            "status_changed" => Some(AuditAction::StatusChanged),
            "priority_changed" => Some(AuditAction::PriorityChanged),
            "due_date_changed" => Some(AuditAction::DueDateChanged),
            "category_changed" => Some(AuditAction::CategoryChanged),
            "visibility_changed" => Some(AuditAction::VisibilityChanged),
            "project_changed" => Some(AuditAction::ProjectChanged),
            "assignment_changed" => Some(AuditAction::AssignmentChanged),
            "assignee_added" => Some(AuditAction::AssigneeAdded),
            "assignee_removed" => Some(AuditAction::AssigneeRemoved),
            "collaborator_added" => Some(AuditAction::CollaboratorAdded),
            "collaborator_removed" => Some(AuditAction::CollaboratorRemoved),
            _ => None,
        }
    }
}

/// Kind of notification enqueued for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assigned => "assigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(NotificationKind::Assigned),
            _ => None,
        }
    }
}

/// An application user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<i64>,
    pub status: TaskStatus,
    pub category_id: Option<String>,
    /// Immutable after creation.
    pub created_by: String,
    /// Primary assignee.
    pub assigned_to: Option<String>,
    pub visibility: TaskVisibility,
    pub project_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An additional assignee beyond the primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignee {
    pub task_id: String,
    pub user_id: String,
    pub assigned_by: String,
    pub assigned_at: i64,
}

/// A broader "can view" grant independent of assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCollaborator {
    pub task_id: String,
    pub user_id: String,
    pub added_at: i64,
}

/// A quarterly goal ("rock"). Unowned projects are permitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub owner_user_id: Option<String>,
    pub quarter: String,
    /// Unique within (owner, quarter); gaps after deletion are permitted.
    pub rock_number: i32,
    pub status: ProjectStatus,
    pub progress: i32,
    pub visibility: ProjectVisibility,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectMemberRole,
    pub added_at: i64,
}

/// A user group. Assignment target and view filter, not a visibility grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub task_id: String,
    pub actor_id: String,
    pub action: AuditAction,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub task_id: Option<String>,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

/// A verified, provisioned actor: the output of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// The caller's identity as attached to a request. Anything short of a
/// verified actor denies everything downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Known(Actor),
}

impl Identity {
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Identity::Anonymous => None,
            Identity::Known(actor) => Some(actor),
        }
    }
}
