//! Task CRUD with row-level visibility enforcement and audited mutation.
//!
//! Every read is filtered through a [`TaskScope`] and every mutation runs
//! the guard before its first write. Mutations, their audit rows, and any
//! notification enqueue share one transaction; dispatch happens after
//! commit and is best-effort.

use super::{bad_enum_value, is_constraint_violation, named_refs, now_ms, Database};
use crate::error::BoardError;
use crate::guard::{self, EditPolicy};
use crate::notify::{self, NotificationSink};
use crate::types::{
    AuditAction, Identity, Notification, NotificationKind, Task, TaskAssignee, TaskCollaborator,
    TaskPriority, TaskStatus, TaskVisibility,
};
use crate::visibility::{NamedParams, TaskScope};
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<i64>,
    pub status: Option<TaskStatus>,
    pub category_id: Option<String>,
    pub assigned_to: Option<String>,
    /// Falls back to the configured default when absent.
    pub visibility: Option<TaskVisibility>,
    pub project_id: Option<String>,
}

/// Partial update for a task. Outer `None` leaves a field alone; inner
/// `None` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<i64>>,
    pub status: Option<TaskStatus>,
    pub category_id: Option<Option<String>>,
    pub assigned_to: Option<Option<String>>,
    pub visibility: Option<TaskVisibility>,
    pub project_id: Option<Option<String>>,
}

/// Filters applied on top of (never instead of) the visibility scope.
#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
    /// Group views intersect with visibility; group assignment grants nothing.
    pub group_id: Option<String>,
    pub assigned_to: Option<String>,
}

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    let visibility: String = row.get("visibility")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: TaskPriority::parse(&priority)
            .ok_or_else(|| bad_enum_value("priority", &priority))?,
        due_date: row.get("due_date")?,
        status: TaskStatus::parse(&status).ok_or_else(|| bad_enum_value("status", &status))?,
        category_id: row.get("category_id")?,
        created_by: row.get("created_by")?,
        assigned_to: row.get("assigned_to")?,
        visibility: TaskVisibility::parse(&visibility)
            .ok_or_else(|| bad_enum_value("visibility", &visibility))?,
        project_id: row.get("project_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Point check: is this one task inside the caller's visible set?
///
/// Renders the identical predicate the bulk filter uses, wrapped in an
/// EXISTS over a single id, so the two modes cannot diverge.
pub(crate) fn task_visible_in(conn: &Connection, scope: &TaskScope, task_id: &str) -> Result<bool> {
    let mut sql = String::from("SELECT EXISTS(SELECT 1 FROM tasks t WHERE t.id = :id AND ");
    let mut params: NamedParams = vec![(":id", Box::new(task_id.to_string()))];
    scope.push_filter(&mut sql, &mut params);
    sql.push(')');

    let refs = named_refs(&params);
    let visible: bool = conn.query_row(&sql, refs.as_slice(), |row| row.get(0))?;
    Ok(visible)
}

pub(crate) fn is_additional_assignee_in(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM task_assignees WHERE task_id = ?1 AND user_id = ?2)",
        params![task_id, user_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

fn record_audit(
    conn: &Connection,
    task_id: &str,
    actor_id: &str,
    action: AuditAction,
    old_value: Option<&str>,
    new_value: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (task_id, actor_id, action, old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![task_id, actor_id, action.as_str(), old_value, new_value, now],
    )?;
    Ok(())
}

/// Insert a notification row and return it for post-commit dispatch.
fn enqueue_notification(
    conn: &Connection,
    user_id: &str,
    task_id: &str,
    kind: NotificationKind,
    message: String,
    now: i64,
) -> Result<Notification> {
    conn.execute(
        "INSERT INTO notifications (user_id, task_id, kind, message, read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![user_id, task_id, kind.as_str(), message, now],
    )?;
    let id = conn.last_insert_rowid();
    Ok(Notification {
        id,
        user_id: user_id.to_string(),
        task_id: Some(task_id.to_string()),
        kind,
        message,
        read: false,
        created_at: now,
    })
}

impl Database {
    /// Whether one specific task is visible to the caller.
    pub fn task_visible(&self, identity: &Identity, task_id: &str) -> Result<bool> {
        let scope = TaskScope::for_identity(identity);
        self.with_conn(|conn| task_visible_in(conn, &scope, task_id))
    }

    /// Create a task. The caller becomes the immutable creator.
    pub fn create_task(
        &self,
        identity: &Identity,
        input: NewTask,
        default_visibility: TaskVisibility,
        sink: &dyn NotificationSink,
    ) -> Result<Task> {
        let actor = guard::require_actor(identity)?;
        if input.title.trim().is_empty() {
            return Err(BoardError::invalid_value("title", "must not be empty").into());
        }

        let now = now_ms();
        let task = Task {
            id: Uuid::now_v7().to_string(),
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or(TaskPriority::Medium),
            due_date: input.due_date,
            status: input.status.unwrap_or(TaskStatus::Backlog),
            category_id: input.category_id,
            created_by: actor.user_id.clone(),
            assigned_to: input.assigned_to,
            visibility: input.visibility.unwrap_or(default_visibility),
            project_id: input.project_id,
            created_at: now,
            updated_at: now,
        };

        let notes = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO tasks (
                    id, title, description, priority, due_date, status, category_id,
                    created_by, assigned_to, visibility, project_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date,
                    task.status.as_str(),
                    task.category_id,
                    task.created_by,
                    task.assigned_to,
                    task.visibility.as_str(),
                    task.project_id,
                    task.created_at,
                    task.updated_at,
                ],
            );
            if let Err(e) = inserted {
                let err: anyhow::Error = e.into();
                if is_constraint_violation(&err) {
                    return Err(BoardError::conflict(
                        "Task references a category, project, or user that does not exist",
                    )
                    .into());
                }
                return Err(err);
            }

            record_audit(
                &tx,
                &task.id,
                &actor.user_id,
                AuditAction::Created,
                None,
                Some(&task.title),
                task.created_at,
            )?;

            let mut notes = Vec::new();
            if let Some(ref assignee) = task.assigned_to {
                notes.push(enqueue_notification(
                    &tx,
                    assignee,
                    &task.id,
                    NotificationKind::Assigned,
                    format!("You have been assigned: {}", task.title),
                    task.created_at,
                )?);
            }

            tx.commit()?;
            Ok(notes)
        })?;

        notify::dispatch_all(sink, &notes);
        Ok(task)
    }

    /// Visibility-checked point read. A hidden-but-existing task reads the
    /// same as a missing one.
    pub fn get_task(&self, identity: &Identity, task_id: &str) -> Result<Task> {
        let scope = TaskScope::for_identity(identity);
        self.with_conn(|conn| {
            if !task_visible_in(conn, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            get_task_internal(conn, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id).into())
        })
    }

    /// List the caller's visible tasks, optionally narrowed by filters.
    pub fn list_tasks(&self, identity: &Identity, filter: &TaskListFilter) -> Result<Vec<Task>> {
        let scope = TaskScope::for_identity(identity);
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT t.* FROM tasks t WHERE ");
            let mut bind: NamedParams = Vec::new();
            scope.push_filter(&mut sql, &mut bind);

            if let Some(status) = filter.status {
                sql.push_str(" AND t.status = :status");
                bind.push((":status", Box::new(status.as_str().to_string())));
            }
            if let Some(ref category_id) = filter.category_id {
                sql.push_str(" AND t.category_id = :category");
                bind.push((":category", Box::new(category_id.clone())));
            }
            if let Some(ref project_id) = filter.project_id {
                sql.push_str(" AND t.project_id = :project");
                bind.push((":project", Box::new(project_id.clone())));
            }
            if let Some(ref group_id) = filter.group_id {
                sql.push_str(
                    " AND t.id IN (SELECT task_id FROM group_assignments WHERE group_id = :group)",
                );
                bind.push((":group", Box::new(group_id.clone())));
            }
            if let Some(ref assigned_to) = filter.assigned_to {
                sql.push_str(" AND t.assigned_to = :assignee");
                bind.push((":assignee", Box::new(assigned_to.clone())));
            }

            sql.push_str(" ORDER BY t.created_at DESC");

            let refs = named_refs(&bind);
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Update a task. One audit row per logically changed field; if the
    /// primary assignee changed to a user, exactly one notification to the
    /// new assignee (never the old one), all in one transaction.
    pub fn update_task(
        &self,
        identity: &Identity,
        task_id: &str,
        patch: TaskPatch,
        policy: EditPolicy,
        sink: &dyn NotificationSink,
    ) -> Result<Task> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        let (task, notes) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;

            let is_extra = is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            let now = now_ms();
            let new_title = patch.title.unwrap_or_else(|| task.title.clone());
            let new_description = patch.description.unwrap_or_else(|| task.description.clone());
            let new_priority = patch.priority.unwrap_or(task.priority);
            let new_due_date = patch.due_date.unwrap_or(task.due_date);
            let new_status = patch.status.unwrap_or(task.status);
            let new_category = patch.category_id.unwrap_or_else(|| task.category_id.clone());
            let new_assignee = patch.assigned_to.unwrap_or_else(|| task.assigned_to.clone());
            let new_visibility = patch.visibility.unwrap_or(task.visibility);
            let new_project = patch.project_id.unwrap_or_else(|| task.project_id.clone());

            if new_title.trim().is_empty() {
                return Err(BoardError::invalid_value("title", "must not be empty").into());
            }

            let updated = tx.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, priority = ?3, due_date = ?4, status = ?5,
                    category_id = ?6, assigned_to = ?7, visibility = ?8, project_id = ?9,
                    updated_at = ?10
                 WHERE id = ?11",
                params![
                    new_title,
                    new_description,
                    new_priority.as_str(),
                    new_due_date,
                    new_status.as_str(),
                    new_category,
                    new_assignee,
                    new_visibility.as_str(),
                    new_project,
                    now,
                    task_id,
                ],
            );
            if let Err(e) = updated {
                let err: anyhow::Error = e.into();
                if is_constraint_violation(&err) {
                    return Err(BoardError::conflict(
                        "Task references a category, project, or user that does not exist",
                    )
                    .into());
                }
                return Err(err);
            }

            // One audit row per logically changed field.
            let mut changes: Vec<(AuditAction, Option<String>, Option<String>)> = Vec::new();
            if new_title != task.title {
                changes.push((
                    AuditAction::TitleChanged,
                    Some(task.title.clone()),
                    Some(new_title.clone()),
                ));
            }
            if new_description != task.description {
                changes.push((
                    AuditAction::DescriptionChanged,
                    task.description.clone(),
                    new_description.clone(),
                ));
            }
            if new_priority != task.priority {
                changes.push((
                    AuditAction::PriorityChanged,
                    Some(task.priority.as_str().to_string()),
                    Some(new_priority.as_str().to_string()),
                ));
            }
            if new_due_date != task.due_date {
                changes.push((
                    AuditAction::DueDateChanged,
                    task.due_date.map(|d| d.to_string()),
                    new_due_date.map(|d| d.to_string()),
                ));
            }
            if new_status != task.status {
                changes.push((
                    AuditAction::StatusChanged,
                    Some(task.status.as_str().to_string()),
                    Some(new_status.as_str().to_string()),
                ));
            }
            if new_category != task.category_id {
                changes.push((
                    AuditAction::CategoryChanged,
                    task.category_id.clone(),
                    new_category.clone(),
                ));
            }
            if new_assignee != task.assigned_to {
                changes.push((
                    AuditAction::AssignmentChanged,
                    task.assigned_to.clone(),
                    new_assignee.clone(),
                ));
            }
            if new_visibility != task.visibility {
                changes.push((
                    AuditAction::VisibilityChanged,
                    Some(task.visibility.as_str().to_string()),
                    Some(new_visibility.as_str().to_string()),
                ));
            }
            if new_project != task.project_id {
                changes.push((
                    AuditAction::ProjectChanged,
                    task.project_id.clone(),
                    new_project.clone(),
                ));
            }

            for (action, old, new) in &changes {
                record_audit(
                    &tx,
                    task_id,
                    &actor.user_id,
                    *action,
                    old.as_deref(),
                    new.as_deref(),
                    now,
                )?;
            }

            let mut notes = Vec::new();
            if new_assignee != task.assigned_to {
                if let Some(ref assignee) = new_assignee {
                    notes.push(enqueue_notification(
                        &tx,
                        assignee,
                        task_id,
                        NotificationKind::Assigned,
                        format!("You have been assigned: {}", new_title),
                        now,
                    )?);
                }
            }

            tx.commit()?;

            Ok((
                Task {
                    title: new_title,
                    description: new_description,
                    priority: new_priority,
                    due_date: new_due_date,
                    status: new_status,
                    category_id: new_category,
                    assigned_to: new_assignee,
                    visibility: new_visibility,
                    project_id: new_project,
                    updated_at: now,
                    ..task
                },
                notes,
            ))
        })?;

        notify::dispatch_all(sink, &notes);
        Ok(task)
    }

    /// Delete a task. Hard delete; assignees, collaborators, group
    /// assignments, audit rows, and notifications cascade with it.
    pub fn delete_task(
        &self,
        identity: &Identity,
        task_id: &str,
        policy: EditPolicy,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;

            let is_extra = is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Add an additional assignee. The new assignee is notified.
    pub fn add_assignee(
        &self,
        identity: &Identity,
        task_id: &str,
        user_id: &str,
        policy: EditPolicy,
        sink: &dyn NotificationSink,
    ) -> Result<TaskAssignee> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        let (assignee, notes) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;

            let is_extra = is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            let now = now_ms();
            let inserted = tx.execute(
                "INSERT INTO task_assignees (task_id, user_id, assigned_by, assigned_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, user_id, actor.user_id, now],
            );
            if let Err(e) = inserted {
                let err: anyhow::Error = e.into();
                if is_constraint_violation(&err) {
                    return Err(BoardError::conflict(format!(
                        "User {} is already assigned or does not exist",
                        user_id
                    ))
                    .into());
                }
                return Err(err);
            }

            record_audit(
                &tx,
                task_id,
                &actor.user_id,
                AuditAction::AssigneeAdded,
                None,
                Some(user_id),
                now,
            )?;

            let note = enqueue_notification(
                &tx,
                user_id,
                task_id,
                NotificationKind::Assigned,
                format!("You have been assigned: {}", task.title),
                now,
            )?;

            tx.commit()?;

            Ok((
                TaskAssignee {
                    task_id: task_id.to_string(),
                    user_id: user_id.to_string(),
                    assigned_by: actor.user_id.clone(),
                    assigned_at: now,
                },
                vec![note],
            ))
        })?;

        notify::dispatch_all(sink, &notes);
        Ok(assignee)
    }

    /// Remove an additional assignee.
    pub fn remove_assignee(
        &self,
        identity: &Identity,
        task_id: &str,
        user_id: &str,
        policy: EditPolicy,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;

            let is_extra = is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            let now = now_ms();
            let removed = tx.execute(
                "DELETE FROM task_assignees WHERE task_id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            if removed > 0 {
                record_audit(
                    &tx,
                    task_id,
                    &actor.user_id,
                    AuditAction::AssigneeRemoved,
                    Some(user_id),
                    None,
                    now,
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Add a collaborator (view grant independent of assignment).
    pub fn add_collaborator(
        &self,
        identity: &Identity,
        task_id: &str,
        user_id: &str,
        policy: EditPolicy,
    ) -> Result<TaskCollaborator> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;

            let is_extra = is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            let now = now_ms();
            let inserted = tx.execute(
                "INSERT INTO task_collaborators (task_id, user_id, added_at) VALUES (?1, ?2, ?3)",
                params![task_id, user_id, now],
            );
            if let Err(e) = inserted {
                let err: anyhow::Error = e.into();
                if is_constraint_violation(&err) {
                    return Err(BoardError::conflict(format!(
                        "User {} is already a collaborator or does not exist",
                        user_id
                    ))
                    .into());
                }
                return Err(err);
            }

            record_audit(
                &tx,
                task_id,
                &actor.user_id,
                AuditAction::CollaboratorAdded,
                None,
                Some(user_id),
                now,
            )?;

            tx.commit()?;

            Ok(TaskCollaborator {
                task_id: task_id.to_string(),
                user_id: user_id.to_string(),
                added_at: now,
            })
        })
    }

    /// Remove a collaborator.
    pub fn remove_collaborator(
        &self,
        identity: &Identity,
        task_id: &str,
        user_id: &str,
        policy: EditPolicy,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;

            let is_extra = is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            let now = now_ms();
            let removed = tx.execute(
                "DELETE FROM task_collaborators WHERE task_id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            if removed > 0 {
                record_audit(
                    &tx,
                    task_id,
                    &actor.user_id,
                    AuditAction::CollaboratorRemoved,
                    Some(user_id),
                    None,
                    now,
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Additional assignees for a visible task.
    pub fn list_assignees(&self, identity: &Identity, task_id: &str) -> Result<Vec<TaskAssignee>> {
        let scope = TaskScope::for_identity(identity);
        self.with_conn(|conn| {
            if !task_visible_in(conn, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let mut stmt = conn.prepare(
                "SELECT task_id, user_id, assigned_by, assigned_at
                 FROM task_assignees WHERE task_id = ?1 ORDER BY assigned_at",
            )?;
            let assignees = stmt
                .query_map(params![task_id], |row| {
                    Ok(TaskAssignee {
                        task_id: row.get(0)?,
                        user_id: row.get(1)?,
                        assigned_by: row.get(2)?,
                        assigned_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(assignees)
        })
    }

    /// Collaborators for a visible task.
    pub fn list_collaborators(
        &self,
        identity: &Identity,
        task_id: &str,
    ) -> Result<Vec<TaskCollaborator>> {
        let scope = TaskScope::for_identity(identity);
        self.with_conn(|conn| {
            if !task_visible_in(conn, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let mut stmt = conn.prepare(
                "SELECT task_id, user_id, added_at
                 FROM task_collaborators WHERE task_id = ?1 ORDER BY added_at",
            )?;
            let collaborators = stmt
                .query_map(params![task_id], |row| {
                    Ok(TaskCollaborator {
                        task_id: row.get(0)?,
                        user_id: row.get(1)?,
                        added_at: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(collaborators)
        })
    }
}
