//! Mutation guard: authorization decisions evaluated strictly before any
//! write. Every function here is pure over the actor and the target row;
//! the database layer calls them inside the transaction, before the first
//! UPDATE or DELETE is issued, so denial never needs a rollback.

use crate::error::BoardError;
use crate::types::{Actor, Identity, Project, ProjectMemberRole, Task, UserRole};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Policy for who may edit or delete a visible task.
///
/// `AnyVisible` reproduces the legacy board behavior where every
/// authenticated user may mutate any task they can see. `Restricted`
/// additionally requires a stake in the task or manager rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    #[default]
    AnyVisible,
    Restricted,
}

/// Require a verified actor, denying anonymous callers outright.
pub fn require_actor(identity: &Identity) -> Result<&Actor> {
    identity
        .actor()
        .ok_or_else(|| BoardError::unauthenticated().into())
}

/// Whether the actor may edit or delete a task they can already see.
///
/// `is_additional_assignee` is the join-table fact the task row itself
/// cannot answer; callers resolve it inside the same transaction.
pub fn can_edit_task(
    actor: &Actor,
    task: &Task,
    is_additional_assignee: bool,
    policy: EditPolicy,
) -> bool {
    match policy {
        EditPolicy::AnyVisible => true,
        EditPolicy::Restricted => {
            task.created_by == actor.user_id
                || task.assigned_to.as_deref() == Some(actor.user_id.as_str())
                || is_additional_assignee
                || actor.role >= UserRole::Manager
        }
    }
}

/// Gate for task edit/delete. Visibility has already been established;
/// this enforces the configured edit policy on top.
pub fn check_task_mutation(
    actor: &Actor,
    task: &Task,
    is_additional_assignee: bool,
    policy: EditPolicy,
) -> Result<()> {
    if can_edit_task(actor, task, is_additional_assignee, policy) {
        Ok(())
    } else {
        Err(BoardError::forbidden("You do not have permission to modify this task").into())
    }
}

/// Gate for project update/delete and member management: admin, the
/// project's owner, or a user holding an `owner`-role member row.
pub fn check_project_mutation(
    actor: &Actor,
    project: &Project,
    member_role: Option<ProjectMemberRole>,
) -> Result<()> {
    if actor.is_admin()
        || project.owner_user_id.as_deref() == Some(actor.user_id.as_str())
        || member_role == Some(ProjectMemberRole::Owner)
    {
        Ok(())
    } else {
        Err(BoardError::forbidden("Only project owners or admins can update this project").into())
    }
}

/// Gate for group create/update/member management: admin or manager.
pub fn check_group_manage(actor: &Actor) -> Result<()> {
    if actor.role >= UserRole::Manager {
        Ok(())
    } else {
        Err(BoardError::forbidden("Only admins or managers can manage groups").into())
    }
}

/// Gate for admin-only administrative actions (group delete, category
/// management, user role changes, user removal).
pub fn check_admin(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BoardError::forbidden(format!("Only admins can {}", action)).into())
    }
}

/// Self-protection: an actor may not change their own role.
pub fn check_role_change(actor: &Actor, target_user_id: &str) -> Result<()> {
    check_admin(actor, "change user roles")?;
    if actor.user_id == target_user_id {
        return Err(BoardError::forbidden("Cannot change your own role").into());
    }
    Ok(())
}

/// Self-protection: an actor may not remove themselves.
pub fn check_user_delete(actor: &Actor, target_user_id: &str) -> Result<()> {
    check_admin(actor, "remove users")?;
    if actor.user_id == target_user_id {
        return Err(BoardError::forbidden("Cannot remove your own account").into());
    }
    Ok(())
}
