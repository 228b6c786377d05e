//! Row-level visibility evaluation for tasks and projects.
//!
//! A scope is derived once per request from the caller's [`Identity`] and
//! renders a single SQL predicate. The same rendered predicate backs both
//! bulk listing (`push_filter` appended to a SELECT) and point checks
//! (`EXISTS` over one id), so list and detail views can never drift apart.
//!
//! Membership-style grants render as `IN (sub-select)` set tests against
//! the join tables rather than per-row loops: for T tasks and G grant rows
//! the evaluator costs O(T + G).

use crate::types::{Identity, UserRole};
use rusqlite::ToSql;

/// Named parameters accumulated while rendering a filter.
pub type NamedParams = Vec<(&'static str, Box<dyn ToSql>)>;

/// One independent mechanism that grants a user access to a task.
///
/// The evaluator is the OR-fold of [`TaskGrant::ALL`]; adding a mechanism
/// means adding a variant here, never touching the composition logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGrant {
    /// `visibility = public` is visible to every authenticated user.
    PublicVisibility,
    /// The creator always sees their own task.
    Creator,
    /// The primary assignee.
    PrimaryAssignee,
    /// Any additional assignee on the join table.
    AdditionalAssignee,
    /// Collaborators hold a view grant independent of assignment.
    Collaborator,
    /// Project-scoped tasks are visible to members of the linked project.
    ProjectScoped,
}

impl TaskGrant {
    pub const ALL: [TaskGrant; 6] = [
        TaskGrant::PublicVisibility,
        TaskGrant::Creator,
        TaskGrant::PrimaryAssignee,
        TaskGrant::AdditionalAssignee,
        TaskGrant::Collaborator,
        TaskGrant::ProjectScoped,
    ];

    /// SQL clause over task alias `t`, with the caller bound as `:uid`.
    ///
    /// The match is exhaustive on purpose: a new visibility level or grant
    /// mechanism forces a review of every clause here.
    pub fn sql_clause(&self) -> &'static str {
        match self {
            TaskGrant::PublicVisibility => "t.visibility = 'public'",
            TaskGrant::Creator => "t.created_by = :uid",
            TaskGrant::PrimaryAssignee => "t.assigned_to = :uid",
            TaskGrant::AdditionalAssignee => {
                "t.id IN (SELECT task_id FROM task_assignees WHERE user_id = :uid)"
            }
            TaskGrant::Collaborator => {
                "t.id IN (SELECT task_id FROM task_collaborators WHERE user_id = :uid)"
            }
            TaskGrant::ProjectScoped => {
                "(t.visibility = 'project-scoped' AND t.project_id IN \
                 (SELECT project_id FROM project_members WHERE user_id = :uid))"
            }
        }
    }
}

/// The set of tasks a caller may see, as a composable predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    /// Admin override: unrestricted, no grant clauses evaluated.
    All,
    /// Unauthenticated callers see nothing.
    Deny,
    /// Visibility is the OR of the grant catalog for this user id.
    Granted(String),
}

impl TaskScope {
    /// Derive the scope for a request. The admin escape hatch is decided
    /// here, before any clause exists to evaluate.
    pub fn for_identity(identity: &Identity) -> Self {
        match identity {
            Identity::Anonymous => TaskScope::Deny,
            Identity::Known(actor) if actor.role == UserRole::Admin => TaskScope::All,
            Identity::Known(actor) => TaskScope::Granted(actor.user_id.clone()),
        }
    }

    /// Append this scope as a boolean predicate over task alias `t`.
    pub fn push_filter(&self, sql: &mut String, params: &mut NamedParams) {
        match self {
            TaskScope::All => sql.push_str("1"),
            TaskScope::Deny => sql.push_str("0"),
            TaskScope::Granted(user_id) => {
                sql.push('(');
                for (i, grant) in TaskGrant::ALL.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" OR ");
                    }
                    sql.push_str(grant.sql_clause());
                }
                sql.push(')');
                params.push((":uid", Box::new(user_id.clone())));
            }
        }
    }
}

/// The set of projects a caller may see.
///
/// Projects carry their own rule set: admins see all, everyone sees
/// `public`, an owner always sees their own, and otherwise a
/// `project_members` row is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    All,
    Deny,
    Granted(String),
}

impl ProjectScope {
    pub fn for_identity(identity: &Identity) -> Self {
        match identity {
            Identity::Anonymous => ProjectScope::Deny,
            Identity::Known(actor) if actor.role == UserRole::Admin => ProjectScope::All,
            Identity::Known(actor) => ProjectScope::Granted(actor.user_id.clone()),
        }
    }

    /// Append this scope as a boolean predicate over project alias `p`.
    pub fn push_filter(&self, sql: &mut String, params: &mut NamedParams) {
        match self {
            ProjectScope::All => sql.push_str("1"),
            ProjectScope::Deny => sql.push_str("0"),
            ProjectScope::Granted(user_id) => {
                sql.push_str(
                    "(p.visibility = 'public' \
                     OR p.owner_user_id = :uid \
                     OR p.id IN (SELECT project_id FROM project_members WHERE user_id = :uid))",
                );
                params.push((":uid", Box::new(user_id.clone())));
            }
        }
    }
}
