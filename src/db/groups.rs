//! User groups: assignment targets and view filters.
//!
//! A group assignment surfaces a task in the group's filtered view; it is
//! advisory and never grants visibility (the evaluator does not consult
//! group membership).

use super::{is_constraint_violation, now_ms, Database};
use crate::error::BoardError;
use crate::guard::{self, EditPolicy};
use crate::types::{Group, Identity};
use crate::visibility::TaskScope;
use anyhow::Result;
use rusqlite::{params, Row};
use uuid::Uuid;

fn parse_group_row(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Create a group. Admins and managers only.
    pub fn create_group(&self, identity: &Identity, name: &str) -> Result<Group> {
        let actor = guard::require_actor(identity)?;
        guard::check_group_manage(actor)?;

        if name.trim().is_empty() {
            return Err(BoardError::invalid_value("name", "must not be empty").into());
        }

        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_groups (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, name, now],
            )?;
            Ok(())
        });
        if let Err(err) = result {
            if is_constraint_violation(&err) {
                return Err(BoardError::conflict(format!("Group already exists: {}", name)).into());
            }
            return Err(err);
        }

        Ok(Group {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    /// Rename a group. Admins and managers only.
    pub fn rename_group(&self, identity: &Identity, group_id: &str, name: &str) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        guard::check_group_manage(actor)?;

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE user_groups SET name = ?1 WHERE id = ?2",
                params![name, group_id],
            )?;
            if updated == 0 {
                return Err(BoardError::not_found("Group", group_id).into());
            }
            Ok(())
        })
    }

    /// Delete a group. Admin only. Membership and task assignments detach
    /// in the same statement's cascade, so no orphaned references remain.
    pub fn delete_group(&self, identity: &Identity, group_id: &str) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        guard::check_admin(actor, "delete groups")?;

        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM user_groups WHERE id = ?1", params![group_id])?;
            if deleted == 0 {
                return Err(BoardError::not_found("Group", group_id).into());
            }
            Ok(())
        })
    }

    pub fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM user_groups WHERE id = ?1")?;
            match stmt.query_row(params![group_id], parse_group_row) {
                Ok(group) => Ok(Some(group)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM user_groups ORDER BY name")?;
            let groups = stmt
                .query_map([], parse_group_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(groups)
        })
    }

    /// Invite a user into a group. Admins and managers only.
    pub fn add_group_member(
        &self,
        identity: &Identity,
        group_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        guard::check_group_manage(actor)?;

        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_group_members (group_id, user_id, added_at) VALUES (?1, ?2, ?3)",
                params![group_id, user_id, now_ms()],
            )?;
            Ok(())
        });
        if let Err(err) = result {
            if is_constraint_violation(&err) {
                return Err(BoardError::conflict(format!(
                    "User {} is already a member or the group/user does not exist",
                    user_id
                ))
                .into());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Remove a user from a group. Admins and managers only.
    pub fn remove_group_member(
        &self,
        identity: &Identity,
        group_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        guard::check_group_manage(actor)?;

        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM user_group_members WHERE group_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn list_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM user_group_members WHERE group_id = ?1 ORDER BY added_at",
            )?;
            let members = stmt
                .query_map(params![group_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
    }

    /// Surface a task in a group's view. The task must be visible and
    /// editable by the caller; the grant catalog is unaffected.
    pub fn assign_task_to_group(
        &self,
        identity: &Identity,
        group_id: &str,
        task_id: &str,
        policy: EditPolicy,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !super::tasks::task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = super::tasks::get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;
            let is_extra = super::tasks::is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            let inserted = tx.execute(
                "INSERT INTO group_assignments (group_id, task_id, assigned_at) VALUES (?1, ?2, ?3)",
                params![group_id, task_id, now_ms()],
            );
            if let Err(e) = inserted {
                let err: anyhow::Error = e.into();
                if is_constraint_violation(&err) {
                    return Err(BoardError::conflict(
                        "Task is already assigned to this group or the group does not exist",
                    )
                    .into());
                }
                return Err(err);
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Remove a task from a group's view.
    pub fn unassign_task_from_group(
        &self,
        identity: &Identity,
        group_id: &str,
        task_id: &str,
        policy: EditPolicy,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        let scope = TaskScope::for_identity(identity);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !super::tasks::task_visible_in(&tx, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let task = super::tasks::get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::not_found("Task", task_id))?;
            let is_extra = super::tasks::is_additional_assignee_in(&tx, task_id, &actor.user_id)?;
            guard::check_task_mutation(actor, &task, is_extra, policy)?;

            tx.execute(
                "DELETE FROM group_assignments WHERE group_id = ?1 AND task_id = ?2",
                params![group_id, task_id],
            )?;

            tx.commit()?;
            Ok(())
        })
    }
}
