//! Audit trail reads. Writes happen inside the task mutation
//! transactions; rows only ever leave via the task-delete cascade.

use super::{bad_enum_value, Database};
use crate::error::BoardError;
use crate::types::{AuditAction, AuditEntry, Identity};
use crate::visibility::TaskScope;
use anyhow::Result;
use rusqlite::{params, Row};

fn parse_audit_row(row: &Row) -> rusqlite::Result<AuditEntry> {
    let action: String = row.get("action")?;
    Ok(AuditEntry {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        actor_id: row.get("actor_id")?,
        action: AuditAction::parse(&action).ok_or_else(|| bad_enum_value("action", &action))?,
        old_value: row.get("old_value")?,
        new_value: row.get("new_value")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Audit history for a task the caller can see, oldest first.
    pub fn audit_for_task(&self, identity: &Identity, task_id: &str) -> Result<Vec<AuditEntry>> {
        let scope = TaskScope::for_identity(identity);
        self.with_conn(|conn| {
            if !super::tasks::task_visible_in(conn, &scope, task_id)? {
                return Err(BoardError::not_found("Task", task_id).into());
            }
            let mut stmt = conn.prepare(
                "SELECT * FROM audit_log WHERE task_id = ?1 ORDER BY id",
            )?;
            let entries = stmt
                .query_map(params![task_id], parse_audit_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }
}
