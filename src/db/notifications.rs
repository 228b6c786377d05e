//! Notification reads and read-flag updates. Enqueueing happens inside
//! task mutation transactions.

use super::{bad_enum_value, Database};
use crate::error::BoardError;
use crate::guard;
use crate::types::{Identity, Notification, NotificationKind};
use anyhow::Result;
use rusqlite::{params, Row};

fn parse_notification_row(row: &Row) -> rusqlite::Result<Notification> {
    let kind: String = row.get("kind")?;
    Ok(Notification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        task_id: row.get("task_id")?,
        kind: NotificationKind::parse(&kind).ok_or_else(|| bad_enum_value("kind", &kind))?,
        message: row.get("message")?,
        read: row.get("read")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// The caller's own notifications, newest first. Admins may read any
    /// user's; everyone else only their own.
    pub fn notifications_for_user(
        &self,
        identity: &Identity,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let actor = guard::require_actor(identity)?;
        if actor.user_id != user_id && !actor.is_admin() {
            return Err(
                BoardError::forbidden("You can only read your own notifications").into(),
            );
        }

        self.with_conn(|conn| {
            let sql = if unread_only {
                "SELECT * FROM notifications WHERE user_id = ?1 AND read = 0 ORDER BY id DESC"
            } else {
                "SELECT * FROM notifications WHERE user_id = ?1 ORDER BY id DESC"
            };
            let mut stmt = conn.prepare(sql)?;
            let notifications = stmt
                .query_map(params![user_id], parse_notification_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notifications)
        })
    }

    /// Mark one of the caller's notifications as read.
    pub fn mark_notification_read(&self, identity: &Identity, notification_id: i64) -> Result<()> {
        let actor = guard::require_actor(identity)?;

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![notification_id, actor.user_id],
            )?;
            if updated == 0 {
                return Err(
                    BoardError::not_found("Notification", &notification_id.to_string()).into(),
                );
            }
            Ok(())
        })
    }

    /// Unread count for the in-app bell badge.
    pub fn unread_count(&self, identity: &Identity, user_id: &str) -> Result<i64> {
        let actor = guard::require_actor(identity)?;
        if actor.user_id != user_id && !actor.is_admin() {
            return Err(
                BoardError::forbidden("You can only read your own notifications").into(),
            );
        }
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
