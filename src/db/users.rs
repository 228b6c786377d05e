//! User records and role administration.

use super::{is_constraint_violation, now_ms, Database};
use crate::error::BoardError;
use crate::guard;
use crate::types::{Identity, User, UserRole};
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

pub(crate) fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: UserRole::parse(&role).ok_or_else(|| super::bad_enum_value("role", &role))?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn get_user_internal(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;
    match stmt.query_row(params![user_id], parse_user_row) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a user. Used by admin provisioning and by identity
    /// resolution; a duplicate email is a conflict, not a silent merge.
    pub fn create_user(&self, name: &str, email: &str, role: UserRole) -> Result<User> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, name, email, role.as_str(), now, now],
            )?;
            Ok(())
        });

        if let Err(err) = result {
            if is_constraint_violation(&err) {
                return Err(
                    BoardError::conflict(format!("Email already in use: {}", email)).into(),
                );
            }
            return Err(err);
        }

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE email = ?1")?;
            match stmt.query_row(params![email], parse_user_row) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users ORDER BY name")?;
            let users = stmt
                .query_map([], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Change a user's role. Admin only; never on yourself.
    pub fn update_user_role(
        &self,
        identity: &Identity,
        target_user_id: &str,
        role: UserRole,
    ) -> Result<User> {
        let actor = guard::require_actor(identity)?;
        guard::check_role_change(actor, target_user_id)?;

        self.with_conn(|conn| {
            let user = get_user_internal(conn, target_user_id)?
                .ok_or_else(|| BoardError::not_found("User", target_user_id))?;

            let now = now_ms();
            conn.execute(
                "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                params![role.as_str(), now, target_user_id],
            )?;

            Ok(User {
                role,
                updated_at: now,
                ..user
            })
        })
    }

    /// Remove a user. Admin only; never on yourself.
    ///
    /// Authored tasks survive (created_by carries no foreign key); the
    /// user's primary assignments null out and their membership,
    /// assignee, collaborator, and notification rows cascade away. Rocks
    /// they own move into the unowned sequence with fresh numbers first:
    /// letting the FK's SET NULL rewrite the index key would collide with
    /// any unowned rock already holding the same number.
    pub fn delete_user(&self, identity: &Identity, target_user_id: &str) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        guard::check_user_delete(actor, target_user_id)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned: Vec<(String, String)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, quarter FROM projects WHERE owner_user_id = ?1
                     ORDER BY quarter, rock_number",
                )?;
                stmt.query_map(params![target_user_id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?
            };

            let now = now_ms();
            for (project_id, quarter) in owned {
                // Recomputed per rock: each move extends the unowned
                // sequence the next MAX sees.
                let next: i32 = tx.query_row(
                    "SELECT COALESCE(MAX(rock_number), 0) + 1 FROM projects
                     WHERE owner_user_id IS NULL AND quarter = ?1",
                    params![quarter],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "UPDATE projects
                     SET owner_user_id = NULL, rock_number = ?1, updated_at = ?2
                     WHERE id = ?3",
                    params![next, now, project_id],
                )?;
            }

            let deleted =
                tx.execute("DELETE FROM users WHERE id = ?1", params![target_user_id])?;
            if deleted == 0 {
                return Err(BoardError::not_found("User", target_user_id).into());
            }

            tx.commit()?;
            Ok(())
        })
    }
}
