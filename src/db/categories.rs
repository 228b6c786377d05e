//! Task categories.
//!
//! Deleting a category retargets every referencing task to a fallback
//! category inside the same transaction; if the fallback is missing the
//! whole operation fails and nothing dangles.

use super::{is_constraint_violation, now_ms, Database};
use crate::error::BoardError;
use crate::guard;
use crate::types::{Category, Identity};
use anyhow::Result;
use rusqlite::{params, Row};
use uuid::Uuid;

fn parse_category_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Create a category. Admin only.
    pub fn create_category(&self, identity: &Identity, name: &str) -> Result<Category> {
        let actor = guard::require_actor(identity)?;
        guard::check_admin(actor, "manage categories")?;

        if name.trim().is_empty() {
            return Err(BoardError::invalid_value("name", "must not be empty").into());
        }

        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, name, now],
            )?;
            Ok(())
        });
        if let Err(err) = result {
            if is_constraint_violation(&err) {
                return Err(
                    BoardError::conflict(format!("Category already exists: {}", name)).into(),
                );
            }
            return Err(err);
        }

        Ok(Category {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM categories WHERE name = ?1")?;
            match stmt.query_row(params![name], parse_category_row) {
                Ok(category) => Ok(Some(category)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM categories ORDER BY name")?;
            let categories = stmt
                .query_map([], parse_category_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(categories)
        })
    }

    /// Delete a category, moving its tasks to the fallback. Admin only.
    pub fn delete_category(
        &self,
        identity: &Identity,
        category_id: &str,
        fallback_id: &str,
    ) -> Result<()> {
        let actor = guard::require_actor(identity)?;
        guard::check_admin(actor, "manage categories")?;

        if category_id == fallback_id {
            return Err(
                BoardError::invalid_value("fallback", "cannot fall back to the deleted category")
                    .into(),
            );
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let fallback_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
                params![fallback_id],
                |row| row.get(0),
            )?;
            if !fallback_exists {
                return Err(BoardError::conflict(format!(
                    "Fallback category does not exist: {}",
                    fallback_id
                ))
                .into());
            }

            tx.execute(
                "UPDATE tasks SET category_id = ?1 WHERE category_id = ?2",
                params![fallback_id, category_id],
            )?;
            let deleted =
                tx.execute("DELETE FROM categories WHERE id = ?1", params![category_id])?;
            if deleted == 0 {
                return Err(BoardError::not_found("Category", category_id).into());
            }

            tx.commit()?;
            Ok(())
        })
    }
}
