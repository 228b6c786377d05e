//! Project ("rock") CRUD and membership.
//!
//! Rock sequence numbers are assigned inside the insert transaction and
//! backed by a unique index over (owner, quarter, rock_number); a losing
//! concurrent insert retries with a fresh number instead of handing out a
//! duplicate. Deleted numbers are never re-compacted.

use super::{
    bad_enum_value, is_constraint_violation, is_fk_violation, is_unique_violation, named_refs,
    now_ms, Database,
};
use crate::error::BoardError;
use crate::guard;
use crate::types::{
    Identity, Project, ProjectMember, ProjectMemberRole, ProjectStatus, ProjectVisibility,
};
use crate::visibility::{NamedParams, ProjectScope};
use anyhow::Result;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use uuid::Uuid;

const ROCK_SEQUENCE_RETRIES: u32 = 5;

/// Input for creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub title: String,
    pub owner_user_id: Option<String>,
    pub quarter: String,
    pub status: Option<ProjectStatus>,
    pub visibility: Option<ProjectVisibility>,
}

/// Partial update for a project.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub owner_user_id: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub progress: Option<i32>,
    pub visibility: Option<ProjectVisibility>,
}

pub(crate) fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    let status: String = row.get("status")?;
    let visibility: String = row.get("visibility")?;

    Ok(Project {
        id: row.get("id")?,
        title: row.get("title")?,
        owner_user_id: row.get("owner_user_id")?,
        quarter: row.get("quarter")?,
        rock_number: row.get("rock_number")?,
        status: ProjectStatus::parse(&status).ok_or_else(|| bad_enum_value("status", &status))?,
        progress: row.get("progress")?,
        visibility: ProjectVisibility::parse(&visibility)
            .ok_or_else(|| bad_enum_value("visibility", &visibility))?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn get_project_internal(conn: &Connection, project_id: &str) -> Result<Option<Project>> {
    let mut stmt = conn.prepare("SELECT * FROM projects WHERE id = ?1")?;
    match stmt.query_row(params![project_id], parse_project_row) {
        Ok(project) => Ok(Some(project)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Same predicate as the bulk project filter, over one id.
fn project_visible_in(conn: &Connection, scope: &ProjectScope, project_id: &str) -> Result<bool> {
    let mut sql = String::from("SELECT EXISTS(SELECT 1 FROM projects p WHERE p.id = :id AND ");
    let mut bind: NamedParams = vec![(":id", Box::new(project_id.to_string()))];
    scope.push_filter(&mut sql, &mut bind);
    sql.push(')');

    let refs = named_refs(&bind);
    let visible: bool = conn.query_row(&sql, refs.as_slice(), |row| row.get(0))?;
    Ok(visible)
}

fn member_role_internal(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectMemberRole>> {
    let mut stmt =
        conn.prepare("SELECT role FROM project_members WHERE project_id = ?1 AND user_id = ?2")?;
    match stmt.query_row(params![project_id, user_id], |row| row.get::<_, String>(0)) {
        Ok(role) => Ok(Some(
            ProjectMemberRole::parse(&role).ok_or_else(|| bad_enum_value("role", &role))?,
        )),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Common prologue for project mutations: visibility, then ownership.
/// Invisible projects read as missing; visible-but-unowned is forbidden.
fn check_mutation_in(
    conn: &Connection,
    identity: &Identity,
    project_id: &str,
) -> Result<Project> {
    let actor = guard::require_actor(identity)?;
    let scope = ProjectScope::for_identity(identity);

    if !project_visible_in(conn, &scope, project_id)? {
        return Err(BoardError::not_found("Project", project_id).into());
    }
    let project = get_project_internal(conn, project_id)?
        .ok_or_else(|| BoardError::not_found("Project", project_id))?;

    let member_role = member_role_internal(conn, project_id, &actor.user_id)?;
    guard::check_project_mutation(actor, &project, member_role)?;
    Ok(project)
}

impl Database {
    /// Create a project. The creator receives an `owner`-role member row;
    /// the rock number is the next in the (owner, quarter) sequence.
    pub fn create_project(&self, identity: &Identity, input: NewProject) -> Result<Project> {
        let actor = guard::require_actor(identity)?;
        if input.title.trim().is_empty() {
            return Err(BoardError::invalid_value("title", "must not be empty").into());
        }
        if input.quarter.trim().is_empty() {
            return Err(BoardError::invalid_value("quarter", "must not be empty").into());
        }

        let mut last_err = None;
        for _ in 0..ROCK_SEQUENCE_RETRIES {
            let result = self.try_create_project(&input, &actor.user_id);
            match result {
                Ok(project) => return Ok(project),
                Err(err) if is_unique_violation(&err) => {
                    // Lost the sequence race; take a fresh number.
                    last_err = Some(err);
                }
                Err(err) if is_fk_violation(&err) => {
                    return Err(BoardError::conflict(
                        "Project references an owner that does not exist",
                    )
                    .into());
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            BoardError::conflict("Could not assign a rock number").into()
        }))
    }

    fn try_create_project(&self, input: &NewProject, creator_id: &str) -> Result<Project> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let status = input.status.unwrap_or(ProjectStatus::NotStarted);
        let visibility = input.visibility.unwrap_or(ProjectVisibility::Members);

        self.with_conn_mut(|conn| {
            // Immediate: the MAX read below must happen under the write
            // lock, or a concurrent creator can read the same number.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let rock_number: i32 = tx.query_row(
                "SELECT COALESCE(MAX(rock_number), 0) + 1 FROM projects
                 WHERE COALESCE(owner_user_id, '') = COALESCE(?1, '') AND quarter = ?2",
                params![input.owner_user_id, input.quarter],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO projects (
                    id, title, owner_user_id, quarter, rock_number, status, progress,
                    visibility, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
                params![
                    id,
                    input.title,
                    input.owner_user_id,
                    input.quarter,
                    rock_number,
                    status.as_str(),
                    visibility.as_str(),
                    now,
                    now,
                ],
            )?;

            tx.execute(
                "INSERT INTO project_members (project_id, user_id, role, added_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, creator_id, ProjectMemberRole::Owner.as_str(), now],
            )?;

            tx.commit()?;

            Ok(Project {
                id: id.clone(),
                title: input.title.clone(),
                owner_user_id: input.owner_user_id.clone(),
                quarter: input.quarter.clone(),
                rock_number,
                status,
                progress: 0,
                visibility,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Whether one specific project is visible to the caller.
    pub fn project_visible(&self, identity: &Identity, project_id: &str) -> Result<bool> {
        let scope = ProjectScope::for_identity(identity);
        self.with_conn(|conn| project_visible_in(conn, &scope, project_id))
    }

    /// Visibility-checked point read.
    pub fn get_project(&self, identity: &Identity, project_id: &str) -> Result<Project> {
        let scope = ProjectScope::for_identity(identity);
        self.with_conn(|conn| {
            if !project_visible_in(conn, &scope, project_id)? {
                return Err(BoardError::not_found("Project", project_id).into());
            }
            get_project_internal(conn, project_id)?
                .ok_or_else(|| BoardError::not_found("Project", project_id).into())
        })
    }

    /// List the caller's visible projects, optionally narrowed to a quarter.
    pub fn list_projects(&self, identity: &Identity, quarter: Option<&str>) -> Result<Vec<Project>> {
        let scope = ProjectScope::for_identity(identity);
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT p.* FROM projects p WHERE ");
            let mut bind: NamedParams = Vec::new();
            scope.push_filter(&mut sql, &mut bind);

            if let Some(quarter) = quarter {
                sql.push_str(" AND p.quarter = :quarter");
                bind.push((":quarter", Box::new(quarter.to_string())));
            }

            sql.push_str(" ORDER BY p.quarter, p.rock_number");

            let refs = named_refs(&bind);
            let mut stmt = conn.prepare(&sql)?;
            let projects = stmt
                .query_map(refs.as_slice(), parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// Update a project. Admin, owner, or an owner-role member only.
    pub fn update_project(
        &self,
        identity: &Identity,
        project_id: &str,
        patch: ProjectPatch,
    ) -> Result<Project> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let project = check_mutation_in(&tx, identity, project_id)?;

            let now = now_ms();
            let new_title = patch.title.unwrap_or_else(|| project.title.clone());
            let new_owner = patch
                .owner_user_id
                .unwrap_or_else(|| project.owner_user_id.clone());
            let new_status = patch.status.unwrap_or(project.status);
            let new_progress = patch.progress.unwrap_or(project.progress);
            let new_visibility = patch.visibility.unwrap_or(project.visibility);

            if new_title.trim().is_empty() {
                return Err(BoardError::invalid_value("title", "must not be empty").into());
            }
            if !(0..=100).contains(&new_progress) {
                return Err(BoardError::invalid_value("progress", "must be 0-100").into());
            }

            tx.execute(
                "UPDATE projects SET
                    title = ?1, owner_user_id = ?2, status = ?3, progress = ?4,
                    visibility = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    new_title,
                    new_owner,
                    new_status.as_str(),
                    new_progress,
                    new_visibility.as_str(),
                    now,
                    project_id,
                ],
            )?;

            tx.commit()?;

            Ok(Project {
                title: new_title,
                owner_user_id: new_owner,
                status: new_status,
                progress: new_progress,
                visibility: new_visibility,
                updated_at: now,
                ..project
            })
        })
    }

    /// Delete a project. Same gate as update; member rows cascade and
    /// tasks pointing at it fall back to no project.
    pub fn delete_project(&self, identity: &Identity, project_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            check_mutation_in(&tx, identity, project_id)?;
            tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Add a member. Project mutation gate applies.
    pub fn add_project_member(
        &self,
        identity: &Identity,
        project_id: &str,
        user_id: &str,
        role: ProjectMemberRole,
    ) -> Result<ProjectMember> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            check_mutation_in(&tx, identity, project_id)?;

            let now = now_ms();
            let inserted = tx.execute(
                "INSERT INTO project_members (project_id, user_id, role, added_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![project_id, user_id, role.as_str(), now],
            );
            if let Err(e) = inserted {
                let err: anyhow::Error = e.into();
                if is_constraint_violation(&err) {
                    return Err(BoardError::conflict(format!(
                        "User {} is already a member or does not exist",
                        user_id
                    ))
                    .into());
                }
                return Err(err);
            }

            tx.commit()?;

            Ok(ProjectMember {
                project_id: project_id.to_string(),
                user_id: user_id.to_string(),
                role,
                added_at: now,
            })
        })
    }

    /// Remove a member. Project mutation gate applies.
    pub fn remove_project_member(
        &self,
        identity: &Identity,
        project_id: &str,
        user_id: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            check_mutation_in(&tx, identity, project_id)?;
            tx.execute(
                "DELETE FROM project_members WHERE project_id = ?1 AND user_id = ?2",
                params![project_id, user_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Change a member's role. Project mutation gate applies.
    pub fn set_project_member_role(
        &self,
        identity: &Identity,
        project_id: &str,
        user_id: &str,
        role: ProjectMemberRole,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            check_mutation_in(&tx, identity, project_id)?;
            let updated = tx.execute(
                "UPDATE project_members SET role = ?1 WHERE project_id = ?2 AND user_id = ?3",
                params![role.as_str(), project_id, user_id],
            )?;
            if updated == 0 {
                return Err(BoardError::not_found("Project member", user_id).into());
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Members of a visible project.
    pub fn list_project_members(
        &self,
        identity: &Identity,
        project_id: &str,
    ) -> Result<Vec<ProjectMember>> {
        let scope = ProjectScope::for_identity(identity);
        self.with_conn(|conn| {
            if !project_visible_in(conn, &scope, project_id)? {
                return Err(BoardError::not_found("Project", project_id).into());
            }
            let mut stmt = conn.prepare(
                "SELECT project_id, user_id, role, added_at
                 FROM project_members WHERE project_id = ?1 ORDER BY added_at",
            )?;
            let members = stmt
                .query_map(params![project_id], |row| {
                    let role: String = row.get(2)?;
                    Ok(ProjectMember {
                        project_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: ProjectMemberRole::parse(&role)
                            .ok_or_else(|| bad_enum_value("role", &role))?,
                        added_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
    }
}
