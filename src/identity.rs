//! Identity resolution.
//!
//! Authentication itself is external; this module maps a verified
//! `(external id, email)` pair onto an application user, provisioning a
//! `member`-role record the first time an identity is seen. Anything short
//! of a verified identity resolves to [`Identity::Anonymous`], which every
//! evaluator and guard denies.

use crate::db::Database;
use crate::types::{Actor, Identity, UserRole};
use anyhow::Result;
use tracing::info;

/// The output of the external identity provider for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: Option<String>,
}

impl VerifiedIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Resolve a request's identity, auto-provisioning first-time users.
pub fn resolve_identity(db: &Database, verified: Option<VerifiedIdentity>) -> Result<Identity> {
    let Some(verified) = verified else {
        return Ok(Identity::Anonymous);
    };

    if let Some(user) = db.get_user_by_email(&verified.email)? {
        return Ok(Identity::Known(Actor::new(user.id, user.role)));
    }

    // First sight of this identity: provision a member-role record. The
    // display name falls back to the email local part.
    let name = verified.name.unwrap_or_else(|| {
        verified
            .email
            .split('@')
            .next()
            .unwrap_or(verified.email.as_str())
            .to_string()
    });
    let user = db.create_user(&name, &verified.email, UserRole::Member)?;
    info!(email = %user.email, "auto-provisioned user {}", user.id);

    Ok(Identity::Known(Actor::new(user.id, user.role)))
}
