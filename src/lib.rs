//! Storage-backed core for a team task board.
//!
//! The centerpiece is the row-level visibility evaluator
//! ([`visibility`]): for any caller it derives one predicate that filters
//! bulk listings and answers point checks with identical semantics, OR-ing
//! an explicit catalog of grants (creator, assignees, collaborators,
//! public visibility, project membership) and failing closed everywhere
//! else. The mutation guard ([`guard`]) layers ownership and role rules on
//! top before any write; the task layer records an audit row per changed
//! field and enqueues assignment notifications in the same transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod identity;
pub mod logging;
pub mod notify;
pub mod types;
pub mod visibility;
