//! Integration tests for the row-level visibility evaluator.
//!
//! Exercises the grant catalog over an in-memory database: fail-closed
//! defaults, the admin override, bulk/point consistency, and grant
//! monotonicity.

use rockboard::db::tasks::{NewTask, TaskListFilter, TaskPatch};
use rockboard::db::Database;
use rockboard::guard::EditPolicy;
use rockboard::notify::LoggingSink;
use rockboard::types::{
    Actor, Identity, ProjectMemberRole, ProjectVisibility, TaskVisibility, UserRole,
};

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn mk_user(db: &Database, name: &str, role: UserRole) -> Identity {
    let user = db
        .create_user(name, &format!("{}@example.com", name), role)
        .expect("Failed to create user");
    Identity::Known(Actor::new(user.id, user.role))
}

fn user_id(identity: &Identity) -> String {
    identity.actor().unwrap().user_id.clone()
}

fn mk_task(db: &Database, creator: &Identity, title: &str, input: NewTask) -> String {
    let input = NewTask {
        title: title.to_string(),
        ..input
    };
    db.create_task(creator, input, TaskVisibility::Private, &LoggingSink)
        .expect("Failed to create task")
        .id
}

/// All task ids the identity can list, for bulk/point comparisons.
fn visible_ids(db: &Database, identity: &Identity) -> Vec<String> {
    let mut ids: Vec<String> = db
        .list_tasks(identity, &TaskListFilter::default())
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    ids.sort();
    ids
}

mod fail_closed {
    use super::*;

    #[test]
    fn default_visibility_hides_task_from_strangers() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);

        // Scenario 1: no explicit visibility, no assignee.
        let task_id = mk_task(&db, &alice, "write launch plan", NewTask::default());

        assert!(!db.task_visible(&bob, &task_id).unwrap());
        assert!(visible_ids(&db, &bob).is_empty());

        // Flipping to public surfaces it.
        db.update_task(
            &alice,
            &task_id,
            TaskPatch {
                visibility: Some(TaskVisibility::Public),
                ..Default::default()
            },
            EditPolicy::AnyVisible,
            &LoggingSink,
        )
        .unwrap();

        assert!(db.task_visible(&bob, &task_id).unwrap());
        assert_eq!(visible_ids(&db, &bob), vec![task_id]);
    }

    #[test]
    fn anonymous_caller_sees_nothing_even_public() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let task_id = mk_task(
            &db,
            &alice,
            "public task",
            NewTask {
                visibility: Some(TaskVisibility::Public),
                ..Default::default()
            },
        );

        let anon = Identity::Anonymous;
        assert!(!db.task_visible(&anon, &task_id).unwrap());
        assert!(visible_ids(&db, &anon).is_empty());
    }

    #[test]
    fn project_scoped_task_without_project_grants_nobody() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);

        let task_id = mk_task(
            &db,
            &alice,
            "orphaned scope",
            NewTask {
                visibility: Some(TaskVisibility::ProjectScoped),
                ..Default::default()
            },
        );

        // Absence of a project reference never grants access.
        assert!(!db.task_visible(&bob, &task_id).unwrap());
        // The creator grant still applies.
        assert!(db.task_visible(&alice, &task_id).unwrap());
    }

    #[test]
    fn group_membership_is_not_a_visibility_grant() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);

        let task_id = mk_task(&db, &alice, "group task", NewTask::default());
        let group = db.create_group(&admin, "design").unwrap();
        db.add_group_member(&admin, &group.id, &user_id(&bob)).unwrap();
        db.assign_task_to_group(&alice, &group.id, &task_id, EditPolicy::AnyVisible)
            .unwrap();

        // Bob is in the group the task is assigned to, but holds no grant.
        assert!(!db.task_visible(&bob, &task_id).unwrap());
        let filter = TaskListFilter {
            group_id: Some(group.id.clone()),
            ..Default::default()
        };
        assert!(db.list_tasks(&bob, &filter).unwrap().is_empty());

        // The creator sees it through the group filter.
        assert_eq!(db.list_tasks(&alice, &filter).unwrap().len(), 1);
    }
}

mod admin_override {
    use super::*;

    #[test]
    fn admin_sees_every_task_regardless_of_grants() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);

        let t1 = mk_task(&db, &alice, "private one", NewTask::default());
        let t2 = mk_task(&db, &bob, "private two", NewTask::default());

        assert!(db.task_visible(&admin, &t1).unwrap());
        assert!(db.task_visible(&admin, &t2).unwrap());
        assert_eq!(visible_ids(&db, &admin).len(), 2);
    }

    #[test]
    fn admin_point_check_still_reports_missing_tasks() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        assert!(!db.task_visible(&admin, "no-such-task").unwrap());
    }
}

mod grants {
    use super::*;

    #[test]
    fn primary_and_additional_assignees_see_the_task() {
        let db = setup_db();
        let creator = mk_user(&db, "carol", UserRole::Member);
        let u1 = mk_user(&db, "u1", UserRole::Member);
        let u2 = mk_user(&db, "u2", UserRole::Member);
        let u3 = mk_user(&db, "u3", UserRole::Member);

        // Scenario 2: primary assignee u1, additional assignee u2.
        let task_id = mk_task(
            &db,
            &creator,
            "ship the feature",
            NewTask {
                assigned_to: Some(user_id(&u1)),
                ..Default::default()
            },
        );
        db.add_assignee(&creator, &task_id, &user_id(&u2), EditPolicy::AnyVisible, &LoggingSink)
            .unwrap();

        assert!(db.task_visible(&u1, &task_id).unwrap());
        assert!(db.task_visible(&u2, &task_id).unwrap());
        assert!(!db.task_visible(&u3, &task_id).unwrap());

        // Removing the additional assignee revokes the grant.
        db.remove_assignee(&creator, &task_id, &user_id(&u2), EditPolicy::AnyVisible)
            .unwrap();
        assert!(!db.task_visible(&u2, &task_id).unwrap());
    }

    #[test]
    fn collaborator_grant_is_independent_of_assignment() {
        let db = setup_db();
        let creator = mk_user(&db, "carol", UserRole::Member);
        let viewer = mk_user(&db, "vera", UserRole::Member);

        let task_id = mk_task(&db, &creator, "quarterly report", NewTask::default());
        assert!(!db.task_visible(&viewer, &task_id).unwrap());

        db.add_collaborator(&creator, &task_id, &user_id(&viewer), EditPolicy::AnyVisible)
            .unwrap();
        assert!(db.task_visible(&viewer, &task_id).unwrap());

        db.remove_collaborator(&creator, &task_id, &user_id(&viewer), EditPolicy::AnyVisible)
            .unwrap();
        assert!(!db.task_visible(&viewer, &task_id).unwrap());
    }

    #[test]
    fn project_scoped_task_is_visible_to_project_members_only() {
        let db = setup_db();
        let owner = mk_user(&db, "olive", UserRole::Member);
        let member = mk_user(&db, "mike", UserRole::Member);
        let stranger = mk_user(&db, "sam", UserRole::Member);

        let project = db
            .create_project(
                &owner,
                rockboard::db::projects::NewProject {
                    title: "Q3 rock".into(),
                    owner_user_id: Some(user_id(&owner)),
                    quarter: "2026-Q3".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        db.add_project_member(&owner, &project.id, &user_id(&member), ProjectMemberRole::Member)
            .unwrap();

        let task_id = mk_task(
            &db,
            &owner,
            "scoped work",
            NewTask {
                visibility: Some(TaskVisibility::ProjectScoped),
                project_id: Some(project.id.clone()),
                ..Default::default()
            },
        );

        assert!(db.task_visible(&member, &task_id).unwrap());
        assert!(!db.task_visible(&stranger, &task_id).unwrap());

        // Project membership alone does not expose private tasks.
        let private_id = mk_task(&db, &owner, "private note", NewTask {
            project_id: Some(project.id.clone()),
            ..Default::default()
        });
        assert!(!db.task_visible(&member, &private_id).unwrap());
    }

    #[test]
    fn grant_monotonicity_only_ever_widens_visibility() {
        let db = setup_db();
        let creator = mk_user(&db, "carol", UserRole::Member);
        let user = mk_user(&db, "uma", UserRole::Member);
        let uid = user_id(&user);

        let task_id = mk_task(&db, &creator, "baseline", NewTask::default());
        assert!(!db.task_visible(&user, &task_id).unwrap());

        // Primary assignment: false -> true.
        db.update_task(
            &creator,
            &task_id,
            TaskPatch {
                assigned_to: Some(Some(uid.clone())),
                ..Default::default()
            },
            EditPolicy::AnyVisible,
            &LoggingSink,
        )
        .unwrap();
        assert!(db.task_visible(&user, &task_id).unwrap());

        // Adding further grants never flips it back.
        db.add_collaborator(&creator, &task_id, &uid, EditPolicy::AnyVisible)
            .unwrap();
        assert!(db.task_visible(&user, &task_id).unwrap());

        db.update_task(
            &creator,
            &task_id,
            TaskPatch {
                visibility: Some(TaskVisibility::Public),
                ..Default::default()
            },
            EditPolicy::AnyVisible,
            &LoggingSink,
        )
        .unwrap();
        assert!(db.task_visible(&user, &task_id).unwrap());
    }
}

mod bulk_point_consistency {
    use super::*;

    #[test]
    fn point_check_agrees_with_bulk_listing_for_every_user() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);
        let carol = mk_user(&db, "carol", UserRole::Member);

        let project = db
            .create_project(
                &alice,
                rockboard::db::projects::NewProject {
                    title: "rock".into(),
                    owner_user_id: Some(user_id(&alice)),
                    quarter: "2026-Q3".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        db.add_project_member(&alice, &project.id, &user_id(&carol), ProjectMemberRole::Viewer)
            .unwrap();

        // A spread of grant shapes.
        mk_task(&db, &alice, "private", NewTask::default());
        mk_task(&db, &alice, "public", NewTask {
            visibility: Some(TaskVisibility::Public),
            ..Default::default()
        });
        mk_task(&db, &alice, "assigned to bob", NewTask {
            assigned_to: Some(user_id(&bob)),
            ..Default::default()
        });
        mk_task(&db, &alice, "scoped", NewTask {
            visibility: Some(TaskVisibility::ProjectScoped),
            project_id: Some(project.id.clone()),
            ..Default::default()
        });

        let all_ids = visible_ids(&db, &admin);
        assert_eq!(all_ids.len(), 4);

        for identity in [&admin, &alice, &bob, &carol, &Identity::Anonymous] {
            let bulk = visible_ids(&db, identity);
            for id in &all_ids {
                let point = db.task_visible(identity, id).unwrap();
                assert_eq!(
                    point,
                    bulk.contains(id),
                    "bulk/point disagree for task {}",
                    id
                );
            }
        }
    }
}

mod project_visibility {
    use super::*;
    use rockboard::db::projects::NewProject;

    #[test]
    fn project_rules_admin_public_owner_member() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let owner = mk_user(&db, "olive", UserRole::Member);
        let member = mk_user(&db, "mike", UserRole::Member);
        let stranger = mk_user(&db, "sam", UserRole::Member);

        let private = db
            .create_project(
                &owner,
                NewProject {
                    title: "private rock".into(),
                    owner_user_id: Some(user_id(&owner)),
                    quarter: "2026-Q3".into(),
                    visibility: Some(ProjectVisibility::Private),
                    ..Default::default()
                },
            )
            .unwrap();
        let public = db
            .create_project(
                &owner,
                NewProject {
                    title: "public rock".into(),
                    owner_user_id: Some(user_id(&owner)),
                    quarter: "2026-Q3".into(),
                    visibility: Some(ProjectVisibility::Public),
                    ..Default::default()
                },
            )
            .unwrap();

        db.add_project_member(&owner, &private.id, &user_id(&member), ProjectMemberRole::Member)
            .unwrap();

        assert!(db.project_visible(&admin, &private.id).unwrap());
        assert!(db.project_visible(&owner, &private.id).unwrap());
        assert!(db.project_visible(&member, &private.id).unwrap());
        assert!(!db.project_visible(&stranger, &private.id).unwrap());

        assert!(db.project_visible(&stranger, &public.id).unwrap());
        assert!(!db.project_visible(&Identity::Anonymous, &public.id).unwrap());

        let listed = db.list_projects(&stranger, Some("2026-Q3")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public.id);
    }

    #[test]
    fn unassigned_project_is_visible_to_its_members() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let member = mk_user(&db, "mike", UserRole::Member);

        let project = db
            .create_project(
                &admin,
                NewProject {
                    title: "ownerless".into(),
                    owner_user_id: None,
                    quarter: "2026-Q3".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(!db.project_visible(&member, &project.id).unwrap());
        db.add_project_member(&admin, &project.id, &user_id(&member), ProjectMemberRole::Member)
            .unwrap();
        assert!(db.project_visible(&member, &project.id).unwrap());
    }
}
