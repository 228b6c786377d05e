//! End-to-end authorization tests: the mutation guard as observed through
//! the database API. Unit coverage of the pure decision functions lives in
//! `src/guard.rs`; these tests confirm the wiring, the error codes, and
//! that hidden resources read as missing rather than forbidden.

use rockboard::db::projects::{NewProject, ProjectPatch};
use rockboard::db::tasks::{NewTask, TaskPatch};
use rockboard::db::Database;
use rockboard::error::{code_of, ErrorCode};
use rockboard::guard::EditPolicy;
use rockboard::notify::LoggingSink;
use rockboard::types::{
    Actor, Identity, ProjectMemberRole, ProjectStatus, TaskStatus, TaskVisibility, UserRole,
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

fn mk_task(db: &Database, creator: &Identity, input: NewTask) -> String {
    db.create_task(creator, input, TaskVisibility::Private, &LoggingSink)
        .expect("Failed to create task")
        .id
}

fn status_patch(status: TaskStatus) -> TaskPatch {
    TaskPatch {
        status: Some(status),
        ..Default::default()
    }
}

mod task_mutation {
    use super::*;

    #[test]
    fn hidden_task_reads_as_missing_not_forbidden() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);
        let task_id = mk_task(&db, &alice, NewTask {
            title: "secret".into(),
            ..Default::default()
        });

        let err = db.get_task(&bob, &task_id).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::NotFound));

        let err = db
            .update_task(&bob, &task_id, status_patch(TaskStatus::Doing), EditPolicy::AnyVisible, &LoggingSink)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::NotFound));

        let err = db.delete_task(&bob, &task_id, EditPolicy::AnyVisible).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::NotFound));
    }

    #[test]
    fn any_visible_policy_lets_strangers_edit_public_tasks() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);
        let task_id = mk_task(&db, &alice, NewTask {
            title: "board item".into(),
            visibility: Some(TaskVisibility::Public),
            ..Default::default()
        });

        db.update_task(&bob, &task_id, status_patch(TaskStatus::Doing), EditPolicy::AnyVisible, &LoggingSink)
            .unwrap();
        assert_eq!(db.get_task(&bob, &task_id).unwrap().status, TaskStatus::Doing);
    }

    #[test]
    fn restricted_policy_forbids_visible_but_uninvolved_editors() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);
        let manager = mk_user(&db, "mgr", UserRole::Manager);
        let task_id = mk_task(&db, &alice, NewTask {
            title: "board item".into(),
            visibility: Some(TaskVisibility::Public),
            ..Default::default()
        });

        // Visible but no stake: forbidden, not missing.
        let err = db
            .update_task(&bob, &task_id, status_patch(TaskStatus::Doing), EditPolicy::Restricted, &LoggingSink)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        let err = db.delete_task(&bob, &task_id, EditPolicy::Restricted).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        // Creator and managers pass.
        db.update_task(&alice, &task_id, status_patch(TaskStatus::Doing), EditPolicy::Restricted, &LoggingSink)
            .unwrap();
        db.update_task(&manager, &task_id, status_patch(TaskStatus::Done), EditPolicy::Restricted, &LoggingSink)
            .unwrap();
    }

    #[test]
    fn restricted_policy_admits_additional_assignees() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);
        let task_id = mk_task(&db, &alice, NewTask {
            title: "shared".into(),
            ..Default::default()
        });
        db.add_assignee(&alice, &task_id, &user_id(&bob), EditPolicy::AnyVisible, &LoggingSink)
            .unwrap();

        db.update_task(&bob, &task_id, status_patch(TaskStatus::Doing), EditPolicy::Restricted, &LoggingSink)
            .unwrap();
    }

    #[test]
    fn anonymous_mutations_are_unauthenticated() {
        let db = setup_db();
        let alice = mk_user(&db, "alice", UserRole::Member);
        let task_id = mk_task(&db, &alice, NewTask {
            title: "x".into(),
            visibility: Some(TaskVisibility::Public),
            ..Default::default()
        });

        let anon = Identity::Anonymous;
        let err = db
            .create_task(&anon, NewTask { title: "y".into(), ..Default::default() }, TaskVisibility::Private, &LoggingSink)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Unauthenticated));

        let err = db
            .update_task(&anon, &task_id, status_patch(TaskStatus::Doing), EditPolicy::AnyVisible, &LoggingSink)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Unauthenticated));
    }
}

mod project_mutation {
    use super::*;

    fn mk_project(db: &Database, creator: &Identity, owner: Option<String>) -> String {
        db.create_project(
            creator,
            NewProject {
                title: "rock".into(),
                owner_user_id: owner,
                quarter: "2026-Q3".into(),
                ..Default::default()
            },
        )
        .expect("Failed to create project")
        .id
    }

    #[test]
    fn plain_member_cannot_update_an_unowned_project() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let member = mk_user(&db, "mike", UserRole::Member);

        let project_id = mk_project(&db, &admin, None);
        db.add_project_member(&admin, &project_id, &user_id(&member), ProjectMemberRole::Member)
            .unwrap();

        // The member can see it, so denial is forbidden rather than missing.
        let err = db
            .update_project(&member, &project_id, ProjectPatch {
                status: Some(ProjectStatus::OnTrack),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        db.update_project(&admin, &project_id, ProjectPatch {
            status: Some(ProjectStatus::OnTrack),
            ..Default::default()
        })
        .unwrap();
    }

    #[test]
    fn invisible_project_mutation_reads_as_missing() {
        let db = setup_db();
        let owner = mk_user(&db, "olive", UserRole::Member);
        let stranger = mk_user(&db, "sam", UserRole::Member);

        let project_id = mk_project(&db, &owner, Some(user_id(&owner)));
        let err = db
            .update_project(&stranger, &project_id, ProjectPatch {
                progress: Some(50),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::NotFound));
    }

    #[test]
    fn owner_field_and_owner_role_member_both_pass_the_gate() {
        let db = setup_db();
        let owner = mk_user(&db, "olive", UserRole::Member);
        let co_owner = mk_user(&db, "omar", UserRole::Member);

        let project_id = mk_project(&db, &owner, Some(user_id(&owner)));
        db.add_project_member(&owner, &project_id, &user_id(&co_owner), ProjectMemberRole::Owner)
            .unwrap();

        db.update_project(&owner, &project_id, ProjectPatch {
            progress: Some(25),
            ..Default::default()
        })
        .unwrap();
        db.update_project(&co_owner, &project_id, ProjectPatch {
            progress: Some(40),
            ..Default::default()
        })
        .unwrap();

        let project = db.get_project(&owner, &project_id).unwrap();
        assert_eq!(project.progress, 40);
    }

    #[test]
    fn member_management_is_gated_like_updates() {
        let db = setup_db();
        let owner = mk_user(&db, "olive", UserRole::Member);
        let member = mk_user(&db, "mike", UserRole::Member);
        let other = mk_user(&db, "opal", UserRole::Member);

        let project_id = mk_project(&db, &owner, Some(user_id(&owner)));
        db.add_project_member(&owner, &project_id, &user_id(&member), ProjectMemberRole::Member)
            .unwrap();

        let err = db
            .add_project_member(&member, &project_id, &user_id(&other), ProjectMemberRole::Member)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        let err = db
            .remove_project_member(&member, &project_id, &user_id(&member))
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));
    }

    #[test]
    fn progress_is_validated_to_the_percent_range() {
        let db = setup_db();
        let owner = mk_user(&db, "olive", UserRole::Member);
        let project_id = mk_project(&db, &owner, Some(user_id(&owner)));

        let err = db
            .update_project(&owner, &project_id, ProjectPatch {
                progress: Some(101),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::InvalidValue));
    }
}

mod admin_gates {
    use super::*;

    #[test]
    fn role_changes_are_admin_only_and_never_self() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let manager = mk_user(&db, "mgr", UserRole::Manager);
        let member = mk_user(&db, "mike", UserRole::Member);

        // Managers are not admins for role purposes.
        let err = db
            .update_user_role(&manager, &user_id(&member), UserRole::Manager)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        // Admins cannot change their own role.
        let err = db
            .update_user_role(&admin, &user_id(&admin), UserRole::Member)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));
        assert!(err.to_string().contains("own role"));

        db.update_user_role(&admin, &user_id(&member), UserRole::Manager)
            .unwrap();
        let promoted = db.get_user(&user_id(&member)).unwrap().unwrap();
        assert_eq!(promoted.role, UserRole::Manager);
    }

    #[test]
    fn user_removal_is_admin_only_and_never_self() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let member = mk_user(&db, "mike", UserRole::Member);

        let err = db.delete_user(&member, &user_id(&member)).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        let err = db.delete_user(&admin, &user_id(&admin)).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        db.delete_user(&admin, &user_id(&member)).unwrap();
        assert!(db.get_user(&user_id(&member)).unwrap().is_none());
    }

    #[test]
    fn category_management_is_admin_only() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let member = mk_user(&db, "mike", UserRole::Member);

        let err = db.create_category(&member, "Marketing").unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        let marketing = db.create_category(&admin, "Marketing").unwrap();
        let other = db.create_category(&admin, "Other").unwrap();

        let err = db.delete_category(&member, &marketing.id, &other.id).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));
    }
}

mod group_gates {
    use super::*;

    #[test]
    fn group_management_requires_manager_rank() {
        let db = setup_db();
        let manager = mk_user(&db, "mgr", UserRole::Manager);
        let member = mk_user(&db, "mike", UserRole::Member);

        let err = db.create_group(&member, "design").unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        let group = db.create_group(&manager, "design").unwrap();
        db.rename_group(&manager, &group.id, "design-team").unwrap();
        db.add_group_member(&manager, &group.id, &user_id(&member)).unwrap();

        let err = db.add_group_member(&member, &group.id, &user_id(&manager)).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));
    }

    #[test]
    fn group_deletion_is_admin_only() {
        let db = setup_db();
        let admin = mk_user(&db, "root", UserRole::Admin);
        let manager = mk_user(&db, "mgr", UserRole::Manager);

        let group = db.create_group(&manager, "design").unwrap();
        let err = db.delete_group(&manager, &group.id).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::Forbidden));

        db.delete_group(&admin, &group.id).unwrap();
        assert!(db.get_group(&group.id).unwrap().is_none());
    }

    #[test]
    fn group_task_assignment_follows_task_visibility_and_policy() {
        let db = setup_db();
        let manager = mk_user(&db, "mgr", UserRole::Manager);
        let alice = mk_user(&db, "alice", UserRole::Member);
        let bob = mk_user(&db, "bob", UserRole::Member);

        let group = db.create_group(&manager, "design").unwrap();
        let task_id = mk_task(&db, &alice, NewTask {
            title: "hidden".into(),
            ..Default::default()
        });

        // Bob cannot see the task, so he cannot attach it to a group.
        let err = db
            .assign_task_to_group(&bob, &group.id, &task_id, EditPolicy::AnyVisible)
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::NotFound));

        db.assign_task_to_group(&alice, &group.id, &task_id, EditPolicy::AnyVisible)
            .unwrap();
        db.unassign_task_from_group(&alice, &group.id, &task_id, EditPolicy::AnyVisible)
            .unwrap();
    }
}
