//! Integration tests for the database layer.
//!
//! These tests exercise the identity and task stores against an in-memory
//! SQLite database. Tests are organized by store.

use nexustodo::db::Database;
use nexustodo::error::StoreError;
use nexustodo::types::{TaskQuery, TaskStatus, TaskUpdate};
use std::thread::sleep;
use std::time::Duration;
use uuid::Uuid;

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn device_id() -> String {
    Uuid::now_v7().to_string()
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn count_devices(db: &Database, user_id: &str) -> i64 {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM devices WHERE user_id = ?1 AND deleted_at IS NULL",
            [user_id],
            |row| row.get(0),
        )?)
    })
    .expect("Failed to count devices")
}

fn count_users(db: &Database) -> i64 {
    db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
        .expect("Failed to count users")
}

mod identity_tests {
    use super::*;

    #[test]
    fn register_new_device_creates_user() {
        let db = setup_db();
        let id = device_id();

        let (device, user) = db.register_device(&id).expect("Failed to register device");

        assert_eq!(device.id, id);
        assert_eq!(device.user_id, user.id);
        assert_eq!(count_users(&db), 1);
        assert_eq!(count_devices(&db, &user.id), 1);
    }

    #[test]
    fn register_same_device_twice_keeps_user() {
        let db = setup_db();
        let id = device_id();

        let (first, first_user) = db.register_device(&id).unwrap();
        sleep(Duration::from_millis(5));
        let (second, second_user) = db.register_device(&id).unwrap();

        assert_eq!(first_user.id, second_user.id);
        assert_eq!(second.user_id, first.user_id);
        assert!(second.last_seen_at >= first.last_seen_at);
        assert_eq!(count_devices(&db, &first_user.id), 1);
    }

    #[test]
    fn second_device_joins_existing_user() {
        let db = setup_db();

        let (_, first_user) = db.register_device(&device_id()).unwrap();
        let (_, second_user) = db.register_device(&device_id()).unwrap();

        assert_eq!(first_user.id, second_user.id);
        assert_eq!(count_devices(&db, &first_user.id), 2);
    }

    #[test]
    fn register_rejects_malformed_device_id() {
        let db = setup_db();

        for bad in ["", "abc", "550e8400e29b41d4a716446655440000"] {
            let result = db.register_device(bad);
            assert!(
                matches!(result, Err(StoreError::InvalidInput(_))),
                "expected InvalidInput for {:?}",
                bad
            );
        }
    }

    #[test]
    fn device_status_unknown_device_is_not_found() {
        let db = setup_db();
        let result = db.get_device_status(&device_id());
        assert!(matches!(result, Err(StoreError::DeviceNotFound(_))));
    }

    #[test]
    fn device_status_refreshes_last_seen() {
        let db = setup_db();
        let id = device_id();
        let (registered, user) = db.register_device(&id).unwrap();

        sleep(Duration::from_millis(5));
        let status = db.get_device_status(&id).unwrap();

        assert_eq!(status.user_id, user.id);
        assert!(status.last_seen_at > registered.last_seen_at);

        let again = db.get_device_status(&id).unwrap();
        assert!(again.last_seen_at >= status.last_seen_at);
    }

    #[test]
    fn many_devices_share_one_user() {
        let db = setup_db();
        for _ in 0..3 {
            db.register_device(&device_id()).unwrap();
        }
        assert_eq!(count_users(&db), 1);
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let db = setup_db();

        let created = db
            .create_task(
                "u1",
                "Write report".to_string(),
                Some("quarterly numbers".to_string()),
                tags(&["work", "urgent"]),
            )
            .unwrap();
        let fetched = db.get_task(&created.id).unwrap();

        assert_eq!(fetched.title, "Write report");
        assert_eq!(fetched.description.as_deref(), Some("quarterly numbers"));
        assert_eq!(fetched.tags, vec!["work", "urgent"]);
        assert_eq!(fetched.status, TaskStatus::Todo);
        assert_eq!(fetched.user_id, "u1");
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn create_rejects_blank_title() {
        let db = setup_db();

        for title in ["", "   ", "\t\n"] {
            let result = db.create_task("u1", title.to_string(), None, vec![]);
            assert!(matches!(result, Err(StoreError::EmptyTitle)));
        }
        assert!(db.list_tasks("u1", &TaskQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn create_stores_title_verbatim() {
        let db = setup_db();
        let long = "x".repeat(10_000);

        for title in [" padded ", "<script>alert(1)</script>", "🛒 买菜", long.as_str()] {
            let task = db.create_task("u1", title.to_string(), None, vec![]).unwrap();
            assert_eq!(db.get_task(&task.id).unwrap().title, title);
        }
    }

    #[test]
    fn empty_description_is_stored_as_absent() {
        let db = setup_db();
        let task = db
            .create_task("u1", "t".to_string(), Some(String::new()), vec![])
            .unwrap();
        assert_eq!(db.get_task(&task.id).unwrap().description, None);
    }

    #[test]
    fn get_unknown_task_is_not_found() {
        let db = setup_db();
        assert!(matches!(
            db.get_task("missing"),
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn list_is_scoped_to_user_and_ordered_by_creation() {
        let db = setup_db();

        let a = db.create_task("u1", "a".to_string(), None, vec![]).unwrap();
        db.create_task("u2", "other".to_string(), None, vec![]).unwrap();
        let b = db.create_task("u1", "b".to_string(), None, vec![]).unwrap();
        let c = db.create_task("u1", "c".to_string(), None, vec![]).unwrap();

        let listed = db.list_tasks("u1", &TaskQuery::default()).unwrap();
        let ids: Vec<_> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);

        // Stable across repeated calls
        let again = db.list_tasks("u1", &TaskQuery::default()).unwrap();
        assert_eq!(listed, again);
    }

    #[test]
    fn list_filters_by_exact_status() {
        let db = setup_db();

        let todo = db.create_task("u1", "todo".to_string(), None, vec![]).unwrap();
        let done = db.create_task("u1", "done".to_string(), None, vec![]).unwrap();
        db.update_task(
            &done.id,
            "u1",
            TaskUpdate {
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
        )
        .unwrap();

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_status(TaskStatus::Done))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, done.id);

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_status(TaskStatus::Todo))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, todo.id);
    }

    #[test]
    fn list_tag_filter_requires_every_tag() {
        let db = setup_db();

        let both = db
            .create_task("u1", "both".to_string(), None, tags(&["work", "urgent"]))
            .unwrap();
        let work = db
            .create_task("u1", "work".to_string(), None, tags(&["work"]))
            .unwrap();
        db.create_task("u1", "none".to_string(), None, vec![]).unwrap();

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_tags(["work"]))
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![both.id.clone(), work.id]);

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_tags(["work", "urgent"]))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, both.id);
    }

    #[test]
    fn list_tag_filter_is_exact_not_substring() {
        let db = setup_db();

        db.create_task("u1", "homework".to_string(), None, tags(&["homework"]))
            .unwrap();

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_tags(["work"]))
            .unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn update_status_only_leaves_other_fields() {
        let db = setup_db();
        let task = db
            .create_task(
                "u1",
                "title".to_string(),
                Some("desc".to_string()),
                tags(&["a"]),
            )
            .unwrap();

        sleep(Duration::from_millis(5));
        let updated = db
            .update_task(
                &task.id,
                "u1",
                TaskUpdate {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.title, "title");
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert_eq!(updated.tags, vec!["a"]);
        assert_eq!(updated.created_at, task.created_at);
        assert!(updated.updated_at > task.updated_at);
    }

    #[test]
    fn update_can_clear_description_and_tags() {
        let db = setup_db();
        let task = db
            .create_task(
                "u1",
                "title".to_string(),
                Some("desc".to_string()),
                tags(&["a", "b"]),
            )
            .unwrap();

        let updated = db
            .update_task(
                &task.id,
                "u1",
                TaskUpdate {
                    description: Some(None),
                    tags: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.description, None);
        assert!(updated.tags.is_empty());

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_tags(["a"]))
            .unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn update_replaces_tags_in_order() {
        let db = setup_db();
        let task = db
            .create_task("u1", "t".to_string(), None, tags(&["a"]))
            .unwrap();

        let updated = db
            .update_task(
                &task.id,
                "u1",
                TaskUpdate {
                    tags: Some(tags(&["z", "b", "m"])),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.tags, vec!["z", "b", "m"]);

        let listed = db
            .list_tasks("u1", &TaskQuery::default().with_tags(["b"]))
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn update_rejects_blank_title() {
        let db = setup_db();
        let task = db.create_task("u1", "keep".to_string(), None, vec![]).unwrap();

        let result = db.update_task(
            &task.id,
            "u1",
            TaskUpdate {
                title: Some("  ".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StoreError::EmptyTitle)));
        assert_eq!(db.get_task(&task.id).unwrap().title, "keep");
    }

    #[test]
    fn other_user_is_forbidden() {
        let db = setup_db();
        let task = db.create_task("owner", "mine".to_string(), None, vec![]).unwrap();

        let update = db.update_task(
            &task.id,
            "intruder",
            TaskUpdate {
                title: Some("stolen".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(update, Err(StoreError::Forbidden { .. })));

        let delete = db.delete_task(&task.id, "intruder");
        assert!(matches!(delete, Err(StoreError::Forbidden { .. })));

        let fetched = db.get_task(&task.id).unwrap();
        assert_eq!(fetched.title, "mine");
        assert!(nexustodo::db::tasks::ensure_owner(&fetched, "intruder").is_err());
        assert!(nexustodo::db::tasks::ensure_owner(&fetched, "owner").is_ok());
    }

    #[test]
    fn update_checks_ownership_before_title() {
        let db = setup_db();
        let task = db.create_task("owner", "mine".to_string(), None, vec![]).unwrap();
        let blank = || TaskUpdate {
            title: Some("  ".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            db.update_task(&task.id, "intruder", blank()),
            Err(StoreError::Forbidden { .. })
        ));
        assert!(matches!(
            db.update_task("missing", "owner", blank()),
            Err(StoreError::TaskNotFound(_))
        ));
        assert!(matches!(
            db.update_task(&task.id, "owner", blank()),
            Err(StoreError::EmptyTitle)
        ));
    }

    #[test]
    fn update_unknown_task_is_not_found() {
        let db = setup_db();
        let result = db.update_task("missing", "u1", TaskUpdate::default());
        assert!(matches!(result, Err(StoreError::TaskNotFound(_))));
    }

    #[test]
    fn delete_hides_task_from_every_read() {
        let db = setup_db();
        let task = db
            .create_task("u1", "gone".to_string(), None, tags(&["x"]))
            .unwrap();

        db.delete_task(&task.id, "u1").unwrap();

        assert!(matches!(
            db.get_task(&task.id),
            Err(StoreError::TaskNotFound(_))
        ));
        assert!(db.list_tasks("u1", &TaskQuery::default()).unwrap().is_empty());
        assert!(
            db.list_tasks("u1", &TaskQuery::default().with_tags(["x"]))
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            db.delete_task(&task.id, "u1"),
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn shopping_task_lifecycle() {
        let db = setup_db();

        let task = db.create_task("u1", "买菜".to_string(), None, vec![]).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.tags.is_empty());

        let updated = db
            .update_task(
                &task.id,
                "u1",
                TaskUpdate {
                    status: Some(TaskStatus::Done),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "买菜");

        db.delete_task(&task.id, "u1").unwrap();
        assert!(matches!(
            db.get_task(&task.id),
            Err(StoreError::TaskNotFound(_))
        ));
    }
}

mod persistence_tests {
    use super::*;

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.db");

        let (task_id, user_id) = {
            let db = Database::open(&path).unwrap();
            let (_, user) = db.register_device(&device_id()).unwrap();
            let task = db
                .create_task(&user.id, "persist".to_string(), None, tags(&["a"]))
                .unwrap();
            (task.id, user.id)
        };

        let db = Database::open(&path).unwrap();
        let task = db.get_task(&task_id).unwrap();
        assert_eq!(task.title, "persist");
        assert_eq!(task.tags, vec!["a"]);

        // Reopening does not mint a second user
        let (_, user) = db.register_device(&device_id()).unwrap();
        assert_eq!(user.id, user_id);
    }
}
