//! Integration tests for the model lifecycle, events and configuration.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use common::{named, TestHarness};
use ironbean::{Config, Error, EventKind, IdMode, ModelState, Query, RecordId, Value};

// ---------------------------------------------------------------------------
// Key access and id immutability
// ---------------------------------------------------------------------------

#[test]
fn unknown_key_is_key_not_found_new_or_loaded() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    assert_matches!(user.get("nonExistentKey"), Err(Error::KeyNotFound { .. }));
    assert_matches!(
        h.db.related(&user, "nonExistentKey"),
        Err(Error::KeyNotFound { .. })
    );

    let id = h.db.store(&mut user).unwrap();
    let loaded = h.db.load("user", &id).unwrap().unwrap();
    for _ in 0..2 {
        assert_matches!(loaded.get("nonExistentKey"), Err(Error::KeyNotFound { .. }));
        assert_matches!(
            h.db.related(&loaded, "nonExistentKey"),
            Err(Error::KeyNotFound { .. })
        );
    }
}

#[test]
fn assigning_id_before_first_save_is_tamper() {
    let h = TestHarness::new();
    for value in [Value::Int(7), Value::from("abc"), Value::Null] {
        let mut user = named("user", "Ann");
        user.set("age", 3).unwrap();
        user.set("id", value).unwrap();
        assert_matches!(h.db.store(&mut user), Err(Error::IdTamper { .. }));
        assert_eq!(user.state(), ModelState::New);
    }
    assert!(h.db.tables().unwrap().is_empty());
}

#[test]
fn id_in_any_case_is_tamper() {
    let h = TestHarness::new();
    h.db.store(&mut named("user", "Ann")).unwrap();

    for key in ["ID", "Id"] {
        let mut user = named("user", "Bob");
        user.set(key, 42).unwrap();
        assert_matches!(h.db.store(&mut user), Err(Error::IdTamper { .. }));
    }
    let rows = h.rows("SELECT id FROM user");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], Value::Int(1));
}

#[test]
fn keys_differing_in_case_write_one_column() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    user.set("Name", "Bob").unwrap();
    h.db.store(&mut user).unwrap();

    assert_eq!(h.column_names("user"), vec!["id", "name"]);
    assert_eq!(h.rows("SELECT name FROM user")[0]["name"], Value::from("Bob"));
}

#[test]
fn tampered_relation_fails_the_whole_save() {
    let h = TestHarness::new();
    let mut child = named("child", "c");
    child.set("id", 4).unwrap();
    let mut parent = named("parent", "P");
    parent.set_model("child", child).unwrap();

    assert_matches!(h.db.store(&mut parent), Err(Error::IdTamper { .. }));
    assert!(parent.id().is_none());
    assert!(parent.one("child").is_some());
}

#[test]
fn lifecycle_through_the_facade() {
    let h = TestHarness::new();
    let mut user = h.db.dispense("user").unwrap();
    assert_eq!(user.state(), ModelState::New);
    user.set("name", "Ann").unwrap();

    let id = h.db.store(&mut user).unwrap();
    assert_eq!(user.state(), ModelState::Loaded);
    assert_eq!(user.id(), Some(&id));

    assert!(h.db.trash(&mut user).unwrap());
    assert_eq!(user.state(), ModelState::Deleted);
    assert!(h.db.load("user", &id).unwrap().is_none());
}

#[test]
fn trashed_model_cannot_be_stored_again() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    h.db.store(&mut user).unwrap();
    h.db.trash(&mut user).unwrap();

    user.set("name", "Bea").unwrap();
    assert_matches!(h.db.store(&mut user), Err(Error::RecordNotFound { .. }));
    assert_eq!(user.state(), ModelState::Deleted);
    assert_eq!(h.db.count("user").unwrap(), 0);
}

#[test]
fn row_deleted_elsewhere_is_reported_on_update() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    h.db.store(&mut user).unwrap();
    h.db.wipe("user").unwrap();

    user.set("name", "Bea").unwrap();
    assert_matches!(h.db.store(&mut user), Err(Error::RecordNotFound { .. }));
    assert_eq!(h.db.count("user").unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn find_and_load_all() {
    let h = TestHarness::new();
    for (name, age) in [("Ann", 30), ("Bob", 20), ("Cy", 40)] {
        let mut m = named("user", name);
        m.set("age", age).unwrap();
        h.db.store(&mut m).unwrap();
    }

    let older = h
        .db
        .find(&Query::table("user").filter("age > ?", vec![Value::Int(25)]).order_by("age", false))
        .unwrap();
    let names: Vec<_> = older.iter().map(|m| m.get("name").unwrap().clone()).collect();
    assert_eq!(names, vec![Value::from("Cy"), Value::from("Ann")]);

    let first = h
        .db
        .find_one(&Query::table("user").order_by("age", true))
        .unwrap()
        .unwrap();
    assert_eq!(first.get("name").unwrap(), &Value::from("Bob"));

    assert_eq!(h.db.load_all("user").unwrap().len(), 3);
    assert!(h.db.find(&Query::table("ghost")).unwrap().is_empty());
    assert!(h.db.find_one(&Query::table("ghost")).unwrap().is_none());
    assert!(h.db.load("ghost", &RecordId::Int(1)).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn saves_and_deletes_are_recorded() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    h.db.store(&mut user).unwrap();
    h.db.trash(&mut user).unwrap();

    let recent = h.db.events().recent_events(10);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].kind, EventKind::Delete);
    assert_eq!(recent[1].kind, EventKind::Save);
    assert!(recent.iter().all(|e| e.ok && e.table == "user"));
    assert_eq!(recent[1].record_id, Some(RecordId::Int(1)));
}

#[test]
fn extra_handlers_run_after_the_writer() {
    let h = TestHarness::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    h.db.events().subscribe(EventKind::Save, move |event| {
        assert!(event.model.id().is_some());
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    h.db.store(&mut named("user", "Ann")).unwrap();
    h.db.store(&mut named("user", "Bob")).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(h.db.events().handler_count(EventKind::Save), 2);
}

#[test]
fn failed_save_is_recorded_as_failed() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    user.set("id", 1).unwrap();
    assert!(h.db.store(&mut user).is_err());

    let recent = h.db.events().recent_events(1);
    assert!(!recent[0].ok);
    assert_eq!(recent[0].record_id, None);
}

// ---------------------------------------------------------------------------
// Configuration and logging
// ---------------------------------------------------------------------------

#[test]
fn config_drives_the_database() {
    let config = Config::from_json(r#"{"database": {"id_mode": "uuid", "pool_size": 2}}"#).unwrap();
    let h = TestHarness::with_config(config);
    assert_eq!(h.db.id_mode(), IdMode::Uuid);
    assert_eq!(h.db.pool().max_size(), 2);
    assert_eq!(h.db.config().logging.filter, "ironbean=info,ib_db=info,ib_core=info");

    let mut user = named("user", "Ann");
    assert_matches!(h.db.store(&mut user).unwrap(), RecordId::Uuid(_));
}

#[test]
fn bad_config_is_a_validation_error() {
    assert_matches!(
        Config::from_json(r#"{"database": {"id_mode": "serial"}}"#),
        Err(Error::Validation(_))
    );
}

#[test]
fn logging_init_is_idempotent() {
    ironbean::logging::init_from_config(&Config::default().logging);
    assert!(!ironbean::logging::init("ironbean=trace"));
}
