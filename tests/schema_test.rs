//! Integration tests for schema derivation and evolution.

mod common;

use assert_matches::assert_matches;
use common::{model, named, TestHarness};
use ironbean::{Config, Database, Error, IdMode, Model, RecordId, TypeTag, Value};

// ---------------------------------------------------------------------------
// Additive evolution
// ---------------------------------------------------------------------------

#[test]
fn first_save_creates_table_then_widens_it() {
    let h = TestHarness::new();
    let mut user = model("user", &[("name", "Ann".into()), ("age", 30.into())]);

    let id = h.db.store(&mut user).unwrap();
    assert_eq!(id, RecordId::Int(1));
    assert_eq!(h.column_names("user"), vec!["age", "id", "name"]);

    user.set("city", "NYC").unwrap();
    assert_eq!(h.db.store(&mut user).unwrap(), id);
    assert_eq!(h.column_names("user"), vec!["age", "city", "id", "name"]);

    let loaded = h.db.load("user", &id).unwrap().unwrap();
    assert_eq!(loaded.get("name").unwrap(), &Value::from("Ann"));
    assert_eq!(loaded.get("age").unwrap(), &Value::Int(30));
    assert_eq!(loaded.get("city").unwrap(), &Value::from("NYC"));
    assert_eq!(h.db.count("user").unwrap(), 1);
}

#[test]
fn columns_are_never_removed_or_retyped() {
    let h = TestHarness::new();
    let saves: Vec<Vec<(&str, Value)>> = vec![
        vec![("a", 1.into()), ("b", "x".into())],
        vec![("a", "text now".into())],
        vec![("c", true.into()), ("b", Value::Null)],
        vec![("d", 2.5.into())],
    ];

    let mut previous = std::collections::BTreeMap::new();
    for props in saves {
        let mut m = model("item", &props);
        h.db.store(&mut m).unwrap();

        let current = h.db.columns("item").unwrap();
        for (name, tag) in &previous {
            assert_eq!(current.get(name), Some(tag), "column {name} changed");
        }
        assert!(current.len() >= previous.len());
        previous = current;
    }
    assert_eq!(previous["a"], Some(TypeTag::Integer));
    assert_eq!(previous["c"], Some(TypeTag::Boolean));
    assert_eq!(previous["d"], Some(TypeTag::Float));
}

#[test]
fn round_trip_preserves_properties() {
    let h = TestHarness::new();
    let mut m = model(
        "gadget",
        &[
            ("name", "widget".into()),
            ("count", 7.into()),
            ("price", 9.99.into()),
            ("active", false.into()),
            ("sizes", Value::Json(serde_json::json!([1, 2, 3]))),
            ("dims", Value::Json(serde_json::json!({"w": 2, "h": 3}))),
        ],
    );
    let id = h.db.store(&mut m).unwrap();

    let loaded = h.db.load("gadget", &id).unwrap().unwrap();
    assert_eq!(loaded.properties(), m.properties());
    assert_eq!(loaded, m);
    assert!(loaded.is_loaded());
}

// ---------------------------------------------------------------------------
// Frozen mode
// ---------------------------------------------------------------------------

#[test]
fn frozen_save_with_new_column_fails_until_unfrozen() {
    let h = TestHarness::new();
    let mut user = named("user", "Ann");
    h.db.store(&mut user).unwrap();
    let before = h.column_names("user");

    h.db.freeze();
    assert!(h.db.is_frozen());
    let mut drifted = model("user", &[("name", "Bob".into()), ("email", "b@x".into())]);
    let err = h.db.store(&mut drifted).unwrap_err();
    assert!(err.is_unknown_column(), "unexpected error: {err}");
    assert_matches!(err, Error::Database { .. });
    assert_eq!(h.column_names("user"), before);
    assert_eq!(h.db.count("user").unwrap(), 1);

    h.db.unfreeze();
    h.db.store(&mut drifted).unwrap();
    assert!(h.column_names("user").contains(&"email".to_string()));
    assert_eq!(h.db.count("user").unwrap(), 2);
}

#[test]
fn frozen_save_matching_schema_still_writes() {
    let h = TestHarness::new();
    h.db.store(&mut named("user", "Ann")).unwrap();

    h.db.freeze();
    h.db.store(&mut named("user", "Bob")).unwrap();
    assert_eq!(h.db.count("user").unwrap(), 2);
}

#[test]
fn frozen_from_config() {
    let config = Config::from_json(r#"{"database": {"frozen": true}}"#).unwrap();
    let h = TestHarness::with_config(config);
    assert!(h.db.is_frozen());
    let err = h.db.store(&mut named("user", "Ann")).unwrap_err();
    assert!(err.to_string().contains("no such table"), "unexpected error: {err}");
    assert!(h.db.tables().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Id modes and backends
// ---------------------------------------------------------------------------

#[test]
fn uuid_mode_keys() {
    let h = TestHarness::uuid();
    assert_eq!(h.db.id_mode(), IdMode::Uuid);

    let mut parent = named("parent", "P");
    parent.set_model("user", named("user", "Ann")).unwrap();
    let id = h.db.store(&mut parent).unwrap();
    assert_matches!(id, RecordId::Uuid(_));

    let cols = h.db.columns("parent").unwrap();
    assert_eq!(cols["id"], Some(TypeTag::Uuid));
    assert_eq!(cols["user_id"], Some(TypeTag::Uuid));

    let loaded = h.db.load("parent", &id).unwrap().unwrap();
    assert_eq!(loaded.id(), Some(&id));
}

#[test]
fn file_database_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.database.path = Some(dir.path().join("bean.db"));

    let id = {
        let db = Database::open(&config).unwrap();
        let mut user = named("user", "Ann");
        db.store(&mut user).unwrap()
    };

    let db = Database::open(&config).unwrap();
    let loaded = db.load("user", &id).unwrap().unwrap();
    assert_eq!(loaded.get("name").unwrap(), &Value::from("Ann"));
    assert_eq!(db.tables().unwrap(), vec!["user"]);
}

#[test]
fn external_ddl_is_seen_after_refresh() {
    let h = TestHarness::new();
    h.db.store(&mut named("user", "Ann")).unwrap();
    assert!(!h.column_names("user").contains(&"legacy".to_string()));

    let conn = ib_db::pool::get_conn(h.db.pool()).unwrap();
    conn.execute_batch("ALTER TABLE user ADD COLUMN legacy TEXT").unwrap();
    drop(conn);
    assert!(!h.column_names("user").contains(&"legacy".to_string()));

    h.db.refresh_schema(Some("user"));
    assert!(h.column_names("user").contains(&"legacy".to_string()));
}

#[test]
fn invalid_table_names_are_rejected() {
    let h = TestHarness::new();
    assert_matches!(h.db.dispense("Bad Table"), Err(Error::InvalidIdentifier(_)));
    assert_matches!(Model::new("user;drop"), Err(Error::InvalidIdentifier(_)));
    assert!(h.db.dispense("user").is_ok());
}

#[test]
fn wipe_keeps_the_table() {
    let h = TestHarness::new();
    h.db.store(&mut named("user", "Ann")).unwrap();
    h.db.store(&mut named("user", "Bob")).unwrap();

    assert_eq!(h.db.wipe("user").unwrap(), 2);
    assert_eq!(h.db.count("user").unwrap(), 0);
    assert_eq!(h.db.tables().unwrap(), vec!["user"]);
}
