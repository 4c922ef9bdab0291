mod common;
use common::{doc, load_one, setup_store};

use ::common::Change;
use engine::{compare, CompareRequest, Error, Side};
use serde_json::json;

#[test]
fn description_change_scenario() {
    let mut db = setup_store();
    load_one(&mut db.store, &json!({"job": {"job_id": "j1", "description": "a"}}));
    load_one(&mut db.store, &json!({"job": {"job_id": "j1", "description": "b"}}));

    let current = db.store.current("j1").unwrap().unwrap().into_inner();
    assert_eq!(current.fields.description, "b");
    let versions = db.store.versions("j1", engine::VersionOrder::NewestFirst).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[0].fields.description, "a");

    let cmp = compare(
        &db.store,
        "j1",
        &CompareRequest {
            from: Some(1),
            against_current: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(cmp.from, Side::Version(1));
    assert_eq!(cmp.to, Side::Current);
    assert_eq!(cmp.diff.len(), 1);
    assert_eq!(
        cmp.diff.get("description"),
        Some(&Change::ValueChanged { old: json!("a"), new: json!("b") })
    );

    engine::undo(&mut db.store, "j1").unwrap();
    let current = db.store.current("j1").unwrap().unwrap().into_inner();
    assert_eq!(current.fields.description, "a");
    assert!(db.store.versions("j1", engine::VersionOrder::NewestFirst).unwrap().is_empty());
}

#[test]
fn defaults_compare_latest_snapshot_with_current() {
    let mut db = setup_store();
    load_one(&mut db.store, &doc("j1", "sales", "5m"));
    load_one(&mut db.store, &doc("j1", "sales", "10m"));
    load_one(&mut db.store, &doc("j1", "sales", "15m"));

    let cmp = compare(&db.store, "j1", &CompareRequest::default()).unwrap();
    assert_eq!(cmp.from, Side::Version(2));
    assert_eq!(cmp.to, Side::Current);
    assert_eq!(cmp.diff.len(), 1);
    assert_eq!(
        cmp.diff.get("analysis_config.bucket_span"),
        Some(&Change::ValueChanged { old: json!("10m"), new: json!("15m") })
    );
}

#[test]
fn against_current_alone_uses_latest_snapshot() {
    let mut db = setup_store();
    load_one(&mut db.store, &doc("j1", "sales", "5m"));
    load_one(&mut db.store, &doc("j1", "sales", "10m"));

    let req = CompareRequest {
        against_current: true,
        ..Default::default()
    };
    let cmp = compare(&db.store, "j1", &req).unwrap();
    assert_eq!(cmp.from, Side::Version(1));
    assert_eq!(cmp.to, Side::Current);
    assert_eq!(cmp.diff.len(), 1);
}

#[test]
fn two_versions_can_be_compared() {
    let mut db = setup_store();
    load_one(&mut db.store, &doc("j1", "sales", "5m"));
    load_one(&mut db.store, &doc("j1", "sales", "10m"));
    load_one(&mut db.store, &doc("j1", "sales", "15m"));

    let req = CompareRequest {
        from: Some(1),
        to: Some(2),
        against_current: false,
    };
    let cmp = compare(&db.store, "j1", &req).unwrap();
    assert_eq!(cmp.to, Side::Version(2));
    assert_eq!(
        cmp.diff.get("analysis_config.bucket_span"),
        Some(&Change::ValueChanged { old: json!("5m"), new: json!("10m") })
    );

    // a version compared with itself has no differences
    let same = CompareRequest {
        from: Some(2),
        to: Some(2),
        against_current: false,
    };
    assert!(compare(&db.store, "j1", &same).unwrap().diff.is_empty());
}

#[test]
fn nested_change_is_reported_once_at_its_path() {
    let mut db = setup_store();
    let mut old = doc("j1", "sales", "15m");
    old["job"]["analysis_config"]["model_prune_window"] = json!({"unit": "d", "amount": 30});
    let mut new = old.clone();
    new["job"]["analysis_config"]["model_prune_window"]["amount"] = json!(45);

    load_one(&mut db.store, &old);
    load_one(&mut db.store, &new);

    let cmp = compare(&db.store, "j1", &CompareRequest::default()).unwrap();
    assert_eq!(cmp.diff.len(), 1);
    assert_eq!(
        cmp.diff.entries()[0].path,
        "analysis_config.model_prune_window.amount"
    );
    assert_eq!(
        cmp.diff.entries()[0].change,
        Change::ValueChanged { old: json!(30), new: json!(45) }
    );
}

#[test]
fn unknown_job_and_version_are_not_found() {
    let mut db = setup_store();
    assert!(matches!(
        compare(&db.store, "nope", &CompareRequest::default()),
        Err(Error::NotFound(_))
    ));

    load_one(&mut db.store, &doc("j1", "a", "15m"));
    assert!(matches!(
        compare(&db.store, "j1", &CompareRequest::default()),
        Err(Error::NoHistory(_))
    ));

    load_one(&mut db.store, &doc("j1", "b", "15m"));
    let req = CompareRequest {
        from: Some(7),
        ..Default::default()
    };
    assert!(matches!(compare(&db.store, "j1", &req), Err(Error::NotFound(_))));
}

#[test]
fn unparseable_stored_field_is_a_warning_not_an_error() {
    let mut db = setup_store();
    load_one(&mut db.store, &doc("j1", "a", "15m"));
    load_one(&mut db.store, &doc("j1", "b", "15m"));
    db.store
        .conn()
        .execute(
            "UPDATE job_versions SET analysis_limits = 'not json' WHERE job_id = 'j1' AND version = 1",
            [],
        )
        .unwrap();

    let cmp = compare(&db.store, "j1", &CompareRequest::default()).unwrap();
    assert_eq!(cmp.warnings.len(), 1);
    assert_eq!(cmp.warnings[0].field, "analysis_limits");

    // the broken side reads as {}, so the current limits show up as added
    assert_eq!(
        cmp.diff.get("analysis_limits.model_memory_limit"),
        Some(&Change::Added { value: json!("10mb") })
    );
    assert!(cmp.diff.get("description").is_some());
}
