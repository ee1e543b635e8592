// Integration tests for the shotbase engine
use serde_json::{json, Value};
use shotbase_core::{
    Database, Document, FileStorage, FindOptions, ReturnDocument, ShotbaseError, UpsertOutcome,
};
use tempfile::TempDir;

// Helper to open a file-backed database in a fresh directory
fn create_test_db() -> (TempDir, Database<FileStorage>) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (temp_dir, db)
}

// Helper to build a document from a json! literal
fn create_doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_insert_then_find_one_by_id() {
    let (_temp, db) = create_test_db();
    let id = db
        .insert_one("shots", create_doc(json!({"name": "sh010", "frames": 120})))
        .unwrap();

    let found = db.find_one("shots", &json!({"_id": &id})).unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&json!("sh010")));
    assert_eq!(found.get("frames"), Some(&json!(120)));
    assert_eq!(found.get("_id"), Some(&json!(&id)));
    assert!(found.get("_created_at").unwrap().is_string());
    assert!(found.get("_updated_at").unwrap().is_string());
}

#[test]
fn test_inc_twice_adds_two_and_keeps_created_at() {
    let (_temp, db) = create_test_db();
    let id = db
        .insert_one("tasks", create_doc(json!({"name": "comp", "priority": 1})))
        .unwrap();
    let created = db
        .find_one("tasks", &json!({"_id": &id}))
        .unwrap()
        .unwrap()
        .get("_created_at")
        .cloned()
        .unwrap();

    let update = json!({"$inc": {"priority": 1}});
    db.update_one("tasks", &json!({"_id": &id}), &update).unwrap();
    db.update_one("tasks", &json!({"_id": &id}), &update).unwrap();

    let after = db.find_one("tasks", &json!({"_id": &id})).unwrap().unwrap();
    assert_eq!(after.get("priority"), Some(&json!(3)));
    assert_eq!(after.get("_created_at"), Some(&created));
    // timestamps are fixed-width UTC strings, so >= is a time comparison
    assert!(after.get("_updated_at").unwrap().as_str() >= created.as_str());
}

#[test]
fn test_delete_many_empties_collection() {
    let (_temp, db) = create_test_db();
    db.insert_many(
        "notes",
        vec![create_doc(json!({"n": 1})), create_doc(json!({"n": 2})), create_doc(json!({"n": 3}))],
    )
    .unwrap();

    assert_eq!(db.delete_many("notes", &json!({})).unwrap(), 3);
    assert!(db.find("notes", &json!({})).unwrap().is_empty());
    assert_eq!(db.count("notes", &json!({})).unwrap(), 0);
}

#[test]
fn test_upsert_same_filter_twice_yields_one_document() {
    let (_temp, db) = create_test_db();
    let filter = json!({"name": "sh020"});

    let first = db
        .upsert("shots", &filter, &json!({"$set": {"status": "wip"}}))
        .unwrap();
    assert!(first.inserted_id().is_some());

    let second = db
        .upsert("shots", &filter, &json!({"$set": {"status": "done"}}))
        .unwrap();
    assert_eq!(second, UpsertOutcome::Updated(1));

    let matches = db.find("shots", &filter).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get("status"), Some(&json!("done")));
}

#[test]
fn test_group_sum_by_department() {
    let (_temp, db) = create_test_db();
    for (dept, hours) in [("a", 1), ("a", 2), ("a", 3), ("b", 3)] {
        db.insert_one("tasks", create_doc(json!({"dept": dept, "hours": hours})))
            .unwrap();
    }

    let results = db
        .aggregate(
            "tasks",
            &json!([{ "$group": {"_id": "$dept", "total": {"$sum": "$hours"}} }]),
        )
        .unwrap();

    let values: Vec<Value> = results.into_iter().map(Value::Object).collect();
    assert_eq!(
        values,
        vec![
            json!({"_id": "a", "total": 6}),
            json!({"_id": "b", "total": 3})
        ]
    );
}

#[test]
fn test_match_group_sort_pipeline() {
    let (_temp, db) = create_test_db();
    let rows = [
        ("anim", "done", 5),
        ("anim", "done", 7),
        ("comp", "done", 4),
        ("comp", "wip", 9),
        ("fx", "done", 4),
    ];
    for (dept, status, hours) in rows {
        db.insert_one(
            "tasks",
            create_doc(json!({"dept": dept, "status": status, "hours": hours})),
        )
        .unwrap();
    }

    let results = db
        .aggregate(
            "tasks",
            &json!([
                { "$match": {"status": "done"} },
                { "$group": {"_id": "$dept", "total": {"$sum": "$hours"}, "tasks": {"$count": {}}} },
                { "$sort": {"total": -1} }
            ]),
        )
        .unwrap();

    let values: Vec<Value> = results.into_iter().map(Value::Object).collect();
    assert_eq!(
        values,
        vec![
            json!({"_id": "anim", "total": 12, "tasks": 2}),
            json!({"_id": "comp", "total": 4, "tasks": 1}),
            json!({"_id": "fx", "total": 4, "tasks": 1})
        ]
    );
}

#[test]
fn test_failed_transaction_changes_nothing() {
    let (_temp, db) = create_test_db();
    db.insert_one("shots", create_doc(json!({"name": "sh010"}))).unwrap();

    let result = db.transaction(|tx| -> shotbase_core::Result<()> {
        tx.insert_one("shots", create_doc(json!({"name": "sh020"})))?;
        tx.delete_many("shots", &json!({}))?;
        Err(ShotbaseError::Validation("rehearsal abort".to_string()))
    });
    assert!(result.is_err());

    assert_eq!(db.count("shots", &json!({})).unwrap(), 1);
    let survivor = db.find_one("shots", &json!({})).unwrap().unwrap();
    assert_eq!(survivor.get("name"), Some(&json!("sh010")));
}

#[test]
fn test_sort_descending_with_limit_picks_top_document() {
    let (_temp, db) = create_test_db();
    for (name, frames) in [("Task A", 10), ("Task B", 30), ("Task C", 20)] {
        db.insert_one("tasks", create_doc(json!({"name": name, "frames": frames})))
            .unwrap();
    }

    let options = FindOptions::new().with_sort(&[("frames", -1)]).with_limit(1);
    let top = db.find_with_options("tasks", &json!({}), &options).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].get("name"), Some(&json!("Task B")));
}

#[test]
fn test_reopen_sees_persisted_documents() {
    let temp_dir = TempDir::new().unwrap();
    let id = {
        let db = Database::open(temp_dir.path()).unwrap();
        db.insert_one("shots", create_doc(json!({"name": "sh010", "cut": [1001, 1120]})))
            .unwrap()
    };

    let db = Database::open(temp_dir.path()).unwrap();
    let found = db.find_one("shots", &json!({"_id": &id})).unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&json!("sh010")));
    assert_eq!(found.get("cut"), Some(&json!([1001, 1120])));
    assert_eq!(db.list_collections().unwrap(), vec!["shots".to_string()]);
}

#[test]
fn test_field_order_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = Database::open(temp_dir.path()).unwrap();
        db.insert_one(
            "shots",
            create_doc(json!({"zeta": 1, "alpha": 2, "mid": {"y": 1, "x": 2}})),
        )
        .unwrap();
    }

    let db = Database::open(temp_dir.path()).unwrap();
    let found = db.find_one("shots", &json!({})).unwrap().unwrap();
    let keys: Vec<&str> = found.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["_id", "zeta", "alpha", "mid", "_created_at", "_updated_at"]);
}

#[test]
fn test_corrupted_collection_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    std::fs::write(temp_dir.path().join("broken.json"), b"{ not json ]").unwrap();

    let err = db.find("broken", &json!({})).unwrap_err();
    match err {
        ShotbaseError::CorruptedCollection { collection, .. } => {
            assert_eq!(collection, "broken");
        }
        other => panic!("expected corruption error, got {other:?}"),
    }
}

#[test]
fn test_data_directory_holds_only_collection_files() {
    let (_temp, db) = create_test_db();
    for i in 0..10 {
        db.insert_one("shots", create_doc(json!({"i": i}))).unwrap();
        db.update_one("shots", &json!({"i": i}), &json!({"$set": {"seen": true}}))
            .unwrap();
    }
    db.drop_collection("ghost").unwrap();

    let names: Vec<String> = std::fs::read_dir(_temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["shots.json".to_string()]);
}

#[test]
fn test_query_operators_through_facade() {
    let (_temp, db) = create_test_db();
    let rows = [
        json!({"name": "sh010", "status": "wip", "frames": 100}),
        json!({"name": "sh020", "status": "done", "frames": 80}),
        json!({"name": "sh030", "status": "done", "frames": 140}),
        json!({"name": "fx_sh040", "status": "hold", "frames": 60}),
    ];
    for row in rows {
        db.insert_one("shots", create_doc(row)).unwrap();
    }

    let heavy_done = db
        .find("shots", &json!({"status": "done", "frames": {"$gte": 100}}))
        .unwrap();
    assert_eq!(heavy_done.len(), 1);
    assert_eq!(heavy_done[0].get("name"), Some(&json!("sh030")));

    let fx = db.find("shots", &json!({"name": {"$regex": "^fx_"}})).unwrap();
    assert_eq!(fx.len(), 1);

    let active = db
        .find(
            "shots",
            &json!({"$or": [{"status": "wip"}, {"status": "hold"}]}),
        )
        .unwrap();
    assert_eq!(active.len(), 2);

    assert_eq!(
        db.count("shots", &json!({"status": {"$in": ["done", "hold"]}}))
            .unwrap(),
        3
    );
}

#[test]
fn test_update_operator_suite_through_facade() {
    let (_temp, db) = create_test_db();
    let id = db
        .insert_one(
            "shots",
            create_doc(json!({"name": "sh010", "meta": {"dept": "fx"}, "tags": ["wip"], "tmp": 1})),
        )
        .unwrap();
    let filter = json!({"_id": &id});

    db.update_one(
        "shots",
        &filter,
        &json!({
            "$set": {"meta.lead": "ada"},
            "$push": {"tags": "review"},
            "$unset": {"tmp": ""}
        }),
    )
    .unwrap();
    db.update_one("shots", &filter, &json!({"$pull": {"tags": "wip"}}))
        .unwrap();

    let after = db.find_one("shots", &filter).unwrap().unwrap();
    assert_eq!(
        after.get("meta"),
        Some(&json!({"dept": "fx", "lead": "ada"}))
    );
    assert_eq!(after.get("tags"), Some(&json!(["review"])));
    assert!(after.get("tmp").is_none());
}

#[test]
fn test_replace_one_resets_caller_fields() {
    let (_temp, db) = create_test_db();
    let id = db
        .insert_one("shots", create_doc(json!({"name": "sh010", "frames": 100})))
        .unwrap();
    let before = db.find_one("shots", &json!({"_id": &id})).unwrap().unwrap();

    db.replace_one(
        "shots",
        &json!({"_id": &id}),
        &create_doc(json!({"name": "sh010", "status": "final"})),
    )
    .unwrap();

    let after = db.find_one("shots", &json!({"_id": &id})).unwrap().unwrap();
    assert!(after.get("frames").is_none());
    assert_eq!(after.get("status"), Some(&json!("final")));
    assert_eq!(after.get("_created_at"), before.get("_created_at"));
}

#[test]
fn test_find_one_and_update_returns_requested_image() {
    let (_temp, db) = create_test_db();
    db.insert_one("counters", create_doc(json!({"name": "render", "value": 41})))
        .unwrap();

    let before = db
        .find_one_and_update(
            "counters",
            &json!({"name": "render"}),
            &json!({"$inc": {"value": 1}}),
            ReturnDocument::Before,
        )
        .unwrap()
        .unwrap();
    assert_eq!(before.get("value"), Some(&json!(41)));

    let after = db
        .find_one_and_update(
            "counters",
            &json!({"name": "render"}),
            &json!({"$inc": {"value": 1}}),
            ReturnDocument::After,
        )
        .unwrap()
        .unwrap();
    assert_eq!(after.get("value"), Some(&json!(43)));
}

#[test]
fn test_find_one_and_delete_hands_back_document() {
    let (_temp, db) = create_test_db();
    db.insert_one("queue", create_doc(json!({"job": "export", "order": 1})))
        .unwrap();
    db.insert_one("queue", create_doc(json!({"job": "publish", "order": 2})))
        .unwrap();

    let taken = db
        .find_one_and_delete("queue", &json!({"order": 1}))
        .unwrap()
        .unwrap();
    assert_eq!(taken.get("job"), Some(&json!("export")));
    assert_eq!(db.count("queue", &json!({})).unwrap(), 1);
}

#[test]
fn test_stats_and_listing() {
    let (_temp, db) = create_test_db();
    db.insert_many("shots", vec![create_doc(json!({"n": 1})), create_doc(json!({"n": 2}))])
        .unwrap();
    db.insert_one("tasks", create_doc(json!({"n": 3}))).unwrap();

    assert_eq!(
        db.list_collections().unwrap(),
        vec!["shots".to_string(), "tasks".to_string()]
    );

    let stats = db.get_stats().unwrap();
    assert_eq!(stats.collections.get("shots"), Some(&2));
    assert_eq!(stats.collections.get("tasks"), Some(&1));
    assert_eq!(stats.total_documents, 3);

    assert!(db.drop_collection("shots").unwrap());
    assert_eq!(db.get_stats().unwrap().total_documents, 1);
}

#[test]
fn test_distinct_values_with_filter() {
    let (_temp, db) = create_test_db();
    let rows = [
        ("fx", "wip"),
        ("comp", "wip"),
        ("fx", "done"),
        ("lighting", "wip"),
    ];
    for (dept, status) in rows {
        db.insert_one("tasks", create_doc(json!({"dept": dept, "status": status})))
            .unwrap();
    }

    let depts = db
        .distinct("tasks", "dept", &json!({"status": "wip"}))
        .unwrap();
    assert_eq!(depts, vec![json!("fx"), json!("comp"), json!("lighting")]);
}

#[test]
fn test_validation_error_leaves_store_untouched() {
    let (_temp, db) = create_test_db();
    db.insert_one("shots", create_doc(json!({"name": "sh010", "version": 2})))
        .unwrap();

    let err = db
        .update_many("shots", &json!({}), &json!({"$bump": {"version": 1}}))
        .unwrap_err();
    assert!(matches!(err, ShotbaseError::Validation(_)));

    let unchanged = db.find_one("shots", &json!({})).unwrap().unwrap();
    assert_eq!(unchanged.get("version"), Some(&json!(2)));
}
