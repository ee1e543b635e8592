use serde_json::{json, Value};
use shotbase_core::{Database, Document, FindOptions, ReturnDocument};
use std::env;

fn object(value: Value) -> Result<Document, String> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("demo document must be a JSON object".to_string()),
    }
}

fn print_docs(label: &str, docs: &[Document]) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}:", label);
    for doc in docs {
        println!("{}", serde_json::to_string_pretty(doc)?);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = env::args()
        .nth(1)
        .unwrap_or_else(|| "./task_board_data".to_string());
    let db = Database::open(&root)?;
    println!("database root: {}", root);

    // Start from a clean slate so repeated runs stay readable.
    db.drop_collection("tasks")?;

    db.insert_many(
        "tasks",
        vec![
            object(json!({
                "name": "Blocking pass", "shot": "sq010_sh0040",
                "department": "animation", "status": "active",
                "priority": 2, "hours": 6
            }))?,
            object(json!({
                "name": "Fur groom", "shot": "sq010_sh0040",
                "department": "cfx", "status": "active",
                "priority": 3, "hours": 9
            }))?,
            object(json!({
                "name": "Roto cleanup", "shot": "sq020_sh0110",
                "department": "comp", "status": "done",
                "priority": 1, "hours": 4
            }))?,
        ],
    )?;

    let active = db.find("tasks", &json!({"status": "active"}))?;
    print_docs("active tasks", &active)?;

    let top = db.find_with_options(
        "tasks",
        &json!({}),
        &FindOptions::new()
            .with_sort(&[("priority", -1)])
            .with_limit(1)
            .with_projection(&[("name", 1), ("priority", 1)]),
    )?;
    print_docs("highest priority", &top)?;

    let reviewed = db.find_one_and_update(
        "tasks",
        &json!({"name": "Fur groom"}),
        &json!({"$set": {"status": "review"}, "$inc": {"revision": 1}}),
        ReturnDocument::After,
    )?;
    if let Some(doc) = reviewed {
        print_docs("sent to review", &[doc])?;
    }

    let by_status = db.aggregate(
        "tasks",
        &json!([
            {"$group": {"_id": "$status", "tasks": {"$count": {}}, "hours": {"$sum": "$hours"}}},
            {"$sort": {"hours": -1}}
        ]),
    )?;
    print_docs("hours by status", &by_status)?;

    let departments = db.distinct("tasks", "department", &json!({}))?;
    println!("\ndepartments: {:?}", departments);

    let stats = db.get_stats()?;
    println!(
        "collections: {}, documents: {}",
        stats.collections.len(),
        stats.total_documents
    );

    Ok(())
}
