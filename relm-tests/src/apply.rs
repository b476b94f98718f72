use crate::{Document, Person};
use relm::{AsValue, Connection, Db, Json};
use uuid::Uuid;

pub async fn apply<C: Connection>(db: &Db<C>) {
    db.delete_from::<Person>("", &[])
        .await
        .expect("Failed to clear the people table");
    db.delete_from::<Document>("", &[])
        .await
        .expect("Failed to clear the documents table");

    // Missing row, inserted with the requested key
    let id = 4242i64;
    let created = db
        .apply::<Person>([id.as_value()], |p| p.name = "Barbara".into())
        .await
        .expect("Failed to apply to a missing person");
    assert_eq!(created.id, id);
    assert!(created.updated_at.is_some());
    let loaded = db
        .find_by_primary_key_from::<Person>([id.as_value()])
        .await
        .expect("Failed to find the created person");
    assert_eq!(loaded.name, "Barbara");

    // Existing row, nothing changed
    let same = db
        .apply::<Person>([id.as_value()], |p| p.name = "Barbara".into())
        .await
        .expect("Failed to apply a no op");
    assert_eq!(same, loaded);

    // Existing row, one field changed
    let renamed = db
        .apply::<Person>([id.as_value()], |p| {
            p.name = "Barbara Liskov".into();
            p.tags.push("substitution".into());
        })
        .await
        .expect("Failed to rename Barbara");
    assert_ne!(renamed.updated_at, loaded.updated_at);
    let reloaded = db
        .find_by_primary_key_from::<Person>([id.as_value()])
        .await
        .expect("Failed to find the renamed person");
    assert_eq!(reloaded, renamed);

    // Client generated key
    let id = Uuid::new_v4();
    let document = db
        .apply::<Document>([id.as_value()], |d| {
            d.title = "Notes".into();
            d.body = Json(r#"{"lines":["one","two"],"draft":true}"#.into());
        })
        .await
        .expect("Failed to create the document");
    assert_eq!(document.id, id, "An explicit key must not be replaced");
    let unchanged = db
        .apply::<Document>([id.as_value()], |d| {
            d.body = Json(r#"{ "draft": true, "lines": ["one", "two"] }"#.into());
        })
        .await
        .expect("Failed to apply an equivalent body");
    assert_eq!(unchanged.version, 0, "An equivalent json body is not a change");
    let edited = db
        .apply::<Document>([id.as_value()], |d| d.title = "Meeting notes".into())
        .await
        .expect("Failed to edit the document");
    assert_eq!(edited.version, 1);
    let loaded = db
        .find_by_primary_key_from::<Document>([id.as_value()])
        .await
        .expect("Failed to find the document");
    assert_eq!(loaded.title, "Meeting notes");
    assert_eq!(
        loaded.body.decode().expect("Failed to decode the body"),
        serde_json::json!({ "lines": ["one", "two"], "draft": true })
    );
}
