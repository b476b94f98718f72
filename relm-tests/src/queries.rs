use crate::{Person, PersonName};
use relm::{
    AsValue, Connection, Db, ErrorExt, ErrorKind, Value,
    stream::{StreamExt, TryStreamExt},
};
use std::pin::pin;

pub async fn queries<C: Connection>(db: &Db<C>) {
    db.delete_from::<Person>("", &[])
        .await
        .expect("Failed to clear the people table");

    let mut people = ["Barbara", "Donald", "Frances", "John", "Ken"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| Person {
            name: name.into(),
            email: (i % 2 == 0).then(|| format!("{}@example.com", name.to_lowercase())),
            tags: vec![format!("group{}", i % 2)],
            ..Default::default()
        })
        .collect::<Vec<_>>();
    for person in &mut people {
        db.insert(person).await.expect("Failed to insert a person");
    }

    // Find one
    let donald = db
        .find_one_from::<Person>("name", "Donald")
        .await
        .expect("Failed to find Donald");
    assert_eq!(donald.id, people[1].id);
    let mut frances = Person::default();
    db.find_one_to(&mut frances, "email", "frances@example.com")
        .await
        .expect("Failed to find Frances by email");
    assert_eq!(frances.name, "Frances");
    let nameless = db
        .find_one_from::<Person>("email", None::<String>)
        .await
        .expect("Failed to find a person without email");
    assert!(nameless.email.is_none());
    assert!(
        db.find_one_from::<Person>("name", "Grace")
            .await
            .is_kind(ErrorKind::NoRows)
    );

    // Find all
    let ids = [people[0].id, people[3].id, people[4].id + 100]
        .into_iter()
        .map(AsValue::as_value)
        .collect::<Vec<Value>>();
    let mut found = db
        .find_all_from::<Person>("id", &ids)
        .await
        .expect("Failed to find people by id");
    found.sort_by_key(|v| v.id);
    assert_eq!(
        found.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["Barbara", "John"]
    );
    let none = db
        .find_all_from::<Person>("id", &[])
        .await
        .expect("Failed to find nobody");
    assert!(none.is_empty());

    // Select with a tail
    let dialect = db.dialect();
    let tail = format!(
        "WHERE email IS NULL ORDER BY name DESC LIMIT {}",
        people.len()
    );
    let names = db
        .select_all_from::<PersonName>(&tail, &[])
        .await
        .expect("Failed to select the people without email");
    assert_eq!(
        names.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["John", "Donald"]
    );
    let tail = format!(
        "WHERE name = {} AND id = {}",
        dialect.placeholder(1),
        dialect.placeholder(2)
    );
    let ken = db
        .select_one_from::<PersonName>(&tail, &["Ken".into(), people[4].id.as_value()])
        .await
        .expect("Failed to select Ken");
    assert_eq!(ken.id, people[4].id);
    assert!(
        db.select_one_from::<PersonName>(&tail, &["Ken".into(), people[0].id.as_value()])
            .await
            .is_kind(ErrorKind::NoRows)
    );

    // Stream
    let tail = "ORDER BY name ASC";
    {
        let mut rows = pin!(db.select_rows::<Person>(tail, &[]));
        let first = rows
            .next()
            .await
            .expect("The stream must yield a row")
            .expect("Failed to decode the first row");
        assert_eq!(first.name, "Barbara");
        assert_eq!(first.tags, ["group0"]);
    }
    let all = db
        .select_rows::<Person>(tail, &[])
        .try_collect::<Vec<_>>()
        .await
        .expect("Failed to stream the people");
    assert_eq!(all.len(), people.len());
    assert!(all.windows(2).all(|v| v[0].name < v[1].name));

    // Reload
    let mut john = people[3].clone();
    john.name = "Johnny".into();
    db.reload(&mut john).await.expect("Failed to reload John");
    assert_eq!(john, people[3]);

    // Delete by tail
    let deleted = db
        .delete_from::<Person>("WHERE email IS NULL", &[])
        .await
        .expect("Failed to delete the people without email");
    assert_eq!(deleted, 2);
    let left = db
        .select_all_from::<Person>("", &[])
        .await
        .expect("Failed to select the remaining people");
    assert_eq!(left.len(), 3);
    assert!(left.iter().all(|v| v.email.is_some()));
}
