use crate::{Membership, Person};
use relm::{AsValue, Connection, Db, ErrorExt, ErrorKind};

pub async fn commands<C: Connection>(db: &Db<C>) {
    db.delete_from::<Person>("", &[])
        .await
        .expect("Failed to clear the people table");

    // Insert
    let mut ada = Person {
        name: "Ada".into(),
        email: Some("ada@example.com".into()),
        tags: vec!["math".into(), "engines".into()],
        ..Default::default()
    };
    db.insert(&mut ada).await.expect("Failed to insert Ada");
    assert_ne!(ada.id, 0, "The generated id must be written back");
    assert!(ada.updated_at.is_some(), "before_insert must run");
    let loaded = db
        .find_by_primary_key_from::<Person>([ada.id.as_value()])
        .await
        .expect("Failed to find Ada");
    assert_eq!(loaded.id, ada.id);
    assert_eq!(loaded.name, "Ada");
    assert_eq!(loaded.email.as_deref(), Some("ada@example.com"));
    assert_eq!(loaded.tags, ["math", "engines"]);

    // Omitted email is left to the database
    let mut grace = Person {
        name: "Grace".into(),
        ..Default::default()
    };
    db.insert(&mut grace).await.expect("Failed to insert Grace");
    assert_ne!(grace.id, ada.id);
    let loaded = db
        .find_by_primary_key_from::<Person>([grace.id.as_value()])
        .await
        .expect("Failed to find Grace");
    assert_eq!(loaded.email, None);

    // Update
    ada.name = "Ada Lovelace".into();
    ada.email = None;
    db.update(&mut ada).await.expect("Failed to update Ada");
    let mut loaded = Person {
        id: ada.id,
        ..Default::default()
    };
    db.reload(&mut loaded).await.expect("Failed to reload Ada");
    assert_eq!(loaded.name, "Ada Lovelace");
    assert_eq!(loaded.email, None);

    // Update only the listed columns
    ada.name = "Countess of Lovelace".into();
    ada.tags.push("poetry".into());
    db.update_only(&mut ada, &["tags"])
        .await
        .expect("Failed to update the tags of Ada");
    db.reload(&mut loaded).await.expect("Failed to reload Ada");
    assert_eq!(loaded.name, "Ada Lovelace");
    assert_eq!(loaded.tags, ["math", "engines", "poetry"]);

    // Missing rows and keys
    let mut ghost = Person {
        id: ada.id + grace.id + 1000,
        name: "Ghost".into(),
        ..Default::default()
    };
    assert!(db.update(&mut ghost).await.is_kind(ErrorKind::NoRows));
    assert!(db.delete(&ghost).await.is_kind(ErrorKind::NoRows));
    let mut nobody = Person::default();
    assert!(db.update(&mut nobody).await.is_kind(ErrorKind::NoPrimaryKey));

    // Upsert and save
    let mut alan = Person {
        name: "Alan".into(),
        ..Default::default()
    };
    db.upsert(&mut alan).await.expect("Failed to upsert Alan");
    assert_ne!(alan.id, 0);
    alan.email = Some("alan@example.com".into());
    db.upsert(&mut alan).await.expect("Failed to upsert Alan again");
    db.reload(&mut alan).await.expect("Failed to reload Alan");
    assert_eq!(alan.email.as_deref(), Some("alan@example.com"));

    let mut edsger = Person {
        id: ghost.id + 1,
        name: "Edsger".into(),
        ..Default::default()
    };
    assert!(db.upsert(&mut edsger).await.is_kind(ErrorKind::NoRows));
    db.save(&mut edsger).await.expect("Failed to save Edsger");
    assert_eq!(edsger.id, ghost.id + 1, "An explicit key is kept");
    edsger.name = "Edsger Dijkstra".into();
    db.save(&mut edsger).await.expect("Failed to save Edsger again");
    let loaded = db
        .find_by_primary_key_from::<Person>([edsger.id.as_value()])
        .await
        .expect("Failed to find Edsger");
    assert_eq!(loaded.name, "Edsger Dijkstra");

    // Unique violation
    let mut twin = edsger.clone();
    assert!(db.insert(&mut twin).await.is_kind(ErrorKind::UniqueViolation));

    // Delete
    db.delete(&edsger).await.expect("Failed to delete Edsger");
    assert!(db.delete(&edsger).await.is_kind(ErrorKind::NoRows));
    assert!(
        db.find_by_primary_key_from::<Person>([edsger.id.as_value()])
            .await
            .is_kind(ErrorKind::NoRows)
    );
}

pub async fn composite_keys<C: Connection>(db: &Db<C>) {
    db.delete_from::<Membership>("", &[])
        .await
        .expect("Failed to clear the memberships table");

    let mut memberships = [
        Membership {
            team_id: 1,
            person_id: 10,
            role: "owner".into(),
        },
        Membership {
            team_id: 1,
            person_id: 11,
            role: "member".into(),
        },
        Membership {
            team_id: 2,
            person_id: 10,
            role: "member".into(),
        },
    ];
    for membership in &mut memberships {
        db.insert(membership)
            .await
            .expect("Failed to insert a membership");
    }
    assert_eq!(memberships[0].team_id, 1);
    assert_eq!(memberships[0].person_id, 10);

    let mut duplicate = memberships[2].clone();
    assert!(
        db.insert(&mut duplicate)
            .await
            .is_kind(ErrorKind::UniqueViolation)
    );

    memberships[1].role = "admin".into();
    db.update(&mut memberships[1])
        .await
        .expect("Failed to update a membership");
    let loaded = db
        .find_by_primary_key_from::<Membership>([1i64.as_value(), 11i64.as_value()])
        .await
        .expect("Failed to find the membership");
    assert_eq!(loaded.role, "admin");

    let mut partial = Membership {
        team_id: 1,
        person_id: 0,
        role: "owner".into(),
    };
    assert!(
        db.update(&mut partial)
            .await
            .is_kind(ErrorKind::NoPrimaryKey),
        "A key with a zero component is empty"
    );

    let mut team = db
        .find_all_from::<Membership>("team_id", &[1i64.as_value()])
        .await
        .expect("Failed to find the memberships of team 1");
    team.sort_by_key(|v| v.person_id);
    assert_eq!(team, memberships[..2]);

    db.delete(&memberships[0])
        .await
        .expect("Failed to delete a membership");
    let deleted = db
        .delete_from::<Membership>("", &[])
        .await
        .expect("Failed to clear the memberships table");
    assert_eq!(deleted, 2);
}
