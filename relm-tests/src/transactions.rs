use crate::{Person, silent_logs};
use futures::FutureExt;
use relm::{AsValue, Connection, Db, Error, ErrorExt, ErrorKind, Result, Tx};
use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
};

async fn exists<C: Connection>(db: &Db<C>, id: i64) -> bool {
    match db.find_by_primary_key_from::<Person>([id.as_value()]).await {
        Ok(..) => true,
        Err(e) if e.is_kind(ErrorKind::NoRows) => false,
        Err(e) => panic!("Failed to look up person {id}: {e:#}"),
    }
}

pub async fn transactions<C: Connection>(db: &Db<C>) {
    db.delete_from::<Person>("", &[])
        .await
        .expect("Failed to clear the people table");
    let calls = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    // Commit runs the callbacks in registration order
    let record = |name: &'static str| {
        let calls = calls.clone();
        move || -> Result<()> {
            calls.lock().unwrap().push(name);
            Ok(())
        }
    };
    let id = db
        .in_transaction(async |tx: &Tx<C>| -> Result<i64> {
            assert!(tx.in_transaction());
            let mut person = Person {
                name: "Niklaus".into(),
                ..Default::default()
            };
            tx.insert(&mut person).await?;
            tx.add_on_commit(record("first"));
            tx.add_on_commit(record("second"));
            tx.add_on_commit(record("third"));
            assert!(calls.lock().unwrap().is_empty());
            let found = tx
                .find_by_primary_key_from::<Person>([person.id.as_value()])
                .await?;
            assert_eq!(found.name, "Niklaus");
            Ok(person.id)
        })
        .await
        .expect("Failed to commit the transaction");
    assert_eq!(*calls.lock().unwrap(), ["first", "second", "third"]);
    assert!(exists(db, id).await);
    calls.lock().unwrap().clear();

    // A failure rolls back and no callback runs
    let mut person = Person {
        name: "Tony".into(),
        ..Default::default()
    };
    let result = db
        .in_transaction(async |tx: &Tx<C>| -> Result<()> {
            tx.insert(&mut person).await?;
            tx.add_on_commit(record("never"));
            Err(Error::msg("Changed my mind"))
        })
        .await;
    assert_eq!(
        result.expect_err("The transaction must fail").to_string(),
        "Changed my mind"
    );
    assert!(calls.lock().unwrap().is_empty());
    assert_ne!(person.id, 0);
    assert!(!exists(db, person.id).await);

    // A panic rolls back and keeps unwinding
    let mut person = Person {
        name: "Robin".into(),
        ..Default::default()
    };
    let result;
    silent_logs! {
        result = AssertUnwindSafe(db.in_transaction(async |tx: &Tx<C>| -> Result<()> {
            tx.insert(&mut person).await?;
            panic!("Robin panicked");
        }))
        .catch_unwind()
        .await;
    }
    assert!(result.is_err(), "The panic must reach the caller");
    assert_ne!(person.id, 0);
    assert!(!exists(db, person.id).await);

    // Commit and rollback happen once
    let tx = db.begin().await.expect("Failed to begin");
    let mut person = Person {
        name: "Barbara".into(),
        ..Default::default()
    };
    tx.insert(&mut person).await.expect("Failed to insert Barbara");
    tx.commit().await.expect("Failed to commit");
    assert!(tx.is_finished());
    assert!(tx.commit().await.is_kind(ErrorKind::TransactionAlreadyFinished));
    assert!(
        tx.rollback()
            .await
            .is_kind(ErrorKind::TransactionAlreadyFinished)
    );
    assert!(exists(db, person.id).await);

    let tx = db.begin().await.expect("Failed to begin");
    tx.delete(&person).await.expect("Failed to delete Barbara");
    tx.rollback().await.expect("Failed to roll back");
    assert!(tx.rollback().await.is_kind(ErrorKind::TransactionAlreadyFinished));
    assert!(tx.commit().await.is_kind(ErrorKind::TransactionAlreadyFinished));
    assert!(exists(db, person.id).await);

    // The first failing callback stops the others, the data stays committed
    let mut person = Person {
        name: "Frances".into(),
        ..Default::default()
    };
    let result = db
        .in_transaction(async |tx: &Tx<C>| -> Result<()> {
            tx.insert(&mut person).await?;
            tx.add_on_commit(record("first"));
            tx.add_on_commit(|| Err(Error::msg("Mail server unreachable")));
            tx.add_on_commit(record("third"));
            Ok(())
        })
        .await;
    assert_eq!(
        result.expect_err("The callback must fail").to_string(),
        "Mail server unreachable"
    );
    assert_eq!(*calls.lock().unwrap(), ["first"]);
    assert!(exists(db, person.id).await);
}
