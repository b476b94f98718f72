#[cfg(test)]
mod tests {
    use relm::{AsValue, Context, Db, ErrorExt, ErrorKind, MySql, Result, Tx};
    use relm_tests::{MemoryDatabase, Person, init_logs};
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    fn db() -> (MemoryDatabase, Db<MemoryDatabase>) {
        init_logs();
        let database = MemoryDatabase::new("primary", Arc::new(MySql));
        database.create_table::<Person>();
        let db = Db::new(database.clone(), database.dialect());
        (database, db)
    }

    fn person(name: &str) -> Person {
        Person {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn commit_and_rollback_reach_the_driver_once() {
        let (database, db) = db();
        db.in_transaction(async |tx: &Tx<MemoryDatabase>| -> Result<()> {
            tx.insert(&mut person("Ada")).await
        })
        .await
        .expect("Failed to commit");
        assert_eq!(
            (database.begins(), database.commits(), database.rollbacks()),
            (1, 1, 0)
        );
        let journal = database.journal();
        assert_eq!(journal.first().map(|v| v.query.as_str()), Some("BEGIN"));
        assert_eq!(journal.last().map(|v| v.query.as_str()), Some("COMMIT"));

        let tx = db.begin().await.expect("Failed to begin");
        tx.rollback().await.expect("Failed to roll back");
        let _ = tx.rollback().await;
        let _ = tx.commit().await;
        drop(tx);
        tokio::task::yield_now().await;
        assert_eq!(
            (database.begins(), database.commits(), database.rollbacks()),
            (2, 1, 1)
        );
        assert_eq!(database.row_count("people"), 1);
    }

    #[tokio::test]
    async fn failures_roll_back() {
        let (database, db) = db();
        let result = db
            .in_transaction(async |tx: &Tx<MemoryDatabase>| -> Result<()> {
                tx.insert(&mut person("Ada")).await?;
                tx.insert(&mut person("Grace")).await?;
                tx.exec("DROP TABLE people", &[]).await?;
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(database.rollbacks(), 1);
        assert_eq!(database.commits(), 0);
        assert_eq!(database.row_count("people"), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let (database, db) = db();
        {
            let tx = db.begin().await.expect("Failed to begin");
            tx.insert(&mut person("Ada")).await.expect("Failed to insert");
        }
        for _ in 0..100 {
            if database.rollbacks() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(database.rollbacks(), 1);
        assert_eq!(database.row_count("people"), 0);
    }

    #[tokio::test]
    async fn failed_commit_skips_callbacks() {
        let (database, db) = db();
        database.fail_commits(true);
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let result = db
            .in_transaction(async |tx: &Tx<MemoryDatabase>| -> Result<()> {
                tx.insert(&mut person("Ada")).await?;
                tx.add_on_commit(move || {
                    flag.store(true, Ordering::Relaxed);
                    Ok(())
                });
                Ok(())
            })
            .await;
        let error = result.expect_err("The commit must fail");
        assert_eq!(error.kind(), None);
        assert!(error.to_string().contains("could not serialize"));
        assert!(!called.load(Ordering::Relaxed));
        assert_eq!(database.row_count("people"), 0);
    }

    #[tokio::test]
    async fn callbacks_on_manual_commit() {
        let (_database, db) = db();
        let called = Arc::new(AtomicBool::new(false));
        let tx = db.begin().await.expect("Failed to begin");
        let flag = called.clone();
        tx.add_on_commit(move || {
            flag.store(true, Ordering::Relaxed);
            Ok(())
        });
        tx.rollback().await.expect("Failed to roll back");
        assert!(!called.load(Ordering::Relaxed), "Rolled back, not called");

        let tx = db.begin().await.expect("Failed to begin");
        let flag = called.clone();
        tx.add_on_commit(move || {
            flag.store(true, Ordering::Relaxed);
            Ok(())
        });
        tx.commit().await.expect("Failed to commit");
        assert!(called.load(Ordering::Relaxed));
    }

    #[tokio::test]
    #[should_panic(expected = "outside of a transaction")]
    async fn callbacks_need_a_transaction() {
        let (_database, db) = db();
        db.add_on_commit(|| Ok(()));
    }

    #[tokio::test]
    #[should_panic(expected = "after the transaction finished")]
    async fn callbacks_need_an_open_transaction() {
        let (_database, db) = db();
        let tx = db.begin().await.expect("Failed to begin");
        tx.commit().await.expect("Failed to commit");
        tx.add_on_commit(|| Ok(()));
    }

    #[tokio::test]
    #[should_panic(expected = "after the transaction finished")]
    async fn callbacks_after_rollback() {
        let (_database, db) = db();
        let tx = db.begin().await.expect("Failed to begin");
        tx.rollback().await.expect("Failed to roll back");
        tx.querier().with_tag("late").add_on_commit(|| Ok(()));
    }

    #[tokio::test]
    async fn transaction_context() {
        let (database, db) = db();
        let context = Context::background().with_cancel();
        let result = db
            .in_transaction_with(context.clone(), async |tx: &Tx<MemoryDatabase>| -> Result<()> {
                tx.insert(&mut person("Ada")).await?;
                context.cancel();
                tx.insert(&mut person("Grace")).await?;
                Ok(())
            })
            .await;
        assert!(result.is_kind(ErrorKind::Cancelled));
        assert_eq!(database.rollbacks(), 1, "Rollback is not bound to the context");
        assert_eq!(database.row_count("people"), 0);

        let tx = db.begin().await.expect("Failed to begin");
        assert!(!tx.context().is_cancelled());
        let lookup = tx
            .find_by_primary_key_from::<Person>([1i64.as_value()])
            .await;
        assert!(lookup.is_kind(ErrorKind::NoRows));
        tx.commit().await.expect("Failed to commit");
    }
}
