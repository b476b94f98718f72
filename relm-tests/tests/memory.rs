#[cfg(test)]
mod tests {
    use relm::{Db, Dialect, MySql, Postgres, Sqlite};
    use relm_tests::{Document, MemoryDatabase, Membership, Person, execute_tests, init_logs};
    use std::sync::Arc;

    fn database(dialect: Arc<dyn Dialect>) -> MemoryDatabase {
        let database = MemoryDatabase::new("primary", dialect);
        database.create_table::<Person>();
        database.create_unique_index::<Person>("email");
        database.create_table::<Membership>();
        database.create_table::<Document>();
        database
    }

    #[tokio::test]
    async fn postgres() {
        init_logs();
        let database = database(Arc::new(Postgres));
        let db = Db::new(database.clone(), database.dialect());
        execute_tests(&db).await;
        assert!(database.journal().iter().any(|v| v.query.contains("RETURNING")));
    }

    #[tokio::test]
    async fn mysql() {
        init_logs();
        let database = database(Arc::new(MySql));
        let db = Db::new(database.clone(), database.dialect());
        execute_tests(&db).await;
        assert!(!database.journal().iter().any(|v| v.query.contains("RETURNING")));
    }

    #[tokio::test]
    async fn sqlite() {
        init_logs();
        let database = database(Arc::new(Sqlite));
        let db = Db::new(database.clone(), database.dialect());
        execute_tests(&db).await;
    }

    #[tokio::test]
    async fn with_replicas() {
        init_logs();
        let database = database(Arc::new(Postgres));
        let mut db = Db::new(database.clone(), database.dialect());
        db.add_replicas([database.replica("replica-1"), database.replica("replica-2")]);
        execute_tests(&db).await;
        let journal = database.journal();
        assert!(
            journal
                .iter()
                .filter(|v| &*v.connection != "primary")
                .all(|v| v.query.starts_with("SELECT")),
            "Only reads can reach a replica"
        );
        for replica in ["replica-1", "replica-2"] {
            assert!(journal.iter().any(|v| &*v.connection == replica));
        }
    }
}
