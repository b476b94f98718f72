#[cfg(test)]
mod tests {
    use relm_core::{TableDef, Value, ViewDef};
    use uuid::Uuid;

    #[test]
    fn table_layout() {
        let table = TableDef::builder("accounts")
            .schema("bank")
            .primary_key::<Uuid>("id")
            .column::<String>("owner")
            .omit_empty::<Option<i64>>("limit")
            .column::<i32>("revision")
            .updated_column("revision")
            .build()
            .expect("Failed to build the accounts table");
        assert_eq!(table.name(), "accounts");
        assert_eq!(table.schema(), "bank");
        assert_eq!(table.table_ref.full_name(), "bank.accounts");
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            ["id", "owner", "limit", "revision"]
        );
        assert_eq!(table.primary_key, 1);
        assert_eq!(table.primary_key_columns()[0].name(), "id");
        assert_eq!(
            table
                .non_key_columns()
                .iter()
                .map(|c| c.name())
                .collect::<Vec<_>>(),
            ["owner", "limit", "revision"]
        );
        assert_eq!(table.updated_column(), Some("revision"));
        assert_eq!(table.position("limit"), Some(2));
        assert_eq!(table.position("balance"), None);

        let id = &table.columns()[0];
        assert!(id.omit_empty, "Key columns are always omit empty");
        assert!(id.is_zero(&Value::Uuid(Some(Uuid::nil()))));
        assert!(!id.is_zero(&Value::Uuid(Some(Uuid::new_v4()))));
        let limit = &table.columns()[2];
        assert!(limit.omit_empty);
        assert!(limit.is_zero(&Value::Int64(None)));
        assert!(!limit.is_zero(&Value::Int64(Some(0))));
        let revision = &table.columns()[3];
        assert!(!revision.omit_empty);
        assert_eq!(revision.zero, Value::Int32(Some(0)));
    }

    #[test]
    fn view_layout() {
        let view = ViewDef::builder("account_balances")
            .column::<Uuid>("account")
            .column::<f64>("balance")
            .build()
            .expect("Failed to build the balances view");
        assert_eq!(view.table_ref.full_name(), "account_balances");
        assert_eq!(view.schema(), "");
        assert_eq!(view.columns().len(), 2);
        assert!(view.columns().iter().all(|c| !c.omit_empty));
    }

    #[test]
    fn invalid_definitions() {
        let error = TableDef::builder("t")
            .column::<String>("name")
            .build()
            .expect_err("A table without primary key is invalid");
        assert!(error.to_string().contains("primary key"));

        let error = TableDef::builder("t")
            .column::<String>("name")
            .primary_key::<i64>("id")
            .build()
            .expect_err("The key must come first");
        assert!(error.to_string().contains("must come before"));

        let error = TableDef::builder("t")
            .primary_key::<i64>("id")
            .column::<String>("name")
            .column::<String>("name")
            .build()
            .expect_err("Duplicated column");
        assert!(error.to_string().contains("declared twice"));

        let error = TableDef::builder("t")
            .primary_key::<i64>("id")
            .column::<String>("")
            .build()
            .expect_err("Empty column name");
        assert!(error.to_string().contains("Empty column name"));

        let error = TableDef::builder("t")
            .primary_key::<i64>("id")
            .updated_column("changed_at")
            .build()
            .expect_err("Unknown updated column");
        assert!(error.to_string().contains("changed_at"));

        let error = TableDef::builder("t")
            .primary_key::<i64>("id")
            .column::<String>("name")
            .updated_column("id")
            .build()
            .expect_err("Key used as updated column");
        assert!(error.to_string().contains("part of the primary key"));

        assert!(ViewDef::builder("v").build().is_err());
        assert!(ViewDef::builder("").column::<i32>("a").build().is_err());
    }
}
