#[cfg(test)]
mod tests {
    use relm_core::{
        AsValue, Hooks, Json, Record, Result, Row, RowReader, Struct, TableDef, Value, ViewDef,
        changed_fields, copy,
    };
    use std::sync::LazyLock;
    use time::{OffsetDateTime, macros::datetime};

    #[derive(Default, Debug, Clone, PartialEq)]
    struct Invoice {
        id: i64,
        customer: String,
        lines: Vec<i32>,
        discount: Option<i32>,
        metadata: Json,
        issued_at: Option<OffsetDateTime>,
    }

    static INVOICES: LazyLock<TableDef> = LazyLock::new(|| {
        TableDef::builder("invoices")
            .primary_key::<i64>("id")
            .column::<String>("customer")
            .column::<Vec<i32>>("lines")
            .column::<Option<i32>>("discount")
            .column::<Json>("metadata")
            .column::<Option<OffsetDateTime>>("issued_at")
            .build()
            .expect("Invalid invoices table")
    });

    impl Struct for Invoice {
        fn view() -> &'static ViewDef {
            &INVOICES
        }
        fn values(&self) -> Row {
            [
                self.id.as_value(),
                self.customer.clone().as_value(),
                self.lines.clone().as_value(),
                self.discount.as_value(),
                self.metadata.clone().as_value(),
                self.issued_at.as_value(),
            ]
            .into()
        }
        fn scan(&mut self, row: Row) -> Result<()> {
            let mut reader = RowReader::new(row, Self::view())?;
            self.id = reader.read()?;
            self.customer = reader.read()?;
            self.lines = reader.read()?;
            self.discount = reader.read()?;
            self.metadata = reader.read()?;
            self.issued_at = reader.read()?;
            Ok(())
        }
    }

    impl Hooks for Invoice {}

    impl Record for Invoice {
        fn table() -> &'static TableDef {
            &INVOICES
        }
    }

    fn invoice() -> Invoice {
        Invoice {
            id: 7,
            customer: "Initech".into(),
            lines: vec![100, 250],
            discount: Some(10),
            metadata: Json(r#"{"currency":"EUR","paid":false}"#.into()),
            issued_at: Some(datetime!(2025-01-31 09:30 UTC)),
        }
    }

    #[test]
    fn copy_is_independent() {
        let mut source = invoice();
        let snapshot = copy(&source).expect("Failed to copy the invoice");
        assert_eq!(snapshot, source);
        assert!(changed_fields(&source, &snapshot).is_empty());

        source.lines.push(999);
        source.lines[0] = 1;
        source.discount = None;
        source.customer.push_str(" LLC");
        assert_eq!(snapshot.lines, [100, 250]);
        assert_eq!(snapshot.discount, Some(10));
        assert_eq!(snapshot.customer, "Initech");
        assert_eq!(
            changed_fields(&snapshot, &source),
            ["customer", "lines", "discount"]
        );
    }

    #[test]
    fn every_field_is_tracked() {
        let old = invoice();
        let mutations: [(&str, fn(&mut Invoice)); 6] = [
            ("id", |v| v.id = 8),
            ("customer", |v| v.customer = "Globex".into()),
            ("lines", |v| v.lines.truncate(1)),
            ("discount", |v| v.discount = Some(11)),
            ("metadata", |v| v.metadata = Json(r#"{"currency":"USD","paid":false}"#.into())),
            ("issued_at", |v| v.issued_at = None),
        ];
        for (column, mutate) in mutations {
            let mut new = old.clone();
            mutate(&mut new);
            assert_eq!(changed_fields(&old, &new), [column]);
        }
    }

    #[test]
    fn equivalent_values_are_unchanged() {
        let old = invoice();
        let mut new = old.clone();
        new.metadata = Json(r#"{ "paid": false, "currency": "EUR" }"#.into());
        new.issued_at = old
            .issued_at
            .map(|v| v.to_offset(time::macros::offset!(-5)));
        assert!(changed_fields(&old, &new).is_empty());

        new.lines = vec![100, 250, 0];
        assert_eq!(changed_fields(&old, &new), ["lines"]);
    }

    #[test]
    fn primary_key() {
        let mut invoice = invoice();
        assert!(!invoice.primary_key_empty());
        assert_eq!(&*invoice.primary_key_values(), [7i64.as_value()]);
        invoice
            .set_primary_key([42i64.as_value()].into())
            .expect("Failed to set the key");
        assert_eq!(invoice.id, 42);
        assert_eq!(invoice.customer, "Initech");
        assert!(
            invoice
                .set_primary_key([1i64.as_value(), 2i64.as_value()].into())
                .is_err()
        );
        assert!(Invoice::default().primary_key_empty());
    }

    #[test]
    fn scan_reports_the_column() {
        let mut row = invoice().values().into_vec();
        row[3] = Value::from("ten");
        let error = Invoice::from_row(row.into()).expect_err("A string is not a discount");
        assert!(format!("{error:#}").contains("discount"));
        assert!(Invoice::from_row([7i64.as_value()].into()).is_err());
    }
}
