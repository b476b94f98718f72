use crate::{DriverError, Error, TableDef, TableRef, ViewDef, separated_by};
use std::{fmt::Debug, sync::Arc};
use url::Url;

/// How a dialect hands the generated primary key back after an `INSERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// `INSERT ... RETURNING <pk>` executed as a single row query.
    Returning,
    /// Plain statement, the key is the driver reported last insert id.
    LastInsertId,
}

/// Per backend SQL rules: placeholder syntax, error classification and statement synthesis.
///
/// Only the first four methods are backend specific, the `write_*` methods produce the
/// statement shapes shared by every backend and can be overridden where a backend differs.
/// Placeholders are numbered from 1.
pub trait Dialect: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn placeholder(&self, index: usize) -> String;

    /// Whether `error` is the backend's unique constraint violation.
    fn is_unique_violation(&self, error: &Error) -> bool;

    fn insert_mode(&self) -> InsertMode;

    /// Placeholders `1..=count`.
    fn placeholders(&self, count: usize) -> Vec<String> {
        self.placeholders_from(1, count)
    }

    /// Placeholders `start..start + count`.
    fn placeholders_from(&self, start: usize, count: usize) -> Vec<String> {
        (start..start + count).map(|i| self.placeholder(i)).collect()
    }

    fn write_identifier(&self, out: &mut String, value: &str) {
        out.push_str(value);
    }

    /// Write `value` replacing every `search` with `replace`.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_table_ref_quoted(&self, out: &mut String, value: &TableRef) {
        if !value.schema.is_empty() {
            self.write_identifier_quoted(out, &value.schema);
            out.push('.');
        }
        self.write_identifier_quoted(out, &value.name);
    }

    fn write_table_ref(&self, out: &mut String, value: &TableRef) {
        if !value.schema.is_empty() {
            self.write_identifier(out, &value.schema);
            out.push('.');
        }
        self.write_identifier(out, &value.name);
    }

    fn write_column_ref(&self, out: &mut String, table: &TableRef, column: &str) {
        self.write_table_ref(out, table);
        out.push('.');
        self.write_identifier(out, column);
    }

    /// Body of an insert without columns.
    fn write_default_values(&self, out: &mut String) {
        out.push_str("DEFAULT VALUES");
    }

    /// `INSERT INTO <table> (<columns>) VALUES (<placeholders>)` followed by the returning
    /// clause on returning dialects.
    fn write_insert(&self, out: &mut String, table: &TableDef, columns: &[&str]) {
        out.push_str("INSERT INTO ");
        self.write_table_ref(out, &table.table_ref);
        out.push(' ');
        if columns.is_empty() {
            self.write_default_values(out);
        } else {
            out.push('(');
            separated_by(out, columns, |out, v| self.write_identifier(out, v), ", ");
            out.push_str(") VALUES (");
            separated_by(
                out,
                self.placeholders(columns.len()),
                |out, v| out.push_str(&v),
                ", ",
            );
            out.push(')');
        }
        if self.insert_mode() == InsertMode::Returning {
            out.push_str(" RETURNING ");
            separated_by(
                out,
                table.primary_key_columns(),
                |out, v| self.write_identifier(out, v.name()),
                ", ",
            );
        }
    }

    /// `pk1 = <ph> AND pk2 = <ph> ...` numbering placeholders from `first_placeholder`.
    fn write_primary_key_condition(
        &self,
        out: &mut String,
        table: &TableDef,
        first_placeholder: usize,
    ) {
        separated_by(
            out,
            table.primary_key_columns().iter().enumerate(),
            |out, (i, v)| {
                self.write_identifier(out, v.name());
                out.push_str(" = ");
                out.push_str(&self.placeholder(first_placeholder + i));
            },
            " AND ",
        );
    }

    /// `UPDATE <table> SET <col> = <ph>, ... WHERE <pk condition>`, the key placeholders
    /// continue the numbering after the `SET` ones.
    fn write_update(&self, out: &mut String, table: &TableDef, columns: &[&str]) {
        out.push_str("UPDATE ");
        self.write_table_ref(out, &table.table_ref);
        out.push_str(" SET ");
        separated_by(
            out,
            columns.iter().enumerate(),
            |out, (i, v)| {
                self.write_identifier(out, v);
                out.push_str(" = ");
                out.push_str(&self.placeholder(i + 1));
            },
            ", ",
        );
        out.push_str(" WHERE ");
        self.write_primary_key_condition(out, table, columns.len() + 1);
    }

    fn write_delete(&self, out: &mut String, table: &TableDef) {
        out.push_str("DELETE FROM ");
        self.write_table_ref(out, &table.table_ref);
        out.push_str(" WHERE ");
        self.write_primary_key_condition(out, table, 1);
    }

    /// `SELECT <table>.<col>, ... FROM <table> <tail>`, the tail is copied verbatim.
    fn write_select(&self, out: &mut String, view: &ViewDef, tail: &str) {
        out.push_str("SELECT ");
        separated_by(
            out,
            view.column_names(),
            |out, v| self.write_column_ref(out, &view.table_ref, v),
            ", ",
        );
        out.push_str(" FROM ");
        self.write_table_ref(out, &view.table_ref);
        if !tail.is_empty() {
            out.push(' ');
            out.push_str(tail);
        }
    }
}

fn driver_error(error: &Error) -> Option<&DriverError> {
    error.chain().find_map(|e| e.downcast_ref::<DriverError>())
}

/// PostgreSQL: `$n` placeholders, `RETURNING` keys, SQLSTATE `23505`.
#[derive(Default, Debug, Clone, Copy)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }
    fn is_unique_violation(&self, error: &Error) -> bool {
        driver_error(error).is_some_and(|e| e.sqlstate.as_deref() == Some("23505"))
    }
    fn insert_mode(&self) -> InsertMode {
        InsertMode::Returning
    }
}

/// MySQL: `?` placeholders, last insert id, error `1062` (`ER_DUP_ENTRY`).
#[derive(Default, Debug, Clone, Copy)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }
    fn placeholder(&self, _index: usize) -> String {
        "?".into()
    }
    fn is_unique_violation(&self, error: &Error) -> bool {
        driver_error(error).is_some_and(|e| e.code == Some(1062))
    }
    fn insert_mode(&self) -> InsertMode {
        InsertMode::LastInsertId
    }
    fn write_default_values(&self, out: &mut String) {
        out.push_str("() VALUES ()");
    }
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(out, value, '`', "``");
        out.push('`');
    }
}

/// SQLite: `?` placeholders, last insert id, extended codes `2067` (`SQLITE_CONSTRAINT_UNIQUE`)
/// and `1555` (`SQLITE_CONSTRAINT_PRIMARYKEY`).
#[derive(Default, Debug, Clone, Copy)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }
    fn placeholder(&self, _index: usize) -> String {
        "?".into()
    }
    fn is_unique_violation(&self, error: &Error) -> bool {
        driver_error(error).is_some_and(|e| matches!(e.code, Some(2067) | Some(1555)))
    }
    fn insert_mode(&self) -> InsertMode {
        InsertMode::LastInsertId
    }
}

/// Dialect for a driver name, `None` when unknown.
pub fn dialect_for_driver(driver: &str) -> Option<Arc<dyn Dialect>> {
    match driver {
        "postgres" | "postgresql" | "pgx" => Some(Arc::new(Postgres)),
        "mysql" => Some(Arc::new(MySql)),
        "sqlite" | "sqlite3" => Some(Arc::new(Sqlite)),
        _ => None,
    }
}

/// Dialect for a connection url, chosen from its scheme (`postgres://...`, `sqlite://...`).
pub fn dialect_for_url(url: &str) -> Option<Arc<dyn Dialect>> {
    let url = Url::parse(url).ok()?;
    dialect_for_driver(url.scheme())
}
