use crate::{AsValue, Error, Result, Value};
use std::{borrow::Cow, ops::Deref};

/// Possibly schema-qualified table or view identifier.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: Cow<'static, str>,
    pub schema: Cow<'static, str>,
}

impl TableRef {
    pub fn full_name(&self) -> String {
        let mut result = String::with_capacity(self.schema.len() + self.name.len() + 1);
        if !self.schema.is_empty() {
            result.push_str(&self.schema);
            result.push('.');
        }
        result.push_str(&self.name);
        result
    }
}

/// Declarative description of one mapped column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Cow<'static, str>,
    /// Excluded from `INSERT` when the field equals `zero`.
    pub omit_empty: bool,
    /// Zero value of the field type, used for the omit-empty comparison and key emptiness.
    pub zero: Value,
}

impl ColumnDef {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_zero(&self, value: &Value) -> bool {
        value.is_null() || *value == self.zero
    }
}

/// Read side metadata: name and ordered columns.
///
/// The column order is the order of `Struct::values` and `Struct::scan`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDef {
    pub table_ref: TableRef,
    pub columns: Box<[ColumnDef]>,
}

impl ViewDef {
    pub fn builder(name: impl Into<Cow<'static, str>>) -> ViewBuilder {
        ViewBuilder {
            table_ref: TableRef {
                name: name.into(),
                ..Default::default()
            },
            columns: Vec::new(),
            error: None,
        }
    }
    pub fn name(&self) -> &str {
        &self.table_ref.name
    }
    pub fn schema(&self) -> &str {
        &self.table_ref.schema
    }
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }
    pub fn column_names(&self) -> impl ExactSizeIterator<Item = &str> + Clone {
        self.columns.iter().map(ColumnDef::name)
    }
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }
}

/// Write side metadata: a view with a contiguous primary key prefix and an optional column
/// forced into every tracked update.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub view: ViewDef,
    /// Number of leading columns forming the primary key.
    pub primary_key: usize,
    pub updated_column: Option<Cow<'static, str>>,
}

impl TableDef {
    pub fn builder(name: impl Into<Cow<'static, str>>) -> TableBuilder {
        TableBuilder {
            view: ViewDef::builder(name),
            primary_key: 0,
            updated_column: None,
        }
    }
    pub fn primary_key_columns(&self) -> &[ColumnDef] {
        &self.view.columns[..self.primary_key]
    }
    pub fn non_key_columns(&self) -> &[ColumnDef] {
        &self.view.columns[self.primary_key..]
    }
    pub fn updated_column(&self) -> Option<&str> {
        self.updated_column.as_deref()
    }
}

impl Deref for TableDef {
    type Target = ViewDef;
    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

/// Builder for [`ViewDef`], zero values come from `T::default()`.
pub struct ViewBuilder {
    table_ref: TableRef,
    columns: Vec<ColumnDef>,
    error: Option<Error>,
}

impl ViewBuilder {
    pub fn schema(mut self, schema: impl Into<Cow<'static, str>>) -> Self {
        self.table_ref.schema = schema.into();
        self
    }
    pub fn column<T: AsValue + Default>(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.push(name.into(), false, T::default().as_value())
    }
    pub fn omit_empty<T: AsValue + Default>(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.push(name.into(), true, T::default().as_value())
    }
    fn push(mut self, name: Cow<'static, str>, omit_empty: bool, zero: Value) -> Self {
        if self.error.is_none() {
            if name.is_empty() {
                self.error = Some(Error::msg(format!(
                    "Empty column name in `{}`",
                    self.table_ref.full_name()
                )));
            } else if self.columns.iter().any(|c| c.name == name) {
                self.error = Some(Error::msg(format!(
                    "Column `{}` is declared twice in `{}`",
                    name,
                    self.table_ref.full_name()
                )));
            }
        }
        self.columns.push(ColumnDef {
            name,
            omit_empty,
            zero,
        });
        self
    }
    pub fn build(self) -> Result<ViewDef> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.table_ref.name.is_empty() {
            return Err(Error::msg("A view must have a name"));
        }
        if self.columns.is_empty() {
            return Err(Error::msg(format!(
                "View `{}` does not declare any column",
                self.table_ref.full_name()
            )));
        }
        Ok(ViewDef {
            table_ref: self.table_ref,
            columns: self.columns.into(),
        })
    }
}

/// Builder for [`TableDef`].
///
/// Primary key columns must be declared before every other column.
pub struct TableBuilder {
    view: ViewBuilder,
    primary_key: usize,
    updated_column: Option<Cow<'static, str>>,
}

impl TableBuilder {
    pub fn schema(mut self, schema: impl Into<Cow<'static, str>>) -> Self {
        self.view = self.view.schema(schema);
        self
    }
    /// Next primary key column, always omit-empty.
    pub fn primary_key<T: AsValue + Default>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        if self.view.error.is_none() && self.view.columns.len() != self.primary_key {
            self.view.error = Some(Error::msg(format!(
                "Primary key column `{}` of `{}` must come before the other columns",
                name,
                self.view.table_ref.full_name()
            )));
        }
        self.primary_key += 1;
        self.view = self.view.push(name, true, T::default().as_value());
        self
    }
    pub fn column<T: AsValue + Default>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.view = self.view.column::<T>(name);
        self
    }
    pub fn omit_empty<T: AsValue + Default>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.view = self.view.omit_empty::<T>(name);
        self
    }
    /// Column written by every tracked update (for example an `updated_at` timestamp).
    pub fn updated_column(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.updated_column = Some(name.into());
        self
    }
    pub fn build(self) -> Result<TableDef> {
        let primary_key = self.primary_key;
        let updated_column = self.updated_column;
        let view = self.view.build()?;
        if primary_key == 0 {
            return Err(Error::msg(format!(
                "Table `{}` does not declare a primary key",
                view.table_ref.full_name()
            )));
        }
        if let Some(updated) = &updated_column {
            match view.position(updated) {
                Some(i) if i >= primary_key => {}
                Some(_) => {
                    return Err(Error::msg(format!(
                        "Updated column `{}` of `{}` is part of the primary key",
                        updated,
                        view.table_ref.full_name()
                    )));
                }
                None => {
                    return Err(Error::msg(format!(
                        "Updated column `{}` is not a column of `{}`",
                        updated,
                        view.table_ref.full_name()
                    )));
                }
            }
        }
        Ok(TableDef {
            view,
            primary_key,
            updated_column,
        })
    }
}
