use crate::{AsValue, Error, Result, Row, TableDef, Value, ViewDef};
use anyhow::Context;

/// A typed row: ordered field values matching [`ViewDef::columns`].
///
/// `values` and `scan` are the two directions of the same field sequence. Implementations
/// must keep the field order identical to the metadata column order.
pub trait Struct: Default + Send + Sized {
    fn view() -> &'static ViewDef;

    /// Current field values, one per column.
    fn values(&self) -> Row;

    /// Overwrite the fields from a row ordered like the columns.
    fn scan(&mut self, row: Row) -> Result<()>;

    fn new_struct() -> Self {
        Self::default()
    }

    /// Build a new instance from a row ordered like the columns.
    fn from_row(row: Row) -> Result<Self> {
        let mut result = Self::new_struct();
        result.scan(row)?;
        Ok(result)
    }
}

/// Extension points invoked by the command engine.
pub trait Hooks {
    /// Called first thing by `insert`.
    fn before_insert(&mut self) {}
    /// Called first thing by `update` / `update_only`.
    fn before_update(&mut self) {}
}

/// A [`Struct`] stored in a table, addressable by its primary key.
pub trait Record: Struct + Hooks {
    fn table() -> &'static TableDef;

    fn primary_key_values(&self) -> Row {
        let mut values = self.values().into_vec();
        values.truncate(Self::table().primary_key);
        values.into()
    }

    /// True when any primary key component equals its zero value.
    fn primary_key_empty(&self) -> bool {
        self.primary_key_values()
            .iter()
            .zip(Self::table().primary_key_columns())
            .any(|(v, c)| c.is_zero(v))
    }

    /// Overwrite the primary key fields.
    fn set_primary_key(&mut self, primary_key: Row) -> Result<()> {
        let table = Self::table();
        if primary_key.len() != table.primary_key {
            return Err(Error::msg(format!(
                "`{}` has a primary key of {} columns, {} values were provided",
                table.table_ref.full_name(),
                table.primary_key,
                primary_key.len(),
            )));
        }
        let mut values = self.values().into_vec();
        for (i, v) in primary_key.into_vec().into_iter().enumerate() {
            values[i] = v;
        }
        self.scan(values.into())
    }
}

/// Sequential reader used by `Struct::scan` implementations.
///
/// ```rust,ignore
/// fn scan(&mut self, row: Row) -> Result<()> {
///     let mut reader = RowReader::new(row, Self::view())?;
///     self.id = reader.read()?;
///     self.name = reader.read()?;
///     Ok(())
/// }
/// ```
pub struct RowReader {
    values: std::vec::IntoIter<Value>,
    view: &'static ViewDef,
    position: usize,
}

impl RowReader {
    pub fn new(row: Row, view: &'static ViewDef) -> Result<Self> {
        if row.len() != view.columns.len() {
            return Err(Error::msg(format!(
                "Row for `{}` has {} values, expected {}",
                view.table_ref.full_name(),
                row.len(),
                view.columns.len(),
            )));
        }
        Ok(Self {
            values: row.into_vec().into_iter(),
            view,
            position: 0,
        })
    }

    /// Decode the next column into `T`.
    pub fn read<T: AsValue>(&mut self) -> Result<T> {
        let column = self
            .view
            .columns
            .get(self.position)
            .map(|c| c.name())
            .unwrap_or_default();
        let value = self.values.next().ok_or_else(|| {
            Error::msg(format!(
                "Row for `{}` ended before column `{}`",
                self.view.table_ref.full_name(),
                column,
            ))
        })?;
        self.position += 1;
        T::try_from_value(value).with_context(|| {
            format!(
                "While decoding column `{}` of `{}`",
                column,
                self.view.table_ref.full_name()
            )
        })
    }
}
