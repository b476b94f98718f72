use crate::{
    Connection, Error, ErrorExt, ErrorKind, InsertMode, Querier, Record, Result, Row, Value,
    changed_fields, copy,
};

impl<C: Connection> Querier<C> {
    /// Insert `record`, then write the generated primary key back into it.
    ///
    /// Omit-empty columns holding their zero value are left out of the statement so the
    /// database defaults apply. On returning dialects the whole key is read back, on last
    /// insert id dialects a single column key left empty is set from the driver id.
    pub async fn insert<R: Record>(&self, record: &mut R) -> Result<()> {
        record.before_insert();
        let table = R::table();
        let mut columns = Vec::with_capacity(table.columns.len());
        let mut values = Vec::with_capacity(table.columns.len());
        for (column, value) in table.columns().iter().zip(record.values().into_vec()) {
            if column.omit_empty && column.is_zero(&value) {
                continue;
            }
            columns.push(column.name());
            values.push(value);
        }
        let mut query = String::with_capacity(128);
        self.dialect.write_insert(&mut query, table, &columns);
        match self.dialect.insert_mode() {
            InsertMode::Returning => {
                let row = self.query_row(&query, &values).await.row();
                let row = self.unique_violation(row)?;
                record.set_primary_key(row.values)
            }
            InsertMode::LastInsertId => {
                let result = self.exec(&query, &values).await;
                let result = self.unique_violation(result)?;
                if table.primary_key != 1 || !record.primary_key_empty() {
                    return Ok(());
                }
                let Some(id) = result.last_affected_id else {
                    return Err(Error::msg(format!(
                        "The driver did not report the id of the row inserted into `{}`",
                        table.table_ref.full_name()
                    )));
                };
                record.set_primary_key([Value::Int64(Some(id))].into())
            }
        }
    }

    /// Update every non key column of `record`.
    pub async fn update<R: Record>(&self, record: &mut R) -> Result<()> {
        let columns = R::table()
            .non_key_columns()
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>();
        self.update_only(record, &columns).await
    }

    /// Update the listed non key columns of `record`, matched by primary key.
    ///
    /// Fails with [`ErrorKind::NoPrimaryKey`] when the key is empty and with
    /// [`ErrorKind::NoRows`] unless exactly one row was affected.
    ///
    /// # Panics
    /// When a name in `columns` is not a non key column of the table, or appears twice.
    pub async fn update_only<R: Record>(&self, record: &mut R, columns: &[&str]) -> Result<()> {
        record.before_update();
        let table = R::table();
        if record.primary_key_empty() {
            return Err(ErrorKind::NoPrimaryKey.into_error());
        }
        let mut remaining = columns.to_vec();
        let mut set = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len() + table.primary_key);
        let mut row = record.values().into_vec();
        let key = row.drain(..table.primary_key).collect::<Vec<_>>();
        for (column, value) in table.non_key_columns().iter().zip(row) {
            if let Some(i) = remaining.iter().position(|v| *v == column.name()) {
                remaining.remove(i);
                set.push(column.name());
                values.push(value);
            }
        }
        if !remaining.is_empty() {
            panic!(
                "Columns {:?} left in update of `{}`, they are not updatable columns or appear more than once",
                remaining,
                table.table_ref.full_name()
            );
        }
        if set.is_empty() {
            return Err(Error::msg(format!(
                "Nothing to update in `{}`",
                table.table_ref.full_name()
            )));
        }
        values.extend(key);
        let mut query = String::with_capacity(128);
        self.dialect.write_update(&mut query, table, &set);
        let result = self.exec(&query, &values).await;
        let result = self.unique_violation(result)?;
        if result.rows_affected != 1 {
            return Err(ErrorKind::NoRows.into_error());
        }
        Ok(())
    }

    /// Update when the primary key is set, insert otherwise. The database is not probed.
    pub async fn upsert<R: Record>(&self, record: &mut R) -> Result<()> {
        if record.primary_key_empty() {
            self.insert(record).await
        } else {
            self.update(record).await
        }
    }

    /// Like [`Querier::upsert`] but inserts when the key is set and no row has it.
    pub async fn save<R: Record>(&self, record: &mut R) -> Result<()> {
        match self.upsert(record).await {
            Err(e) if e.is_kind(ErrorKind::NoRows) => self.insert(record).await,
            result => result,
        }
    }

    /// Delete the row of `record`, [`ErrorKind::NoRows`] unless exactly one row was affected.
    pub async fn delete<R: Record>(&self, record: &R) -> Result<()> {
        let mut query = String::with_capacity(64);
        self.dialect.write_delete(&mut query, R::table());
        let result = self.exec(&query, &record.primary_key_values()).await?;
        if result.rows_affected != 1 {
            return Err(ErrorKind::NoRows.into_error());
        }
        Ok(())
    }

    /// Load the row with primary key `id` (or start a new record with that key), let
    /// `mutate` edit it and write back only what changed.
    ///
    /// An existing row whose fields are left unchanged costs no statement besides the
    /// lookup. When something changed, the table updated column is added to the update.
    ///
    /// ```rust,ignore
    /// let person = db
    ///     .apply::<Person>([Value::Int64(Some(7))], |p| p.name = "Grace".into())
    ///     .await?;
    /// ```
    pub async fn apply<R: Record>(
        &self,
        id: impl Into<Row>,
        mutate: impl FnOnce(&mut R),
    ) -> Result<R> {
        let id = id.into();
        let (mut record, old) = match self.find_by_primary_key_from::<R>(id.clone()).await {
            Ok(record) => {
                let old = copy(&record)?;
                (record, Some(old))
            }
            Err(e) if e.is_kind(ErrorKind::NoRows) => {
                let mut record = R::new_struct();
                record.set_primary_key(id)?;
                (record, None)
            }
            Err(e) => return Err(e),
        };
        mutate(&mut record);
        match old {
            Some(old) => {
                let mut changed = changed_fields(&old, &record);
                if !changed.is_empty() {
                    if let Some(updated) = R::table().updated_column()
                        && !changed.contains(&updated)
                    {
                        changed.push(updated);
                    }
                    self.update_only(&mut record, &changed).await?;
                }
            }
            None => self.insert(&mut record).await?,
        }
        Ok(record)
    }
}
