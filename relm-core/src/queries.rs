use crate::{
    Connection, Querier, Record, Result, Row, Struct, Value, ViewDef, separated_by,
    stream::{Stream, StreamExt, TryStreamExt},
};
use async_stream::stream;
use std::pin::pin;

impl<C: Connection> Querier<C> {
    /// `SELECT <view columns> FROM <view> <tail>`.
    pub fn select_query(&self, view: &ViewDef, tail: &str) -> String {
        let mut out = String::with_capacity(128);
        self.dialect.write_select(&mut out, view, tail);
        out
    }

    /// `WHERE <column> = <ph>`, or `WHERE <column> IS NULL` when `arg` is null (the argument is
    /// then dropped).
    fn equality_tail(&self, column: &str, arg: Value) -> (String, Vec<Value>) {
        let mut tail = String::from("WHERE ");
        self.dialect.write_identifier(&mut tail, column);
        if arg.is_null() {
            tail.push_str(" IS NULL LIMIT 1");
            (tail, Vec::new())
        } else {
            tail.push_str(" = ");
            tail.push_str(&self.dialect.placeholder(1));
            tail.push_str(" LIMIT 1");
            (tail, vec![arg])
        }
    }

    fn primary_key_tail<R: Record>(&self) -> String {
        let mut tail = String::from("WHERE ");
        self.dialect
            .write_primary_key_condition(&mut tail, R::table(), 1);
        tail.push_str(" LIMIT 1");
        tail
    }

    /// Decode the first row selected by `tail` into `target`, [`crate::ErrorKind::NoRows`]
    /// when there is none.
    pub async fn select_one_to<S: Struct>(
        &self,
        target: &mut S,
        tail: &str,
        args: &[Value],
    ) -> Result<()> {
        let query = self.select_query(S::view(), tail);
        self.query_row(&query, args).await.scan(target)
    }

    pub async fn select_one_from<S: Struct>(&self, tail: &str, args: &[Value]) -> Result<S> {
        let mut result = S::new_struct();
        self.select_one_to(&mut result, tail, args).await?;
        Ok(result)
    }

    /// Stream the rows selected by `tail` decoded as `S`.
    pub fn select_rows<'a, S: Struct + 'a>(
        &'a self,
        tail: &str,
        args: &'a [Value],
    ) -> impl Stream<Item = Result<S>> + Send + use<'a, C, S> {
        let query = self.select_query(S::view(), tail);
        stream! {
            let mut rows = pin!(self.fetch(&query, args));
            while let Some(row) = rows.next().await {
                yield row.and_then(|v| S::from_row(v.values));
            }
        }
    }

    pub async fn select_all_from<S: Struct>(&self, tail: &str, args: &[Value]) -> Result<Vec<S>> {
        self.select_rows(tail, args).try_collect().await
    }

    pub async fn find_one_to<S: Struct>(
        &self,
        target: &mut S,
        column: &str,
        arg: impl Into<Value>,
    ) -> Result<()> {
        let (tail, args) = self.equality_tail(column, arg.into());
        self.select_one_to(target, &tail, &args).await
    }

    /// First row whose `column` equals `arg`.
    pub async fn find_one_from<S: Struct>(&self, column: &str, arg: impl Into<Value>) -> Result<S> {
        let (tail, args) = self.equality_tail(column, arg.into());
        self.select_one_from(&tail, &args).await
    }

    /// Rows whose `column` is one of `args`, an empty `args` selects nothing.
    pub async fn find_all_from<S: Struct>(&self, column: &str, args: &[Value]) -> Result<Vec<S>> {
        if args.is_empty() {
            return Ok(Vec::new());
        }
        let mut tail = String::from("WHERE ");
        self.dialect.write_identifier(&mut tail, column);
        tail.push_str(" IN (");
        separated_by(
            &mut tail,
            self.dialect.placeholders(args.len()),
            |out, v| out.push_str(&v),
            ", ",
        );
        tail.push(')');
        self.select_all_from(&tail, args).await
    }

    pub async fn find_by_primary_key_from<R: Record>(&self, id: impl Into<Row>) -> Result<R> {
        let mut result = R::new_struct();
        self.find_by_primary_key_to(&mut result, id).await?;
        Ok(result)
    }

    pub async fn find_by_primary_key_to<R: Record>(
        &self,
        record: &mut R,
        id: impl Into<Row>,
    ) -> Result<()> {
        let tail = self.primary_key_tail::<R>();
        self.select_one_to(record, &tail, &id.into()).await
    }

    /// Read the row of `record` again, by primary key.
    pub async fn reload<R: Record>(&self, record: &mut R) -> Result<()> {
        let tail = self.primary_key_tail::<R>();
        let id = record.primary_key_values();
        self.select_one_to(record, &tail, &id).await
    }

    /// `DELETE FROM <view> <tail>`, returns the number of rows deleted.
    pub async fn delete_from<S: Struct>(&self, tail: &str, args: &[Value]) -> Result<u64> {
        let mut query = String::from("DELETE FROM ");
        self.dialect
            .write_table_ref(&mut query, &S::view().table_ref);
        if !tail.is_empty() {
            query.push(' ');
            query.push_str(tail);
        }
        Ok(self.exec(&query, args).await?.rows_affected)
    }
}
