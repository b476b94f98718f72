use crate::{
    Result, RowLabeled, RowsAffected, Value,
    stream::{Stream, StreamExt},
};
use std::{future::Future, pin::pin};

/// SQL executing handle provided by a driver.
///
/// Methods take `&self`: implementations are pool-like handles (or a single transaction)
/// that can be shared between tasks. Arguments bind positionally to the placeholders of the
/// statement.
pub trait Executor: Send + Sync {
    /// Execute a statement and return the number of rows affected.
    fn exec(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowsAffected>> + Send;

    /// Execute the query and return the rows.
    fn fetch(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Stream<Item = Result<RowLabeled>> + Send;

    /// First row of the query, if any.
    fn fetch_one(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Option<RowLabeled>>> + Send {
        async move {
            let mut stream = pin!(self.fetch(query, args));
            stream.next().await.transpose()
        }
    }
}

pub trait Connection: Executor + 'static {
    type Transaction: Transaction;

    /// Open a transaction on one of the underlying physical connections.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// Open transaction.
///
/// Drivers are not required to guard against a second `commit`/`rollback`, the `Tx` wrapper
/// makes sure they are called at most once.
pub trait Transaction: Executor + 'static {
    fn commit(&self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(&self) -> impl Future<Output = Result<()>> + Send;
}
