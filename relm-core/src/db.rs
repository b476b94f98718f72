use crate::{
    Connection, Context, Dialect, ErrorExt, ErrorKind, Logger, Querier, Result, Target, Tx,
    TxHandle,
};
use futures::FutureExt;
use std::{
    ops::Deref,
    panic::{AssertUnwindSafe, resume_unwind},
    sync::Arc,
};

/// Database handle: a master connection, optional read replicas, a dialect and a logger.
///
/// Dereferences to the [`Querier`] used for statements outside of transactions.
///
/// ```rust,ignore
/// let db = Db::new(pool, Arc::new(Postgres)).with_logger(LogLogger::default());
/// let mut person = Person { name: "Ada".into(), ..Default::default() };
/// db.insert(&mut person).await?;
/// db.in_transaction(async |tx| {
///     tx.delete(&person).await?;
///     tx.add_on_commit(|| Ok(log::info!("deleted")));
///     Ok(())
/// })
/// .await?;
/// ```
pub struct Db<C: Connection> {
    connection: Arc<C>,
    querier: Querier<C>,
}

impl<C: Connection> Db<C> {
    pub fn new(connection: C, dialect: Arc<dyn Dialect>) -> Self {
        let connection = Arc::new(connection);
        Self {
            querier: Querier::new(Target::Db(connection.clone()), dialect),
            connection,
        }
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.querier.logger = Some(Arc::new(logger));
        self
    }

    /// Register read replicas, `SELECT` statements outside transactions are spread over them.
    pub fn add_replicas(&mut self, replicas: impl IntoIterator<Item = C>) {
        let mut all = self.querier.replicas.to_vec();
        all.extend(replicas.into_iter().map(Arc::new));
        self.querier.replicas = all.into();
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn querier(&self) -> &Querier<C> {
        &self.querier
    }

    /// Querier that never routes to a replica.
    pub fn master_querier(&self) -> Querier<C> {
        Querier {
            replicas: Arc::new([]),
            on_commit: None,
            ..self.querier.clone()
        }
    }

    /// Begin a transaction bound to the querier context.
    pub async fn begin(&self) -> Result<Tx<C>> {
        self.begin_with(self.querier.context.clone()).await
    }

    /// Begin a transaction whose statements are bound to `context`.
    pub async fn begin_with(&self, context: Context) -> Result<Tx<C>> {
        let transaction = self
            .querier
            .logged(
                "BEGIN",
                &[],
                context.run(self.connection().begin()),
            )
            .await?;
        let handle = Arc::new(TxHandle::new(transaction));
        let mut querier = Querier::new(Target::Tx(handle.clone()), self.querier.dialect.clone());
        querier.logger = self.querier.logger.clone();
        querier.tag = self.querier.tag.clone();
        querier.context = context;
        Ok(Tx::new(querier, handle))
    }

    /// Run `f` in a transaction bound to the querier context.
    ///
    /// See [`Db::in_transaction_with`].
    pub async fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&Tx<C>) -> Result<T>,
    {
        self.in_transaction_with(self.querier.context.clone(), f)
            .await
    }

    /// Run `f` in a transaction, committing when it succeeds.
    ///
    /// When `f` fails the transaction is rolled back and the error of `f` returned, a failing
    /// rollback is only logged. A panic in `f` rolls back as well and then resumes unwinding.
    /// After a successful commit the registered callbacks run in order and the first failure
    /// is returned, the transaction stays committed.
    pub async fn in_transaction_with<T, F>(&self, context: Context, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&Tx<C>) -> Result<T>,
    {
        let tx = self.begin_with(context).await?;
        tx.clear_on_commit();
        match AssertUnwindSafe(f(&tx)).catch_unwind().await {
            Ok(Ok(result)) => {
                tx.commit().await?;
                Ok(result)
            }
            Ok(Err(error)) => {
                rollback_quietly(&tx).await;
                Err(error)
            }
            Err(panic) => {
                rollback_quietly(&tx).await;
                resume_unwind(panic)
            }
        }
    }
}

async fn rollback_quietly<C: Connection>(tx: &Tx<C>) {
    match tx.rollback().await {
        Err(e) if !e.is_kind(ErrorKind::TransactionAlreadyFinished) => {
            log::warn!("Rollback failed: {e:#}");
        }
        _ => {}
    }
}

impl<C: Connection> Deref for Db<C> {
    type Target = Querier<C>;
    fn deref(&self) -> &Self::Target {
        &self.querier
    }
}
