use crate::{
    Connection, Context, Dialect, Error, ErrorKind, Executor, Logger, Record, Result, Row,
    RowLabeled, RowsAffected, Struct, TxHandle, Value, ViewDef,
    future::Either,
    stream::{Stream, StreamExt},
};
use async_stream::stream;
use rand::Rng;
use std::{
    borrow::Cow,
    fmt::{self, Display},
    future::Future,
    pin::pin,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

pub(crate) type OnCommit = Box<dyn FnOnce() -> Result<()> + Send>;
pub(crate) type OnCommitList = Arc<Mutex<Vec<OnCommit>>>;

pub(crate) enum Target<C: Connection> {
    Db(Arc<C>),
    Tx(Arc<TxHandle<C::Transaction>>),
}

impl<C: Connection> Clone for Target<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Db(v) => Self::Db(v.clone()),
            Self::Tx(v) => Self::Tx(v.clone()),
        }
    }
}

/// Executor chosen for one statement.
enum Route<'a, C: Connection> {
    Db(&'a C),
    Tx(&'a C::Transaction),
}

impl<'a, C: Connection> Route<'a, C> {
    async fn exec(&self, query: &str, args: &[Value]) -> Result<RowsAffected> {
        match self {
            Route::Db(v) => v.exec(query, args).await,
            Route::Tx(v) => v.exec(query, args).await,
        }
    }

    fn fetch(
        self,
        query: &'a str,
        args: &'a [Value],
    ) -> impl Stream<Item = Result<RowLabeled>> + Send + 'a {
        match self {
            Route::Db(v) => Either::Left(v.fetch(query, args)),
            Route::Tx(v) => Either::Right(v.fetch(query, args)),
        }
    }
}

/// Calls `Logger::after` exactly once, on completion or when dropped mid way.
///
/// Dropping it before `finish` reports the statement as abandoned, unless some rows were
/// already delivered to the caller.
struct Bracket<'a> {
    logger: Option<&'a dyn Logger>,
    query: &'a str,
    args: &'a [Value],
    start: Instant,
    done: bool,
    delivered: bool,
}

impl<'a> Bracket<'a> {
    fn start(logger: Option<&'a dyn Logger>, query: &'a str, args: &'a [Value]) -> Self {
        if let Some(logger) = logger {
            logger.before(query, args);
        }
        Self {
            logger,
            query,
            args,
            start: Instant::now(),
            done: false,
            delivered: false,
        }
    }

    fn finish(&mut self, error: Option<&Error>) {
        if self.done {
            return;
        }
        self.done = true;
        if let Some(logger) = self.logger {
            logger.after(self.query, self.args, self.elapsed(), error);
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Bracket<'_> {
    fn drop(&mut self) {
        if self.delivered {
            self.finish(None);
        } else if !self.done {
            self.finish(Some(&Error::msg("Statement abandoned before completion")));
        }
    }
}

/// Executes statements against the master connection, a read replica or an open
/// transaction.
///
/// A querier is cheap to clone, [`Querier::with_tag`] and [`Querier::with_context`] return
/// modified copies bound to the same connection or transaction and leave `self` untouched.
///
/// Statements starting with `SELECT` are spread at random over the replicas when there are
/// any and the querier is not bound to a transaction. Use [`Querier::with_context`] or a
/// transaction when a read must observe the preceding writes.
///
/// Queriers bound to a transaction must be driven by one task at a time.
pub struct Querier<C: Connection> {
    pub(crate) target: Target<C>,
    pub(crate) replicas: Arc<[Arc<C>]>,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) context: Context,
    pub(crate) tag: Option<Arc<str>>,
    pub(crate) on_commit: Option<OnCommitList>,
}

impl<C: Connection> Clone for Querier<C> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            replicas: self.replicas.clone(),
            dialect: self.dialect.clone(),
            logger: self.logger.clone(),
            context: self.context.clone(),
            tag: self.tag.clone(),
            on_commit: self.on_commit.clone(),
        }
    }
}

impl<C: Connection> fmt::Debug for Querier<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Querier")
            .field("dialect", &self.dialect.name())
            .field("in_transaction", &self.in_transaction())
            .field("replicas", &self.replicas.len())
            .field("tag", &self.tag())
            .field("context", &self.context)
            .finish()
    }
}

impl<C: Connection> Querier<C> {
    pub(crate) fn new(target: Target<C>, dialect: Arc<dyn Dialect>) -> Self {
        let on_commit = match target {
            Target::Db(..) => None,
            Target::Tx(..) => Some(Default::default()),
        };
        Self {
            target,
            replicas: Arc::new([]),
            dialect,
            logger: None,
            context: Context::background(),
            tag: None,
            on_commit,
        }
    }

    /// Free text appended as a comment to every statement, empty by default.
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or_default()
    }

    /// Copy of this querier tagging its statements with `tag`.
    ///
    /// ```rust,ignore
    /// db.with_tag(format_args!("job:{}", job.id)).exec("DELETE FROM leases", &[]).await?;
    /// // DELETE FROM leases /* job:42 */
    /// ```
    pub fn with_tag(&self, tag: impl Display) -> Self {
        let tag = tag.to_string().replace("*/", "* /");
        Self {
            tag: (!tag.is_empty()).then(|| tag.into()),
            ..self.clone()
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Copy of this querier whose statements are bound to `context`.
    pub fn with_context(&self, context: Context) -> Self {
        Self {
            context,
            ..self.clone()
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn logger(&self) -> Option<&dyn Logger> {
        self.logger.as_deref()
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.target, Target::Tx(..))
    }

    /// Register a callback run after the transaction successfully commits.
    ///
    /// # Panics
    /// When the querier is not bound to a transaction or the transaction already ended.
    pub fn add_on_commit(&self, f: impl FnOnce() -> Result<()> + Send + 'static) {
        let Some(on_commit) = &self.on_commit else {
            panic!("On commit callback added outside of a transaction");
        };
        if let Target::Tx(handle) = &self.target
            && handle.is_finished()
        {
            panic!("On commit callback added after the transaction finished");
        }
        on_commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(f));
    }

    /// Querier reading from the first replica, or `self` when bound to a transaction or
    /// without replicas.
    pub fn replica_querier(&self) -> Self {
        match (&self.target, self.replicas.first()) {
            (Target::Db(..), Some(replica)) => Self {
                target: Target::Db(replica.clone()),
                replicas: Arc::new([]),
                on_commit: None,
                ..self.clone()
            },
            _ => self.clone(),
        }
    }

    /// Quoted, schema qualified name of the view, for hand written statements.
    pub fn qualified_view(&self, view: &ViewDef) -> String {
        let mut out = String::new();
        self.dialect.write_table_ref_quoted(&mut out, &view.table_ref);
        out
    }

    /// Quoted `table.column` references of the view, in column order.
    pub fn qualified_columns(&self, view: &ViewDef) -> Vec<String> {
        view.column_names()
            .map(|column| {
                let mut out = String::new();
                self.dialect.write_table_ref_quoted(&mut out, &view.table_ref);
                out.push('.');
                self.dialect.write_identifier_quoted(&mut out, column);
                out
            })
            .collect()
    }

    fn route(&self, query: &str) -> Route<'_, C> {
        match &self.target {
            Target::Tx(tx) => Route::Tx(&tx.transaction),
            Target::Db(db) => {
                if !self.replicas.is_empty() && is_select(query) {
                    let i = rand::rng().random_range(0..self.replicas.len());
                    Route::Db(&self.replicas[i])
                } else {
                    Route::Db(db)
                }
            }
        }
    }

    fn tagged<'a>(&self, query: &'a str) -> Cow<'a, str> {
        match &self.tag {
            Some(tag) => format!("{query} /* {tag} */").into(),
            None => query.into(),
        }
    }

    /// Run `future` between the logger hooks.
    pub(crate) async fn logged<T>(
        &self,
        query: &str,
        args: &[Value],
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let mut bracket = Bracket::start(self.logger(), query, args);
        let result = future.await;
        bracket.finish(result.as_ref().err());
        result
    }

    /// Execute a statement without returning rows.
    pub async fn exec(&self, query: &str, args: &[Value]) -> Result<RowsAffected> {
        let route = self.route(query);
        let query = self.tagged(query);
        self.logged(
            &query,
            args,
            self.context.run(route.exec(&query, args)),
        )
        .await
    }

    /// Execute a query and stream the rows.
    ///
    /// The logger `after` hook fires when the stream ends, fails or is dropped.
    pub fn fetch<'a>(
        &'a self,
        query: &'a str,
        args: &'a [Value],
    ) -> impl Stream<Item = Result<RowLabeled>> + Send + 'a {
        let route = self.route(query);
        let query = self.tagged(query);
        stream! {
            let mut bracket = Bracket::start(self.logger(), &query, args);
            if let Some(kind) = self.context.error() {
                let error = kind.into_error();
                bracket.finish(Some(&error));
                yield Err(error);
            } else {
                let mut rows = pin!(route.fetch(&query, args));
                loop {
                    let next = tokio::select! {
                        biased;
                        kind = self.context.done() => Some(Err(kind.into_error())),
                        row = rows.next() => row,
                    };
                    match next {
                        Some(Ok(row)) => {
                            bracket.delivered = true;
                            yield Ok(row);
                        }
                        Some(Err(error)) => {
                            bracket.finish(Some(&error));
                            yield Err(error);
                            break;
                        }
                        None => {
                            bracket.finish(None);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Execute a query expected to return at most one row.
    ///
    /// Failures are reported by the accessors of the returned [`QueryRow`].
    pub async fn query_row(&self, query: &str, args: &[Value]) -> QueryRow {
        let mut rows = pin!(self.fetch(query, args));
        QueryRow {
            result: rows.next().await.transpose(),
        }
    }

    /// Translate the dialect's unique violation into [`ErrorKind::UniqueViolation`], keeping
    /// the driver error as the source.
    pub(crate) fn unique_violation<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            if self.dialect.is_unique_violation(&e) {
                e.context(ErrorKind::UniqueViolation)
            } else {
                e
            }
        })
    }
}

fn is_select(query: &str) -> bool {
    let query = query.trim_start();
    query
        .get(..6)
        .is_some_and(|v| v.eq_ignore_ascii_case("SELECT"))
        && query[6..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric() && c != '_' && c != '$')
}

/// Deferred single row result.
#[derive(Debug)]
pub struct QueryRow {
    result: Result<Option<RowLabeled>>,
}

impl QueryRow {
    /// The row, [`ErrorKind::NoRows`] when the query returned nothing.
    pub fn row(self) -> Result<RowLabeled> {
        self.result?.ok_or_else(|| ErrorKind::NoRows.into_error())
    }

    /// Decode the row into `target`, the row columns must follow the view columns.
    pub fn scan<S: Struct>(self, target: &mut S) -> Result<()> {
        target.scan(self.row()?.values)
    }

    /// Decode the row as the primary key of `record`.
    pub fn scan_primary_key<R: Record>(self, record: &mut R) -> Result<()> {
        record.set_primary_key(self.row()?.values)
    }

    pub fn values(self) -> Result<Row> {
        Ok(self.row()?.values)
    }
}
