use relm::{
    Connection, Dialect, DriverError, Error, Executor, Record, Result, RowLabeled, RowNames,
    RowsAffected, Transaction, Value, stream::Stream, values_equal,
};
use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Statement received by a [`MemoryDatabase`] or one of its transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Label of the connection that executed it.
    pub connection: Arc<str>,
    pub query: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    zeros: Vec<Value>,
    primary_key: usize,
    unique: Vec<usize>,
    rows: Vec<Vec<Value>>,
    next_id: i64,
}

type Tables = BTreeMap<String, MemoryTable>;

struct Shared {
    dialect: Arc<dyn Dialect>,
    tables: Mutex<Tables>,
    journal: Mutex<Vec<Statement>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    fail_commits: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn record(&self, connection: &Arc<str>, query: &str, args: &[Value]) {
        lock(&self.journal).push(Statement {
            connection: connection.clone(),
            query: query.into(),
            args: args.to_vec(),
        });
    }

    async fn delay(&self) {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// In memory connection speaking the statements generated by `relm`.
///
/// It understands `INSERT` (with `RETURNING`), `UPDATE`, `DELETE` and `SELECT` with `WHERE`
/// conditions made of `=`, `IS NULL` and `IN` joined by `AND`, plus `ORDER BY` and `LIMIT`.
/// Every statement is journaled together with the label of the connection that ran it, so
/// tests can assert both the SQL sent and where it was routed. Errors are reported as
/// [`DriverError`]s in the code space of the configured dialect.
///
/// Replicas created with [`MemoryDatabase::replica`] share the storage. Transactions work on a
/// copy of the tables written back on commit.
#[derive(Clone)]
pub struct MemoryDatabase {
    label: Arc<str>,
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    pub fn new(label: &str, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            label: label.into(),
            shared: Arc::new(Shared {
                dialect,
                tables: Default::default(),
                journal: Default::default(),
                begins: Default::default(),
                commits: Default::default(),
                rollbacks: Default::default(),
                fail_commits: Default::default(),
                latency: Default::default(),
            }),
        }
    }

    /// Connection to the same storage under a different label.
    pub fn replica(&self, label: &str) -> Self {
        Self {
            label: label.into(),
            shared: self.shared.clone(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        self.shared.dialect.clone()
    }

    /// Create (or empty) the table storing `R`.
    pub fn create_table<R: Record>(&self) {
        let table = R::table();
        lock(&self.shared.tables).insert(
            table.table_ref.full_name(),
            MemoryTable {
                columns: table.column_names().map(Into::into).collect(),
                zeros: table.columns().iter().map(|c| c.zero.clone()).collect(),
                primary_key: table.primary_key,
                unique: Vec::new(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    /// Add a unique constraint on a non key column of `R`'s table.
    pub fn create_unique_index<R: Record>(&self, column: &str) {
        let name = R::table().table_ref.full_name();
        let mut tables = lock(&self.shared.tables);
        if let Some(table) = tables.get_mut(&name)
            && let Some(i) = table.columns.iter().position(|c| c == column)
        {
            table.unique.push(i);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        lock(&self.shared.tables)
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or_default()
    }

    pub fn journal(&self) -> Vec<Statement> {
        lock(&self.shared.journal).clone()
    }

    pub fn clear_journal(&self) {
        lock(&self.shared.journal).clear();
    }

    pub fn begins(&self) -> usize {
        self.shared.begins.load(Ordering::Acquire)
    }

    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::Acquire)
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.rollbacks.load(Ordering::Acquire)
    }

    /// Make every following commit fail (the transaction is then discarded).
    pub fn fail_commits(&self, fail: bool) {
        self.shared.fail_commits.store(fail, Ordering::Release);
    }

    /// Delay applied before every statement.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.shared.latency) = latency;
    }
}

impl Executor for MemoryDatabase {
    fn exec(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowsAffected>> + Send {
        async move {
            self.shared.delay().await;
            self.shared.record(&self.label, query, args);
            let mut tables = lock(&self.shared.tables);
            Ok(execute(&mut tables, self.shared.dialect.as_ref(), query, args)?.affected)
        }
    }

    fn fetch(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Stream<Item = Result<RowLabeled>> + Send {
        async_stream::stream! {
            self.shared.delay().await;
            self.shared.record(&self.label, query, args);
            let result = {
                let mut tables = lock(&self.shared.tables);
                execute(&mut tables, self.shared.dialect.as_ref(), query, args)
            };
            match result {
                Ok(output) => {
                    for row in output.rows {
                        yield Ok(RowLabeled::new(output.labels.clone(), row.into()));
                    }
                }
                Err(e) => yield Err(e),
            }
        }
    }
}

impl Connection for MemoryDatabase {
    type Transaction = MemoryTransaction;

    fn begin(&self) -> impl Future<Output = Result<MemoryTransaction>> + Send {
        async move {
            self.shared.delay().await;
            self.shared.record(&self.label, "BEGIN", &[]);
            self.shared.begins.fetch_add(1, Ordering::AcqRel);
            Ok(MemoryTransaction {
                label: self.label.clone(),
                shared: self.shared.clone(),
                working: Mutex::new(lock(&self.shared.tables).clone()),
            })
        }
    }
}

/// Transaction of a [`MemoryDatabase`]: statements see and modify a private copy of the
/// tables, a commit replaces the shared tables with it.
pub struct MemoryTransaction {
    label: Arc<str>,
    shared: Arc<Shared>,
    working: Mutex<Tables>,
}

impl Executor for MemoryTransaction {
    fn exec(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowsAffected>> + Send {
        async move {
            self.shared.delay().await;
            self.shared.record(&self.label, query, args);
            let mut tables = lock(&self.working);
            Ok(execute(&mut tables, self.shared.dialect.as_ref(), query, args)?.affected)
        }
    }

    fn fetch(
        &self,
        query: &str,
        args: &[Value],
    ) -> impl Stream<Item = Result<RowLabeled>> + Send {
        async_stream::stream! {
            self.shared.delay().await;
            self.shared.record(&self.label, query, args);
            let result = {
                let mut tables = lock(&self.working);
                execute(&mut tables, self.shared.dialect.as_ref(), query, args)
            };
            match result {
                Ok(output) => {
                    for row in output.rows {
                        yield Ok(RowLabeled::new(output.labels.clone(), row.into()));
                    }
                }
                Err(e) => yield Err(e),
            }
        }
    }
}

impl Transaction for MemoryTransaction {
    fn commit(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.shared.record(&self.label, "COMMIT", &[]);
            if self.shared.fail_commits.load(Ordering::Acquire) {
                return Err(Error::new(DriverError::new(
                    "could not serialize access due to concurrent update",
                )));
            }
            let working = std::mem::take(&mut *lock(&self.working));
            *lock(&self.shared.tables) = working;
            self.shared.commits.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }
    }

    fn rollback(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.shared.record(&self.label, "ROLLBACK", &[]);
            lock(&self.working).clear();
            self.shared.rollbacks.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }
    }
}

struct Output {
    labels: RowNames,
    rows: Vec<Vec<Value>>,
    affected: RowsAffected,
}

impl Output {
    fn affected(rows_affected: u64, last_affected_id: Option<i64>) -> Self {
        Self {
            labels: Arc::new([]),
            rows: Vec::new(),
            affected: RowsAffected {
                rows_affected,
                last_affected_id,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(i64),
    Placeholder(Option<usize>),
    Symbol(char),
}

#[derive(Debug)]
enum Condition {
    Equal(String, Value),
    IsNull(String),
    In(String, Vec<Value>),
}

#[derive(Debug)]
enum Command {
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Value>,
        returning: Vec<String>,
    },
    Update {
        table: String,
        set: Vec<(String, Value)>,
        conditions: Vec<Condition>,
    },
    Delete {
        table: String,
        conditions: Vec<Condition>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        conditions: Vec<Condition>,
        order: Option<(String, bool)>,
        limit: Option<usize>,
    },
}

fn syntax_error(query: &str, detail: impl std::fmt::Display) -> Error {
    Error::new(DriverError::new(format!("syntax error: {detail} in `{query}`")).with_sqlstate("42601"))
}

fn tokenize(query: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = query.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() || c == ';' => {}
            '/' if query[i..].starts_with("/*") => {
                let Some(end) = query[i..].find("*/") else {
                    return Err(syntax_error(query, "unterminated comment"));
                };
                while chars.peek().is_some_and(|(j, _)| *j < i + end + 2) {
                    chars.next();
                }
            }
            '(' | ')' | ',' | '=' | '*' => tokens.push(Token::Symbol(c)),
            '?' => tokens.push(Token::Placeholder(None)),
            '$' => {
                let mut number = String::new();
                while let Some((_, d)) = chars.peek().filter(|(_, d)| d.is_ascii_digit()) {
                    number.push(*d);
                    chars.next();
                }
                let n = number
                    .parse()
                    .map_err(|_| syntax_error(query, "bad placeholder"))?;
                tokens.push(Token::Placeholder(Some(n)));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::from(c);
                while let Some((_, d)) = chars.peek().filter(|(_, d)| d.is_ascii_digit()) {
                    number.push(*d);
                    chars.next();
                }
                let n = number
                    .parse()
                    .map_err(|_| syntax_error(query, "bad number"))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphanumeric() || c == '_' || c == '"' => {
                let mut word = String::from(c);
                while let Some((_, d)) = chars
                    .peek()
                    .filter(|(_, d)| d.is_alphanumeric() || matches!(d, '_' | '.' | '"'))
                {
                    word.push(*d);
                    chars.next();
                }
                tokens.push(Token::Word(word.replace('"', "")));
            }
            c => return Err(syntax_error(query, format_args!("unexpected `{c}`"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    query: &'a str,
    tokens: Vec<Token>,
    position: usize,
    args: &'a [Value],
    next_arg: usize,
}

impl<'a> Parser<'a> {
    fn new(query: &'a str, args: &'a [Value]) -> Result<Self> {
        Ok(Self {
            query,
            tokens: tokenize(query)?,
            position: 0,
            args,
            next_arg: 0,
        })
    }

    fn error(&self, detail: impl std::fmt::Display) -> Error {
        syntax_error(self.query, detail)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn peek_symbol(&self, symbol: char) -> bool {
        self.peek() == Some(&Token::Symbol(symbol))
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        if !self.peek_keyword(keyword) {
            return Err(self.error(format_args!("expected {keyword}")));
        }
        self.position += 1;
        Ok(())
    }

    fn symbol(&mut self, symbol: char) -> Result<()> {
        if !self.peek_symbol(symbol) {
            return Err(self.error(format_args!("expected `{symbol}`")));
        }
        self.position += 1;
        Ok(())
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Word(w)) => {
                let w = w.clone();
                self.position += 1;
                Ok(w)
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    /// Column name without the table qualifier.
    fn column(&mut self) -> Result<String> {
        let name = self.identifier()?;
        Ok(match name.rsplit_once('.') {
            Some((_, column)) => column.into(),
            None => name,
        })
    }

    fn operand(&mut self) -> Result<Value> {
        let token = self.peek().cloned();
        self.position += 1;
        match token {
            Some(Token::Placeholder(Some(n))) => n
                .checked_sub(1)
                .and_then(|i| self.args.get(i))
                .cloned()
                .ok_or_else(|| self.error(format_args!("no argument for ${n}"))),
            Some(Token::Placeholder(None)) => {
                let value = self
                    .args
                    .get(self.next_arg)
                    .cloned()
                    .ok_or_else(|| self.error("not enough arguments"))?;
                self.next_arg += 1;
                Ok(value)
            }
            Some(Token::Number(n)) => Ok(Value::Int64(Some(n))),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            _ => Err(self.error("expected a value")),
        }
    }

    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut result = Vec::new();
        if self.peek_symbol(')') {
            return Ok(result);
        }
        loop {
            result.push(item(self)?);
            if !self.peek_symbol(',') {
                return Ok(result);
            }
            self.position += 1;
        }
    }

    fn conditions(&mut self) -> Result<Vec<Condition>> {
        let mut result = Vec::new();
        if !self.peek_keyword("WHERE") {
            return Ok(result);
        }
        self.position += 1;
        loop {
            let column = self.column()?;
            if self.peek_keyword("IS") {
                self.position += 1;
                self.keyword("NULL")?;
                result.push(Condition::IsNull(column));
            } else if self.peek_keyword("IN") {
                self.position += 1;
                self.symbol('(')?;
                let values = self.list(Self::operand)?;
                self.symbol(')')?;
                result.push(Condition::In(column, values));
            } else {
                self.symbol('=')?;
                let value = self.operand()?;
                result.push(Condition::Equal(column, value));
            }
            if !self.peek_keyword("AND") {
                return Ok(result);
            }
            self.position += 1;
        }
    }

    fn parse(mut self) -> Result<Command> {
        let command = if self.peek_keyword("INSERT") {
            self.insert()?
        } else if self.peek_keyword("UPDATE") {
            self.update()?
        } else if self.peek_keyword("DELETE") {
            self.position += 1;
            self.keyword("FROM")?;
            let table = self.identifier()?;
            let conditions = self.conditions()?;
            Command::Delete { table, conditions }
        } else if self.peek_keyword("SELECT") {
            self.select()?
        } else {
            return Err(self.error("unsupported statement"));
        };
        if self.position != self.tokens.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(command)
    }

    fn insert(&mut self) -> Result<Command> {
        self.keyword("INSERT")?;
        self.keyword("INTO")?;
        let table = self.identifier()?;
        let (columns, values) = if self.peek_keyword("DEFAULT") {
            self.position += 1;
            self.keyword("VALUES")?;
            (Vec::new(), Vec::new())
        } else {
            self.symbol('(')?;
            let columns = self.list(Self::column)?;
            self.symbol(')')?;
            self.keyword("VALUES")?;
            self.symbol('(')?;
            let values = self.list(Self::operand)?;
            self.symbol(')')?;
            (columns, values)
        };
        if columns.len() != values.len() {
            return Err(self.error("INSERT has more expressions than target columns"));
        }
        let returning = if self.peek_keyword("RETURNING") {
            self.position += 1;
            self.list(Self::column)?
        } else {
            Vec::new()
        };
        Ok(Command::Insert {
            table,
            columns,
            values,
            returning,
        })
    }

    fn update(&mut self) -> Result<Command> {
        self.keyword("UPDATE")?;
        let table = self.identifier()?;
        self.keyword("SET")?;
        let set = self.list(|p| {
            let column = p.column()?;
            p.symbol('=')?;
            Ok((column, p.operand()?))
        })?;
        let conditions = self.conditions()?;
        Ok(Command::Update {
            table,
            set,
            conditions,
        })
    }

    fn select(&mut self) -> Result<Command> {
        self.keyword("SELECT")?;
        let columns = if self.peek_symbol('*') {
            self.position += 1;
            Vec::new()
        } else {
            self.list(Self::column)?
        };
        self.keyword("FROM")?;
        let table = self.identifier()?;
        let conditions = self.conditions()?;
        let order = if self.peek_keyword("ORDER") {
            self.position += 1;
            self.keyword("BY")?;
            let column = self.column()?;
            let descending = self.peek_keyword("DESC");
            if descending || self.peek_keyword("ASC") {
                self.position += 1;
            }
            Some((column, descending))
        } else {
            None
        };
        let limit = if self.peek_keyword("LIMIT") {
            self.position += 1;
            match self.operand()? {
                Value::Int64(Some(n)) => Some(n.max(0) as usize),
                _ => return Err(self.error("bad LIMIT")),
            }
        } else {
            None
        };
        Ok(Command::Select {
            table,
            columns,
            conditions,
            order,
            limit,
        })
    }
}

/// Equality used to match rows, integers compare by value whatever their width.
fn same(left: &Value, right: &Value) -> bool {
    match (left.as_i64(), right.as_i64()) {
        (Some(l), Some(r)) => l == r,
        _ => !left.is_null() && values_equal(left, right),
    }
}

fn compare(left: &Value, right: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (left, right) {
        _ if left.is_null() && right.is_null() => Ordering::Equal,
        _ if left.is_null() => Ordering::Less,
        _ if right.is_null() => Ordering::Greater,
        (Value::Varchar(Some(l)), Value::Varchar(Some(r))) => l.cmp(r),
        _ => match (left.as_i64(), right.as_i64()) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => Ordering::Equal,
        },
    }
}

impl MemoryTable {
    fn position(&self, table: &str, column: &str) -> Result<usize> {
        self.columns.iter().position(|c| c == column).ok_or_else(|| {
            Error::new(
                DriverError::new(format!(
                    "column \"{column}\" of relation \"{table}\" does not exist"
                ))
                .with_sqlstate("42703"),
            )
        })
    }

    fn matches(&self, table: &str, row: &[Value], conditions: &[Condition]) -> Result<bool> {
        for condition in conditions {
            let matched = match condition {
                Condition::Equal(column, value) => same(&row[self.position(table, column)?], value),
                Condition::IsNull(column) => row[self.position(table, column)?].is_null(),
                Condition::In(column, values) => {
                    let v = &row[self.position(table, column)?];
                    values.iter().any(|value| same(v, value))
                }
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Index of a row (other than `skip`) conflicting with `row`, and whether the conflict is
    /// on the primary key.
    fn conflict(&self, row: &[Value], skip: Option<usize>) -> Option<bool> {
        for (i, other) in self.rows.iter().enumerate() {
            if Some(i) == skip {
                continue;
            }
            if self.primary_key > 0
                && (0..self.primary_key).all(|c| same(&row[c], &other[c]))
            {
                return Some(true);
            }
            if self
                .unique
                .iter()
                .any(|c| !row[*c].is_null() && same(&row[*c], &other[*c]))
            {
                return Some(false);
            }
        }
        None
    }
}

fn unique_violation(dialect: &dyn Dialect, table: &str, primary_key: bool) -> Error {
    let error = DriverError::new(format!(
        "duplicate key value violates unique constraint on \"{table}\""
    ));
    let error = match dialect.name() {
        "postgres" => error.with_sqlstate("23505"),
        "mysql" => error.with_code(1062),
        "sqlite" => error.with_code(if primary_key { 1555 } else { 2067 }),
        _ => error,
    };
    Error::new(error)
}

fn execute(tables: &mut Tables, dialect: &dyn Dialect, query: &str, args: &[Value]) -> Result<Output> {
    let command = Parser::new(query, args)?.parse()?;
    let name = match &command {
        Command::Insert { table, .. }
        | Command::Update { table, .. }
        | Command::Delete { table, .. }
        | Command::Select { table, .. } => table.clone(),
    };
    let Some(table) = tables.get_mut(&name) else {
        return Err(Error::new(
            DriverError::new(format!("relation \"{name}\" does not exist")).with_sqlstate("42P01"),
        ));
    };
    match command {
        Command::Insert {
            columns,
            values,
            returning,
            ..
        } => {
            let mut row = table.zeros.clone();
            let mut explicit = vec![false; row.len()];
            for (column, value) in columns.iter().zip(values) {
                let i = table.position(&name, column)?;
                row[i] = value;
                explicit[i] = true;
            }
            if table.primary_key == 1 {
                if !explicit[0] && (row[0].is_null() || row[0].as_i64().is_some()) {
                    row[0] = Value::Int64(Some(table.next_id));
                }
                if let Some(id) = row[0].as_i64() {
                    table.next_id = table.next_id.max(id + 1);
                }
            }
            if let Some(primary_key) = table.conflict(&row, None) {
                return Err(unique_violation(dialect, &name, primary_key));
            }
            let last_affected_id = if table.primary_key == 1 {
                row[0].as_i64()
            } else {
                None
            };
            let returned = returning
                .iter()
                .map(|c| Ok(row[table.position(&name, c)?].clone()))
                .collect::<Result<Vec<_>>>()?;
            table.rows.push(row);
            let mut output = Output::affected(1, last_affected_id);
            if !returning.is_empty() {
                output.labels = returning.into();
                output.rows.push(returned);
            }
            Ok(output)
        }
        Command::Update {
            set, conditions, ..
        } => {
            let set = set
                .into_iter()
                .map(|(c, v)| Ok((table.position(&name, &c)?, v)))
                .collect::<Result<Vec<_>>>()?;
            let mut updated = Vec::new();
            for (i, row) in table.rows.iter().enumerate() {
                if table.matches(&name, row, &conditions)? {
                    let mut row = row.clone();
                    for (c, v) in &set {
                        row[*c] = v.clone();
                    }
                    updated.push((i, row));
                }
            }
            for (i, row) in &updated {
                if let Some(primary_key) = table.conflict(row, Some(*i)) {
                    return Err(unique_violation(dialect, &name, primary_key));
                }
            }
            let count = updated.len() as u64;
            for (i, row) in updated {
                table.rows[i] = row;
            }
            Ok(Output::affected(count, None))
        }
        Command::Delete { conditions, .. } => {
            let mut keep = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                keep.push(!table.matches(&name, row, &conditions)?);
            }
            let before = table.rows.len();
            let mut keep = keep.into_iter();
            table.rows.retain(|_| keep.next().unwrap_or(true));
            Ok(Output::affected((before - table.rows.len()) as u64, None))
        }
        Command::Select {
            columns,
            conditions,
            order,
            limit,
            ..
        } => {
            let columns = if columns.is_empty() {
                table.columns.clone()
            } else {
                columns
            };
            let positions = columns
                .iter()
                .map(|c| table.position(&name, c))
                .collect::<Result<Vec<_>>>()?;
            let mut rows = Vec::new();
            for row in &table.rows {
                if table.matches(&name, row, &conditions)? {
                    rows.push(row.clone());
                }
            }
            if let Some((column, descending)) = order {
                let i = table.position(&name, &column)?;
                rows.sort_by(|l, r| compare(&l[i], &r[i]));
                if descending {
                    rows.reverse();
                }
            }
            if let Some(limit) = limit {
                rows.truncate(limit);
            }
            let rows = rows
                .into_iter()
                .map(|row| positions.iter().map(|i| row[*i].clone()).collect())
                .collect::<Vec<Vec<Value>>>();
            Ok(Output {
                labels: columns.into(),
                affected: RowsAffected {
                    rows_affected: rows.len() as u64,
                    last_affected_id: None,
                },
                rows,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Token, tokenize};

    #[test]
    fn tokenize_strips_comments() {
        let tokens = tokenize("SELECT people.id FROM people WHERE id = $12 /* report */")
            .expect("Failed to tokenize");
        assert_eq!(
            tokens,
            [
                Token::Word("SELECT".into()),
                Token::Word("people.id".into()),
                Token::Word("FROM".into()),
                Token::Word("people".into()),
                Token::Word("WHERE".into()),
                Token::Word("id".into()),
                Token::Symbol('='),
                Token::Placeholder(Some(12)),
            ]
        );
        assert!(tokenize("SELECT 1 /* open").is_err());
    }
}
