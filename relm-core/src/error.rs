use crate::Error;

/// Conditions callers are expected to match on.
///
/// They travel inside an [`anyhow::Error`](crate::Error), use [`ErrorExt`] to recover them.
/// Every other database error is returned exactly as the driver reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A statement expected to affect or return exactly one row did not.
    #[error("no rows in result set")]
    NoRows,
    /// An update style operation was attempted on a record whose primary key is unset.
    #[error("no primary key")]
    NoPrimaryKey,
    /// The driver reported a unique constraint violation.
    #[error("unique violation")]
    UniqueViolation,
    /// Commit or rollback on a transaction that already reached a terminal state.
    #[error("transaction has already been committed or rolled back")]
    TransactionAlreadyFinished,
    /// The request context was cancelled.
    #[error("context cancelled")]
    Cancelled,
    /// The request context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ErrorKind {
    pub fn into_error(self) -> Error {
        Error::new(self)
    }
}

pub trait ErrorExt {
    /// The [`ErrorKind`] carried by this error, if any.
    fn kind(&self) -> Option<ErrorKind>;
    fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }
}

impl ErrorExt for Error {
    fn kind(&self) -> Option<ErrorKind> {
        self.downcast_ref::<ErrorKind>().copied()
    }
}

impl<T> ErrorExt for crate::Result<T> {
    fn kind(&self) -> Option<ErrorKind> {
        self.as_ref().err().and_then(ErrorExt::kind)
    }
}

/// Error reported by a driver, in the shape dialects know how to classify.
///
/// Drivers convert their native errors into this type (keeping the message), `sqlstate` is
/// the five character SQLSTATE when the backend has one, `code` the vendor numeric code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub sqlstate: Option<String>,
    pub code: Option<i64>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sqlstate: None,
            code: None,
            message: message.into(),
        }
    }
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}
