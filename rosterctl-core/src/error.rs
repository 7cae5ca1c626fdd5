/// Structured error types for rosterctl-core.
///
/// `QueryError` is what the store (or the executor in front of it) reports for
/// a single statement. `TransactionError` is what the insert workflow reports
/// once it has rolled back. Both are `Clone` so callers can keep the
/// diagnostic around after logging it.
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::transaction::TxState;

/// SQLSTATE codes for the integrity constraint class.
const NOT_NULL_VIOLATION: &str = "23502";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

/// Error raised while executing a single statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The store rejected the statement
    #[error("database error{}: {message}", .code.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Database {
        code: Option<String>,
        constraint: Option<String>,
        message: String,
    },

    /// The connection could not be opened or was lost
    #[error("connection error: {0}")]
    Connection(String),

    /// The store did not answer within the statement timeout
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    /// Placeholders in the text disagree with the bound values
    #[error("statement expects {expected} bound value(s) but {actual} were supplied")]
    ParameterMismatch { expected: usize, actual: usize },

    /// Same cache name registered with a different statement text
    #[error("prepared statement '{name}' is already registered with different text")]
    StatementConflict { name: &'static str },

    /// Result column of a type the executor cannot decode
    #[error("column '{column}' has unsupported type {type_name}")]
    UnsupportedColumn { column: String, type_name: String },

    /// Statement issued through a transaction guard that is not open
    #[error("transaction is {0}, not in progress")]
    TransactionClosed(TxState),

    /// Value could not be decoded into the expected type
    #[error("decode error: {0}")]
    Decode(String),
}

/// Broad classification of a `QueryError`, for callers that react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConstraintViolation(Constraint),
    Connection,
    Timeout,
    InvalidQuery,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    NotNull,
    ForeignKey,
    Unique,
    Check,
}

impl QueryError {
    /// Create a database error from a diagnostic message
    pub fn database(code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Database {
            code: code.map(str::to_owned),
            constraint: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database { code, .. } => match code.as_deref() {
                Some(NOT_NULL_VIOLATION) => ErrorKind::ConstraintViolation(Constraint::NotNull),
                Some(FOREIGN_KEY_VIOLATION) => {
                    ErrorKind::ConstraintViolation(Constraint::ForeignKey)
                }
                Some(UNIQUE_VIOLATION) => ErrorKind::ConstraintViolation(Constraint::Unique),
                Some(CHECK_VIOLATION) => ErrorKind::ConstraintViolation(Constraint::Check),
                _ => ErrorKind::Other,
            },
            Self::Connection(_) => ErrorKind::Connection,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ParameterMismatch { .. }
            | Self::StatementConflict { .. }
            | Self::TransactionClosed(_) => ErrorKind::InvalidQuery,
            Self::UnsupportedColumn { .. } | Self::Decode(_) => ErrorKind::Other,
        }
    }

    /// True when the store refused the write because of a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConstraintViolation(_))
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Database {
                code: db.code().map(|c| c.into_owned()),
                constraint: db.constraint().map(str::to_owned),
                message: db.message().to_owned(),
            },
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::Tls(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Self::Connection(err.to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Decode(format!("column {index}: {source}"))
            }
            sqlx::Error::Decode(e) => Self::Decode(e.to_string()),
            other => Self::Database {
                code: None,
                constraint: None,
                message: other.to_string(),
            },
        }
    }
}

/// Step of the insert workflow at which a transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Lock,
    ResolveSection,
    InsertStudent,
    Commit,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Begin => "begin",
            Self::Lock => "lock",
            Self::ResolveSection => "section resolution",
            Self::InsertStudent => "student insert",
            Self::Commit => "commit",
        };
        f.write_str(stage)
    }
}

/// A statement failed inside the insert workflow and the transaction was
/// rolled back (or never opened, when the failure was the BEGIN itself).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("transaction failed during {stage}: {source}")]
pub struct TransactionError {
    pub stage: TxStage,
    #[source]
    pub source: QueryError,
    /// Set when the ROLLBACK issued after `source` failed as well.
    pub rollback: Option<QueryError>,
}

impl TransactionError {
    /// The statement error that aborted the transaction.
    pub fn cause(&self) -> &QueryError {
        &self.source
    }

    /// True if nothing from this workflow can have been committed.
    pub fn rolled_back_cleanly(&self) -> bool {
        self.rollback.is_none()
    }
}

/// Result type alias for statement execution
pub type Result<T> = std::result::Result<T, QueryError>;
