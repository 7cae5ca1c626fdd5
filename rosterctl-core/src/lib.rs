//! rosterctl-core: transactional data access for sections and students
//!
//! Statements are [`Query`] descriptors (static text plus bound values) run
//! through a [`QueryExecutor`]. A [`Session`] is the Postgres executor, with
//! a per-session prepared statement cache. [`StudentRepo::add`] is the
//! compound write: ensure the section exists, insert the student, all in one
//! transaction.

pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod query;
pub mod result;
pub mod schema;
pub mod sections;
pub mod session;
pub mod statements;
pub mod students;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use config::{ConnectionConfig, IsolationLevel, SessionOptions};
pub use error::{Constraint, ErrorKind, QueryError, TransactionError, TxStage};
pub use executor::QueryExecutor;
pub use models::{AddedStudent, NewStudent, Section, Student};
pub use query::{Query, Value};
pub use result::{ResultSet, Row};
pub use schema::{migrate, MIGRATOR};
pub use sections::SectionRepo;
pub use session::Session;
pub use statements::StatementCache;
pub use students::StudentRepo;
pub use transaction::{Transaction, TxState};
