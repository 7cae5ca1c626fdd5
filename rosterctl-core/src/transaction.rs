//! Transaction envelope over a [`QueryExecutor`].
//!
//! BEGIN, COMMIT and ROLLBACK are ordinary statements issued through the same
//! executor as everything else. The guard only tracks where we are:
//!
//! ```text
//! Idle -> InTransaction -> Committed
//!                       -> RolledBack
//! ```
//!
//! Terminal states are final. A guard dropped while still in a transaction
//! logs a warning; the owner is expected to discard the session.

use std::fmt;

use async_trait::async_trait;
use tracing::warn;

use crate::config::IsolationLevel;
use crate::error::{QueryError, Result};
use crate::executor::QueryExecutor;
use crate::query::Query;
use crate::result::ResultSet;

const COMMIT: &str = "COMMIT";
const ROLLBACK: &str = "ROLLBACK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    InTransaction,
    Committed,
    RolledBack,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::InTransaction => "in transaction",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

pub struct Transaction<'e, E: QueryExecutor + ?Sized> {
    executor: &'e mut E,
    state: TxState,
}

impl<'e, E: QueryExecutor + ?Sized> Transaction<'e, E> {
    /// Issue BEGIN at `isolation`. On failure nothing was opened.
    pub async fn begin(executor: &'e mut E, isolation: IsolationLevel) -> Result<Self> {
        let mut tx = Self {
            executor,
            state: TxState::Idle,
        };
        tx.executor
            .execute(&Query::new(isolation.begin_statement()))
            .await?;
        tx.state = TxState::InTransaction;
        Ok(tx)
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Nothing may be sent once the guard has left `InTransaction`.
    fn ensure_open(&self) -> Result<()> {
        match self.state {
            TxState::InTransaction => Ok(()),
            other => Err(QueryError::TransactionClosed(other)),
        }
    }

    /// Run a statement inside the transaction.
    pub async fn execute(&mut self, query: &Query) -> Result<ResultSet> {
        self.ensure_open()?;
        self.executor.execute(query).await
    }

    /// Issue COMMIT. A failed commit leaves the guard in-transaction so the
    /// caller can still roll back.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.executor.execute(&Query::new(COMMIT)).await?;
        self.state = TxState::Committed;
        Ok(())
    }

    /// Issue ROLLBACK. The guard is terminal afterwards even if the
    /// statement itself failed. A guard that is already terminal keeps its
    /// state and sends nothing.
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        let result = self.executor.execute(&Query::new(ROLLBACK)).await;
        self.state = TxState::RolledBack;
        result.map(|_| ())
    }
}

/// Lets components that take an executor run inside the transaction, still
/// subject to the guard's state.
#[async_trait]
impl<'e, E: QueryExecutor + ?Sized> QueryExecutor for Transaction<'e, E> {
    async fn execute(&mut self, query: &Query) -> Result<ResultSet> {
        Transaction::execute(self, query).await
    }
}

impl<E: QueryExecutor + ?Sized> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if self.state == TxState::InTransaction {
            warn!("transaction dropped without commit or rollback");
        }
    }
}
