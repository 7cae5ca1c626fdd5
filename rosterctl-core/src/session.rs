//! Database session: one connection, its prepared statements, its options.
//!
//! A session is opened explicitly and handed to whatever needs to run
//! statements; nothing here is global. Dropping a session closes its socket,
//! so the connection is released on every exit path. [`Session::close`] does
//! the same gracefully.

use async_trait::async_trait;
use sqlx::postgres::PgStatement;
use sqlx::{Connection, Executor, PgConnection, Statement};
use tracing::{debug, info};

use crate::config::{ConnectionConfig, SessionOptions};
use crate::error::{QueryError, Result};
use crate::executor::{bind_values, fetch_result, QueryExecutor};
use crate::query::Query;
use crate::result::ResultSet;
use crate::statements::StatementCache;

pub struct Session {
    conn: PgConnection,
    statements: StatementCache<PgStatement<'static>>,
    options: SessionOptions,
}

impl Session {
    /// Connect to the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Connection` if the store is unreachable or the
    /// connect does not finish within the statement timeout.
    pub async fn open(config: &ConnectionConfig, options: SessionOptions) -> Result<Self> {
        let timeout = options.statement_timeout();
        let connect_options = config.connect_options();
        let connect = PgConnection::connect_with(&connect_options);

        let conn = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| QueryError::Connection(format!("connect timed out after {timeout:?}")))?
            .map_err(|e| match QueryError::from(e) {
                QueryError::Database { message, .. } => QueryError::Connection(message),
                other => other,
            })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "session opened"
        );
        Ok(Self::from_connection(conn, options))
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: PgConnection, options: SessionOptions) -> Self {
        Self {
            conn,
            statements: StatementCache::new(),
            options,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn statements(&self) -> &StatementCache<PgStatement<'static>> {
        &self.statements
    }

    /// Direct access to the underlying connection (schema setup, tests).
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Close the connection, telling the server we are leaving.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        debug!("session closed");
        Ok(())
    }
}

#[async_trait]
impl QueryExecutor for Session {
    async fn execute(&mut self, query: &Query) -> Result<ResultSet> {
        query.validate()?;

        let timeout = self.options.statement_timeout();
        let Session {
            conn, statements, ..
        } = self;

        debug!(
            statement = query.name().unwrap_or("-"),
            params = query.values().len(),
            "executing"
        );

        let run = async {
            match query.name() {
                Some(name) => {
                    let text = query.text();
                    let prepare_conn = &mut *conn;
                    let statement = statements
                        .resolve(name, text, || async move {
                            Ok::<_, QueryError>(prepare_conn.prepare(text).await?)
                        })
                        .await?;
                    fetch_result(conn, bind_values(statement.query(), query.values())).await
                }
                None => {
                    fetch_result(conn, bind_values(sqlx::query(query.text()), query.values()))
                        .await
                }
            }
        };

        tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| QueryError::Timeout(timeout))?
    }
}
