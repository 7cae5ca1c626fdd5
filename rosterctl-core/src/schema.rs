//! Schema bootstrap for the section/course/student tables.

use sqlx::migrate::MigrateError;
use tracing::info;

use crate::error::{QueryError, Result};
use crate::session::Session;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../migrations");

/// Apply pending migrations on the session's connection.
pub async fn migrate(session: &mut Session) -> Result<()> {
    info!("Running roster migrations...");

    MIGRATOR
        .run(session.connection())
        .await
        .map_err(|e| match e {
            MigrateError::Execute(inner) => QueryError::from(inner),
            other => QueryError::database(None, other.to_string()),
        })
}
