//! Section repository
//!
//! - ensure_exists: look up by id, create with a default delegate if absent
//! - list / get: plain reads
//!
//! Errors are never caught here; whoever owns the transaction decides what a
//! failure means.

use tracing::debug;

use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::models::Section;
use crate::query::Query;

/// Delegate assigned to sections created by the insert workflow.
pub const DEFAULT_DELEGATE_ID: i32 = 1;

const SELECT_SECTION: &str = "SELECT * FROM section WHERE section_id = $1";

const INSERT_SECTION: &str =
    "INSERT INTO section (section_id, section_name, delegate_id) VALUES ($1, $2, $3)";

const LIST_SECTIONS: &str = "SELECT section_id, section_name FROM section ORDER BY section_id";

/// Section repository
pub struct SectionRepo<'e, E: QueryExecutor + ?Sized> {
    executor: &'e mut E,
}

impl<'e, E: QueryExecutor + ?Sized> SectionRepo<'e, E> {
    pub fn new(executor: &'e mut E) -> Self {
        Self { executor }
    }

    /// Make sure `section_id` exists, creating it when absent.
    ///
    /// Returns `true` if a row was inserted. When the section already exists
    /// `section_name` is ignored. A `None` name on the creation path is sent
    /// as NULL and the store's not-null constraint rejects it.
    pub async fn ensure_exists(
        &mut self,
        section_id: i32,
        section_name: Option<&str>,
    ) -> Result<bool> {
        let existing = self
            .executor
            .execute(
                &Query::new(SELECT_SECTION)
                    .named("section_by_id")
                    .bind(section_id),
            )
            .await?;

        if existing.row_count > 0 {
            debug!(section_id, "section exists");
            return Ok(false);
        }

        self.executor
            .execute(
                &Query::new(INSERT_SECTION)
                    .named("insert_section")
                    .bind(section_id)
                    .bind(section_name)
                    .bind(DEFAULT_DELEGATE_ID),
            )
            .await?;

        debug!(section_id, "section created");
        Ok(true)
    }

    /// All sections ordered by id.
    pub async fn list(&mut self) -> Result<Vec<Section>> {
        let result = self.executor.execute(&Query::new(LIST_SECTIONS)).await?;
        result.rows.iter().map(Section::try_from).collect()
    }

    /// A single section by id.
    pub async fn get(&mut self, section_id: i32) -> Result<Option<Section>> {
        let result = self
            .executor
            .execute(
                &Query::new(SELECT_SECTION)
                    .named("section_by_id")
                    .bind(section_id),
            )
            .await?;
        result.first().map(Section::try_from).transpose()
    }
}
