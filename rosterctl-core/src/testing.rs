//! Scripted in-memory executor for unit tests.

use async_trait::async_trait;

use crate::error::{QueryError, Result};
use crate::executor::QueryExecutor;
use crate::query::Query;
use crate::result::ResultSet;

/// Answers statements by matching the start of their text against scripted
/// rules (first match wins). Unmatched statements succeed with no rows.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    rules: Vec<(&'static str, Result<ResultSet>)>,
    log: Vec<Query>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, prefix: &'static str, result: ResultSet) -> Self {
        self.rules.push((prefix, Ok(result)));
        self
    }

    pub(crate) fn fail_on(mut self, prefix: &'static str, error: QueryError) -> Self {
        self.rules.push((prefix, Err(error)));
        self
    }

    pub(crate) fn queries(&self) -> &[Query] {
        &self.log
    }

    pub(crate) fn texts(&self) -> Vec<&'static str> {
        self.log.iter().map(Query::text).collect()
    }

    /// Position of the first logged statement starting with `prefix`.
    pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
        self.log
            .iter()
            .position(|q| q.text().trim_start().starts_with(prefix))
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&mut self, query: &Query) -> Result<ResultSet> {
        query.validate()?;
        self.log.push(query.clone());

        let text = query.text().trim_start();
        self.rules
            .iter()
            .find(|(prefix, _)| text.starts_with(prefix))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| Ok(ResultSet::empty()))
    }
}
