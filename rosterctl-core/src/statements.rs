//! Prepared statement cache.
//!
//! Maps a logical name to the statement prepared for it on one session. The
//! first execution under a name prepares the text; later executions reuse the
//! prepared statement and only re-bind values.
//!
//! A name is a 1:1 key for one statement text. Reusing a name with different
//! text is rejected with [`QueryError::StatementConflict`] instead of silently
//! running the old plan.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;

use sqlx::postgres::PgStatement;
use tracing::debug;

use crate::error::{QueryError, Result};

struct Registered<S> {
    text: &'static str,
    statement: S,
}

/// Name → prepared statement registry, generic over the statement handle so
/// the bookkeeping does not depend on a live connection.
pub struct StatementCache<S = PgStatement<'static>> {
    entries: HashMap<&'static str, Registered<S>>,
}

impl<S> Default for StatementCache<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S> StatementCache<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the statement registered under `name`, calling `prepare` to
    /// create it on first use.
    pub async fn resolve<F, Fut>(
        &mut self,
        name: &'static str,
        text: &'static str,
        prepare: F,
    ) -> Result<&S>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        match self.entries.entry(name) {
            Entry::Occupied(entry) => {
                if entry.get().text != text {
                    return Err(QueryError::StatementConflict { name });
                }
                Ok(&entry.into_mut().statement)
            }
            Entry::Vacant(entry) => {
                let statement = prepare().await?;
                debug!(statement = name, "registered prepared statement");
                Ok(&entry.insert(Registered { text, statement }).statement)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Statement text registered under `name`.
    pub fn text(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name).map(|entry| entry.text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every registration; the next use of each name prepares again.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
