//! Statement execution result.

use crate::odbc::Column;
use std::sync::Arc;

/// Outcome of [`Cursor::execute`](crate::Cursor::execute).
#[derive(Debug, Clone)]
pub struct QueryResult {
    rows_affected: u64,
    columns: Arc<[Column]>,
}

impl Default for QueryResult {
    fn default() -> Self {
        Self::new(0, Arc::from(Vec::new()))
    }
}

impl QueryResult {
    pub fn new(rows_affected: u64, columns: Arc<[Column]>) -> Self {
        Self {
            rows_affected,
            columns,
        }
    }

    /// Rows changed by INSERT, UPDATE or DELETE. 0 for queries.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Description of the result set; empty when the statement produced none.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

impl Extend<QueryResult> for QueryResult {
    fn extend<T: IntoIterator<Item = QueryResult>>(&mut self, iter: T) {
        for result in iter {
            self.rows_affected += result.rows_affected;
            self.columns = result.columns;
        }
    }
}
