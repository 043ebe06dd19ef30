//! In-memory destination for tests and dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Destination, RowError, RowReport, TableId};
use crate::domain::record::Record;
use crate::error::{Result, RowflowError};

/// Predicate deciding whether a row is refused, and why.
type RejectionRule = Arc<dyn Fn(usize, &Record) -> Option<String> + Send + Sync>;

/// Destination that keeps accepted rows in memory.
///
/// Rows can be refused with [`reject_when`](Self::reject_when) rules, and whole
/// calls can be failed with [`fail_next`](Self::fail_next). Clones share state.
///
/// # Example
/// ```ignore
/// let destination = InMemoryDestination::new();
/// destination.reject_when(|_, row| {
///     row.get("sales")
///         .and_then(|v| v.as_str())
///         .map(|_| "type mismatch".to_string())
/// });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDestination {
    tables: Arc<Mutex<HashMap<TableId, Vec<Record>>>>,
    rules: Arc<Mutex<Vec<RejectionRule>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to exercise timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Refuse rows for which `rule` returns a reason. The first matching rule wins.
    pub fn reject_when<F>(&self, rule: F)
    where
        F: Fn(usize, &Record) -> Option<String> + Send + Sync + 'static,
    {
        self.rules.lock().push(Arc::new(rule));
    }

    /// Fail the next call as a transport error with `cause`. Queued in FIFO order.
    pub fn fail_next(&self, cause: impl Into<String>) {
        self.failures.lock().push_back(cause.into());
    }

    /// Rows accepted so far for `table`, in insertion order.
    pub fn rows(&self, table: &TableId) -> Vec<Record> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    /// Number of `insert_rows` calls received, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Destination for InMemoryDestination {
    async fn insert_rows(&self, table: &TableId, rows: &[Record]) -> Result<RowReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(cause) = self.failures.lock().pop_front() {
            return Err(RowflowError::transport(cause));
        }

        let rules: Vec<RejectionRule> = self.rules.lock().clone();
        let mut report = RowReport::new();
        let mut accepted = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            match rules.iter().find_map(|rule| rule(index, row)) {
                Some(reason) => report.push(RowError::new(index, reason)),
                None => accepted.push(row.clone()),
            }
        }

        self.tables
            .lock()
            .entry(table.clone())
            .or_default()
            .extend(accepted);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_and_failures() {
        let destination = InMemoryDestination::new();
        let table = TableId::new("p", "d", "t");
        destination.reject_when(|index, _| (index == 1).then(|| "type mismatch".to_string()));
        destination.fail_next("connection reset");

        let rows = vec![Record::new().with("n", 0), Record::new().with("n", 1)];

        let err = destination.insert_rows(&table, &rows).await.unwrap_err();
        assert!(err.is_transport());
        assert!(destination.rows(&table).is_empty());

        let report = destination.insert_rows(&table, &rows).await.unwrap();
        assert_eq!(report, vec![RowError::new(1, "type mismatch")]);
        assert_eq!(destination.rows(&table), vec![Record::new().with("n", 0)]);
        assert_eq!(destination.call_count(), 2);
    }
}
