//! Tabular store destinations.
//!
//! A destination accepts a batch of rows in one call and answers with a
//! per-row error report. Failures of the call itself are errors; rows the
//! store refused are not.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::record::Record;
use crate::error::{Result, RowflowError};

pub mod bigquery;
pub mod memory;

pub use crate::domain::batch::{RowError, RowReport};
pub use bigquery::BigQueryDestination;
pub use memory::InMemoryDestination;

/// Fully qualified table identifier, `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl FromStr for TableId {
    type Err = RowflowError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(TableId::new(*project, *dataset, *table))
            }
            _ => Err(RowflowError::Config(format!(
                "invalid table id '{}': expected project.dataset.table",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TableId {
    type Error = RowflowError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TableId> for String {
    fn from(id: TableId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A tabular store that accepts batch inserts.
///
/// Implementations make exactly one call per invocation and never retry.
/// The returned report lists rejected rows by their index in `rows`.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn insert_rows(&self, table: &TableId, rows: &[Record]) -> Result<RowReport>;
}

#[async_trait]
impl<D: Destination + ?Sized> Destination for std::sync::Arc<D> {
    async fn insert_rows(&self, table: &TableId, rows: &[Record]) -> Result<RowReport> {
        (**self).insert_rows(table, rows).await
    }
}
