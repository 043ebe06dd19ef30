//! Batch and outcome types.
//!
//! A batch is an ordered, non-empty group of records submitted together. Its
//! outcome is derived purely from the destination's per-row error report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::record::Record;
use crate::error::{Result, RowflowError};

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl From<Uuid> for BatchId {
    fn from(uuid: Uuid) -> Self {
        BatchId(uuid)
    }
}

impl std::ops::Deref for BatchId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// An ordered, non-empty sequence of records.
///
/// Order is irrelevant to the store but preserved so that per-row errors can
/// be correlated back to the caller's input.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: BatchId,
    records: Vec<Record>,
}

impl Batch {
    /// Create a batch. Fails with a validation error on empty input.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        if records.is_empty() {
            return Err(RowflowError::validation("cannot submit an empty batch"));
        }
        Ok(Self {
            id: BatchId::from(Uuid::new_v4()),
            records,
        })
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Hex SHA-256 over the batch contents (fields and insert ids, in order).
    ///
    /// Two batches with the same rows in the same order hash identically
    /// regardless of their `BatchId`. Each value is hashed with its type, so
    /// `Null` and a non-finite float, or `"1"` and `1`, never collide.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            for (name, value) in record.fields() {
                hasher.update(name.as_bytes());
                hasher.update([0x1f_u8]);
                hasher.update(value.type_name().as_bytes());
                hasher.update([0x1f_u8]);
                hasher.update(value.to_string().as_bytes());
                hasher.update([0x1e_u8]);
            }
            hasher.update([0x1d_u8]);
            if let Some(insert_id) = record.insert_id() {
                hasher.update(insert_id.as_bytes());
            }
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

impl TryFrom<Vec<Record>> for Batch {
    type Error = RowflowError;

    fn try_from(records: Vec<Record>) -> Result<Self> {
        Batch::new(records)
    }
}

/// One per-row error as reported by a destination.
///
/// A destination may report several errors for the same row; they are merged
/// when the outcome is classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub index: usize,
    pub reason: String,
}

impl RowError {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Per-row error report from a destination. Empty means every row was accepted.
pub type RowReport = Vec<RowError>;

/// A row the destination refused, by position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    AllAccepted,
    PartiallyAccepted,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::AllAccepted => "all_accepted",
            SubmissionStatus::PartiallyAccepted => "partially_accepted",
            SubmissionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one batch submission.
///
/// Invariants, upheld by [`SubmissionOutcome::classify`]:
/// - `accepted_count + rejected.len()` equals the batch size
/// - `status == AllAccepted` exactly when `rejected` is empty
/// - `status == Failed` exactly when nothing was accepted from a non-empty batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub accepted_count: usize,
    pub rejected: Vec<RowRejection>,
    pub status: SubmissionStatus,
}

impl SubmissionOutcome {
    /// Build an outcome from a destination's row report for a batch of `batch_len` rows.
    ///
    /// Errors sharing an index collapse into one rejection with reasons joined by
    /// `"; "`. An index outside the batch means the destination's response is
    /// malformed and is reported as a transport error.
    pub fn classify(batch_len: usize, report: RowReport) -> Result<Self> {
        let mut by_index: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for error in report {
            if error.index >= batch_len {
                return Err(RowflowError::transport(format!(
                    "destination reported row index {} for a batch of {} rows",
                    error.index, batch_len
                )));
            }
            by_index.entry(error.index).or_default().push(error.reason);
        }

        let rejected: Vec<RowRejection> = by_index
            .into_iter()
            .map(|(index, reasons)| RowRejection {
                index,
                reason: reasons.join("; "),
            })
            .collect();

        let accepted_count = batch_len - rejected.len();
        let status = if rejected.is_empty() {
            SubmissionStatus::AllAccepted
        } else if accepted_count == 0 {
            SubmissionStatus::Failed
        } else {
            SubmissionStatus::PartiallyAccepted
        };

        Ok(Self {
            accepted_count,
            rejected,
            status,
        })
    }

    pub fn is_all_accepted(&self) -> bool {
        self.status == SubmissionStatus::AllAccepted
    }
}
