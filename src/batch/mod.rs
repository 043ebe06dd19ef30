//! Record, batch and outcome types.
//!
//! This module re-exports types from `domain::record`, `domain::batch` and
//! `domain::submission`. See those modules for the actual implementations.

pub use crate::domain::batch::{
    Batch, BatchId, RowError, RowRejection, RowReport, SubmissionOutcome, SubmissionStatus,
};
pub use crate::domain::record::{FieldValue, Record};
pub use crate::domain::submission::state::{
    Submission, SubmissionState, Submitted, Unsubmitted,
};
