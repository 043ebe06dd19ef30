//! Submission states.
//!
//! A submission is a batch bound to a destination table. It moves through two
//! states, enforced at compile time with the typestate pattern.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::batch::{Batch, SubmissionOutcome};
use crate::destination::TableId;

/// Marker trait for valid submission states.
pub trait SubmissionState: Send + Sync {}

/// A batch headed for (or already written to) one destination table.
///
/// The generic parameter `T` represents the current state of the submission.
///
/// # Example
/// ```ignore
/// let submission = Submission::new(batch, table);
/// let submitted = submission.submit(&destination, timeout).await?;
/// println!("{:?}", submitted.outcome());
/// ```
#[derive(Debug, Clone)]
pub struct Submission<T: SubmissionState> {
    /// The current state of the submission.
    pub state: T,
    /// The records being written.
    pub batch: Batch,
    /// Where they are written.
    pub table: TableId,
}

/// Created but not yet sent.
#[derive(Debug, Clone, Serialize)]
pub struct Unsubmitted {
    pub created_at: DateTime<Utc>,
}

impl SubmissionState for Unsubmitted {}

/// Sent once; the destination answered with a per-row report (terminal state).
#[derive(Debug, Clone, Serialize)]
pub struct Submitted {
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub outcome: SubmissionOutcome,
}

impl SubmissionState for Submitted {}
