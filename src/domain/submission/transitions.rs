//! State transitions for submissions using the typestate pattern.
//!
//! ```text
//! Submission<Unsubmitted> ──submit()──> Submission<Submitted>
//!           │
//!           └──submit() fails──> Err(Transport)   (submission consumed)
//! ```
//!
//! `submit` consumes the unsubmitted value, so a batch can only be sent once
//! per submission. Sending it again means building a new submission; nothing
//! here remembers what was sent before.

use std::time::Duration;

use chrono::Utc;
use metrics::counter;

use super::state::{Submission, Submitted, Unsubmitted};
use crate::destination::{Destination, TableId};
use crate::domain::batch::{Batch, SubmissionOutcome, SubmissionStatus};
use crate::error::{Result, RowflowError};

impl Submission<Unsubmitted> {
    pub fn new(batch: Batch, table: TableId) -> Self {
        Submission {
            state: Unsubmitted {
                created_at: Utc::now(),
            },
            batch,
            table,
        }
    }

    /// Send the batch to `destination` in one call and classify the reply.
    ///
    /// A zero `timeout` leaves the wait bounded only by the transport. Any
    /// failure before per-row feedback arrives is a [`RowflowError::Transport`];
    /// row-level rejections are reported in the outcome.
    #[tracing::instrument(skip(self, destination), fields(batch_id = %self.batch.id(), table = %self.table, rows = self.batch.len()))]
    pub async fn submit<D: Destination + ?Sized>(
        self,
        destination: &D,
        timeout: Duration,
    ) -> Result<Submission<Submitted>> {
        let table = self.table.to_string();
        let call = destination.insert_rows(&self.table, self.batch.records());

        let result = if timeout.is_zero() {
            call.await
        } else {
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(RowflowError::transport(format!(
                    "destination did not respond within {} ms",
                    timeout.as_millis()
                ))),
            }
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                let e = e.into_transport();
                if e.is_transport() {
                    counter!("rowflow_transport_errors_total", "table" => table).increment(1);
                    tracing::error!(error = %e, "Submission failed before any per-row feedback");
                }
                return Err(e);
            }
        };

        let outcome = SubmissionOutcome::classify(self.batch.len(), report).inspect_err(|e| {
            counter!("rowflow_transport_errors_total", "table" => table.clone()).increment(1);
            tracing::error!(error = %e, "Destination returned a malformed row report");
        })?;

        counter!("rowflow_submissions_total", "table" => table.clone(), "status" => outcome.status.as_str())
            .increment(1);
        counter!("rowflow_rows_accepted_total", "table" => table.clone())
            .increment(outcome.accepted_count as u64);
        counter!("rowflow_rows_rejected_total", "table" => table)
            .increment(outcome.rejected.len() as u64);

        match outcome.status {
            SubmissionStatus::AllAccepted => tracing::info!(
                accepted = outcome.accepted_count,
                "All rows accepted"
            ),
            SubmissionStatus::PartiallyAccepted => tracing::warn!(
                accepted = outcome.accepted_count,
                rejected = outcome.rejected.len(),
                first_reason = %outcome.rejected[0].reason,
                "Some rows rejected"
            ),
            SubmissionStatus::Failed => tracing::warn!(
                rejected = outcome.rejected.len(),
                first_reason = %outcome.rejected[0].reason,
                "Every row rejected"
            ),
        }

        Ok(Submission {
            state: Submitted {
                created_at: self.state.created_at,
                submitted_at: Utc::now(),
                outcome,
            },
            batch: self.batch,
            table: self.table,
        })
    }
}

impl Submission<Submitted> {
    pub fn outcome(&self) -> &SubmissionOutcome {
        &self.state.outcome
    }

    pub fn into_outcome(self) -> SubmissionOutcome {
        self.state.outcome
    }
}
