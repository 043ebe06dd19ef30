//! Row submission workflow: validate → submit → classify.
//!
//! The workflow owns no mutable state besides an optional ledger, so
//! independent workflows (or independent calls on one workflow) can run
//! concurrently. Nothing is retried; a caller that resubmits after a
//! transport error should attach insert ids or a ledger to avoid duplicate rows.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::WorkflowConfig;
use crate::destination::{Destination, TableId};
use crate::domain::batch::{Batch, SubmissionOutcome};
use crate::domain::record::Record;
use crate::domain::submission::state::Submission;
use crate::error::{Result, RowflowError};

pub mod ledger;

pub use ledger::{DuplicatePolicy, LedgerEntry, LedgerGuard, PriorSubmission, SubmissionLedger};

/// Check that every required field is present and holds an acceptable scalar.
///
/// Returns the record unchanged on success, so validating twice is a no-op.
/// On failure the error names every offending field, sorted.
pub fn validate<S: AsRef<str>>(record: Record, required_fields: &[S]) -> Result<Record> {
    let offending: BTreeSet<&str> = required_fields
        .iter()
        .map(AsRef::as_ref)
        .filter(|field| {
            !record
                .get(field)
                .is_some_and(|value| value.is_acceptable_scalar())
        })
        .collect();

    if offending.is_empty() {
        Ok(record)
    } else {
        Err(RowflowError::missing_fields(offending))
    }
}

/// Insert-and-verify submission to one destination table.
///
/// # Example
/// ```ignore
/// let workflow = SubmissionWorkflow::new(config, Arc::new(destination));
/// let outcome = workflow
///     .submit_records(rows, &["email", "favorite_flavor"])
///     .await?;
/// ```
pub struct SubmissionWorkflow<D: Destination> {
    destination: Arc<D>,
    config: WorkflowConfig,
    ledger: Option<(Arc<SubmissionLedger>, DuplicatePolicy)>,
}

impl<D: Destination> SubmissionWorkflow<D> {
    pub fn new(config: WorkflowConfig, destination: Arc<D>) -> Self {
        Self {
            destination,
            config,
            ledger: None,
        }
    }

    /// Track submitted batches by content hash and apply `policy` to repeats.
    pub fn with_ledger(mut self, ledger: Arc<SubmissionLedger>, policy: DuplicatePolicy) -> Self {
        self.ledger = Some((ledger, policy));
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn table(&self) -> &TableId {
        &self.config.destination_id
    }

    pub fn validate<S: AsRef<str>>(&self, record: Record, required_fields: &[S]) -> Result<Record> {
        validate(record, required_fields)
    }

    /// Send `batch` to the configured table in one call.
    ///
    /// With a `Reject` ledger, identical content is claimed before the call:
    /// of several concurrent submissions one is sent and the rest are refused.
    ///
    /// # Errors
    /// - `Validation` if the ledger refuses a repeated batch
    /// - `Transport` if the destination call fails or times out; no outcome is built
    /// - `Config` if credentials cannot be resolved
    pub async fn submit(&self, batch: Batch) -> Result<SubmissionOutcome> {
        let table = self.config.destination_id.clone();

        let guard = match &self.ledger {
            Some((ledger, policy)) => {
                Some(Self::check_duplicate(ledger, *policy, &table, &batch)?)
            }
            None => None,
        };

        let submitted = Submission::new(batch, table)
            .submit(self.destination.as_ref(), self.config.timeout())
            .await?;
        let outcome = submitted.into_outcome();

        if let Some(guard) = guard {
            guard.record(outcome.clone());
        }

        Ok(outcome)
    }

    fn check_duplicate<'l>(
        ledger: &'l SubmissionLedger,
        policy: DuplicatePolicy,
        table: &TableId,
        batch: &Batch,
    ) -> Result<LedgerGuard<'l>> {
        let hash = batch.content_hash();
        match policy {
            DuplicatePolicy::Reject => ledger.try_reserve(table, &hash).map_err(|prior| {
                tracing::warn!(
                    batch_id = %batch.id(),
                    table = %table,
                    prior = %prior.describe(),
                    "Refusing to resubmit a batch already sent to this table"
                );
                RowflowError::validation(format!(
                    "batch {} duplicates content already sent to {} ({})",
                    batch.id(),
                    table,
                    prior.describe()
                ))
            }),
            DuplicatePolicy::Warn => {
                let (previous, guard) = ledger.track(table, &hash);
                if let Some(previous) = previous {
                    tracing::warn!(
                        batch_id = %batch.id(),
                        table = %table,
                        previous_status = %previous.outcome.status,
                        "Resubmitting a batch already sent to this table; rows may be duplicated"
                    );
                }
                Ok(guard)
            }
        }
    }

    /// Validate every record, then submit them as one batch.
    ///
    /// All validation failures are reported together and nothing is sent if any
    /// record fails. Field names in the error are prefixed with the record index
    /// (`"1.favorite_flavor"`) when the batch has more than one record.
    pub async fn submit_records<S: AsRef<str>>(
        &self,
        records: Vec<Record>,
        required_fields: &[S],
    ) -> Result<SubmissionOutcome> {
        let multi = records.len() > 1;
        let mut valid = Vec::with_capacity(records.len());
        let mut offending = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            match validate(record, required_fields) {
                Ok(record) => valid.push(record),
                Err(RowflowError::Validation { fields, .. }) => {
                    offending.extend(fields.into_iter().map(|field| {
                        if multi {
                            format!("{}.{}", index, field)
                        } else {
                            field
                        }
                    }));
                }
                Err(other) => return Err(other),
            }
        }

        if !offending.is_empty() {
            tracing::warn!(
                table = %self.config.destination_id,
                invalid_fields = offending.len(),
                "Rejected batch before submission"
            );
            return Err(RowflowError::missing_fields(offending));
        }

        self.submit(Batch::new(valid)?).await
    }
}
