//! Content-hash ledger of submitted batches.
//!
//! Destinations without an idempotency key will happily store the same rows
//! twice. The ledger remembers the last outcome per batch content hash so a
//! repeat submission can be flagged or refused.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::batch::SubmissionOutcome;
use crate::destination::TableId;

/// What to do when a batch with a known content hash is submitted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Log a warning and submit anyway
    #[default]
    Warn,
    /// Refuse with a validation error before any network call
    Reject,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub table: TableId,
    pub outcome: SubmissionOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// What the ledger already knows about a content hash.
#[derive(Debug, Clone)]
pub enum PriorSubmission {
    /// Another submission of the same content is waiting on the destination
    InFlight { since: DateTime<Utc> },
    Recorded(LedgerEntry),
}

impl PriorSubmission {
    pub fn describe(&self) -> String {
        match self {
            PriorSubmission::InFlight { since } => {
                format!("in flight since {}", since.to_rfc3339())
            }
            PriorSubmission::Recorded(entry) => format!(
                "submitted at {} ({})",
                entry.recorded_at.to_rfc3339(),
                entry.outcome.status
            ),
        }
    }
}

type Key = (TableId, String);

/// Thread-safe map of `(table, content_hash) -> last known outcome`.
///
/// The same rows sent to two different tables are not duplicates. Entries are
/// kept for the ledger's lifetime; share one ledger per process run, not per
/// service lifetime, or call [`clear`](Self::clear) between runs.
#[derive(Debug, Default)]
pub struct SubmissionLedger {
    entries: Mutex<HashMap<Key, PriorSubmission>>,
}

impl SubmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded outcome for a content hash. In-flight submissions are not reported.
    pub fn lookup(&self, table: &TableId, content_hash: &str) -> Option<LedgerEntry> {
        match self
            .entries
            .lock()
            .get(&(table.clone(), content_hash.to_string()))
        {
            Some(PriorSubmission::Recorded(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Claim a content hash for one submission.
    ///
    /// Checking and claiming happen under one lock, so of several concurrent
    /// callers exactly one gets the [`LedgerGuard`]. The others get what the
    /// ledger holds. The claim is dropped if the guard is dropped unrecorded.
    pub fn try_reserve(
        &self,
        table: &TableId,
        content_hash: &str,
    ) -> std::result::Result<LedgerGuard<'_>, PriorSubmission> {
        let key = (table.clone(), content_hash.to_string());
        let mut entries = self.entries.lock();
        if let Some(prior) = entries.get(&key) {
            return Err(prior.clone());
        }
        entries.insert(key.clone(), PriorSubmission::InFlight { since: Utc::now() });
        Ok(LedgerGuard {
            ledger: self,
            key: Some(key),
            holds_claim: true,
        })
    }

    /// Track a submission without claiming its hash. Returns the recorded
    /// outcome of an earlier submission, if any.
    pub fn track(
        &self,
        table: &TableId,
        content_hash: &str,
    ) -> (Option<LedgerEntry>, LedgerGuard<'_>) {
        let prior = self.lookup(table, content_hash);
        let guard = LedgerGuard {
            ledger: self,
            key: Some((table.clone(), content_hash.to_string())),
            holds_claim: false,
        };
        (prior, guard)
    }

    /// Record the outcome of a completed submission, replacing any earlier entry.
    pub fn record(
        &self,
        table: TableId,
        content_hash: impl Into<String>,
        outcome: SubmissionOutcome,
    ) {
        self.entries.lock().insert(
            (table.clone(), content_hash.into()),
            PriorSubmission::Recorded(LedgerEntry {
                table,
                outcome,
                recorded_at: Utc::now(),
            }),
        );
    }

    fn release(&self, key: &Key) {
        let mut entries = self.entries.lock();
        if matches!(entries.get(key), Some(PriorSubmission::InFlight { .. })) {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// One submission's hold on a ledger key.
///
/// [`record`](Self::record) stores the outcome. Dropping the guard without
/// recording (transport failure, cancelled future) releases a claim taken by
/// [`SubmissionLedger::try_reserve`].
#[must_use = "dropping the guard releases the claim"]
pub struct LedgerGuard<'a> {
    ledger: &'a SubmissionLedger,
    key: Option<Key>,
    holds_claim: bool,
}

impl LedgerGuard<'_> {
    pub fn record(mut self, outcome: SubmissionOutcome) {
        if let Some((table, hash)) = self.key.take() {
            self.ledger.record(table, hash, outcome);
        }
    }
}

impl Drop for LedgerGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            if self.holds_claim {
                self.ledger.release(&key);
            }
        }
    }
}
