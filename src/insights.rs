//! Generated insights: ask the model for a summary and store it as a row.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::destination::Destination;
use crate::domain::batch::{Batch, SubmissionOutcome};
use crate::domain::record::Record;
use crate::error::Result;
use crate::generation::TextGenerator;
use crate::workflow::SubmissionWorkflow;

/// Fields every insight row must carry.
pub const INSIGHT_FIELDS: [&str; 2] = ["date", "insight"];

/// What happened to one insight request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "outcome", rename_all = "snake_case")]
pub enum InsightOutcome {
    /// A completion was generated and submitted
    Saved(SubmissionOutcome),
    /// The service answered with no usable completion; nothing was written
    NoCompletion,
}

/// Build the `{date, insight}` row stored for a completion.
pub fn insight_record(date: NaiveDate, text: &str) -> Record {
    Record::new().with("date", date).with("insight", text)
}

/// Generate-then-store workflow for model insights.
pub struct InsightWorkflow<G: TextGenerator, D: Destination> {
    generator: Arc<G>,
    submission: SubmissionWorkflow<D>,
}

impl<G: TextGenerator, D: Destination> InsightWorkflow<G, D> {
    pub fn new(generator: Arc<G>, submission: SubmissionWorkflow<D>) -> Self {
        Self {
            generator,
            submission,
        }
    }

    /// Run one prompt, dated today (UTC).
    pub async fn run(&self, prompt: &str) -> Result<InsightOutcome> {
        self.run_on(prompt, Utc::now().date_naive()).await
    }

    /// Run one prompt and date the stored row `date`.
    ///
    /// Transport failures from either service propagate; a missing completion
    /// is an outcome, not an error.
    #[tracing::instrument(skip(self, prompt), fields(table = %self.submission.table(), date = %date))]
    pub async fn run_on(&self, prompt: &str, date: NaiveDate) -> Result<InsightOutcome> {
        let Some(text) = self.generator.generate(prompt).await? else {
            tracing::warn!("No completion to store");
            return Ok(InsightOutcome::NoCompletion);
        };

        let record = self
            .submission
            .validate(insight_record(date, &text), &INSIGHT_FIELDS)?;
        let outcome = self.submission.submit(Batch::new(vec![record])?).await?;

        tracing::info!(status = %outcome.status, "Insight submitted");
        Ok(InsightOutcome::Saved(outcome))
    }
}
