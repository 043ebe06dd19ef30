//! Sales automation pipeline.
//!
//! Fetch sales rows → upload them → generate an insight → store it → refresh
//! the dashboard. Each step's failure is logged and recorded in the report;
//! later steps still run. Scheduling the pipeline is left to the host.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{PipelineConfig, SalesSource};
use crate::destination::{BigQueryDestination, Destination};
use crate::domain::batch::SubmissionOutcome;
use crate::domain::record::Record;
use crate::error::{Result, RowflowError};
use crate::generation::{TextGenerator, VertexTextGenerator};
use crate::http::HttpClient;
use crate::insights::{InsightOutcome, InsightWorkflow};
use crate::refresh::trigger_refresh;
use crate::source::{fetch_http, normalize_dates, read_csv};
use crate::workflow::SubmissionWorkflow;

/// Result of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "detail", rename_all = "snake_case")]
pub enum StepResult<T> {
    Done(T),
    /// Not run (nothing to do, or not configured)
    Skipped(String),
    Failed(String),
}

impl<T> StepResult<T> {
    fn from_result(step: &'static str, result: Result<T>) -> Self {
        match result {
            Ok(value) => StepResult::Done(value),
            Err(e) => {
                tracing::error!(step = step, error = %e, "Pipeline step failed");
                StepResult::Failed(e.to_string())
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Rows read from the upstream source
    pub fetched: StepResult<usize>,
    pub sales: StepResult<SubmissionOutcome>,
    pub insight: StepResult<InsightOutcome>,
    pub refresh: StepResult<()>,
}

impl PipelineReport {
    pub fn has_failures(&self) -> bool {
        self.fetched.is_failed()
            || self.sales.is_failed()
            || self.insight.is_failed()
            || self.refresh.is_failed()
    }
}

pub struct Pipeline<H, D, G>
where
    H: HttpClient,
    D: Destination,
    G: TextGenerator,
{
    config: PipelineConfig,
    http_client: Arc<H>,
    sales: SubmissionWorkflow<D>,
    insights: InsightWorkflow<G, D>,
}

impl<H: HttpClient> Pipeline<H, BigQueryDestination<H>, VertexTextGenerator<H>> {
    /// Wire the pipeline against BigQuery and Vertex AI over one HTTP client.
    pub fn from_config(config: PipelineConfig, http_client: Arc<H>) -> Self {
        let sales_config = config.workflow_config(&config.sales_table);
        let insights_config = config.workflow_config(&config.insights_table);

        let sales_destination = Arc::new(BigQueryDestination::new(http_client.clone(), &sales_config));
        let insights_destination =
            Arc::new(BigQueryDestination::new(http_client.clone(), &insights_config));
        let generator = Arc::new(VertexTextGenerator::new(
            http_client.clone(),
            config.predict_url.clone(),
            config.credentials.clone(),
            config.timeout_ms,
        ));

        Pipeline::new(
            config,
            http_client,
            SubmissionWorkflow::new(sales_config, sales_destination),
            InsightWorkflow::new(generator, SubmissionWorkflow::new(insights_config, insights_destination)),
        )
    }
}

impl<H, D, G> Pipeline<H, D, G>
where
    H: HttpClient,
    D: Destination,
    G: TextGenerator,
{
    pub fn new(
        config: PipelineConfig,
        http_client: Arc<H>,
        sales: SubmissionWorkflow<D>,
        insights: InsightWorkflow<G, D>,
    ) -> Self {
        Self {
            config,
            http_client,
            sales,
            insights,
        }
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        match &self.config.source {
            SalesSource::Http {
                url,
                rows_key,
                credentials,
            } => {
                let token = credentials.resolve()?;
                fetch_http(
                    self.http_client.as_ref(),
                    url,
                    rows_key,
                    &token,
                    self.config.timeout_ms,
                )
                .await
            }
            SalesSource::Csv { path } => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || read_csv(path))
                    .await
                    .map_err(|e| RowflowError::Other(anyhow::anyhow!("CSV reader panicked: {}", e)))?
            }
        }
    }

    async fn upload(&self, rows: Vec<Record>) -> Result<SubmissionOutcome> {
        let date_field = self.config.date_field.as_str();
        let rows = normalize_dates(rows, date_field)?;
        self.sales.submit_records(rows, &[date_field]).await
    }

    /// Run every step once.
    #[tracing::instrument(skip(self), fields(sales_table = %self.config.sales_table, insights_table = %self.config.insights_table))]
    pub async fn run(&self) -> PipelineReport {
        tracing::info!("Automation started");

        let (fetched, sales) = match self.fetch().await {
            Ok(rows) if rows.is_empty() => {
                tracing::warn!("Upstream returned no rows");
                (
                    StepResult::Done(0),
                    StepResult::Skipped("no rows fetched".to_string()),
                )
            }
            Ok(rows) => {
                let count = rows.len();
                tracing::info!(records = count, "Rows fetched");
                (
                    StepResult::Done(count),
                    StepResult::from_result("upload_sales", self.upload(rows).await),
                )
            }
            Err(e) => (
                StepResult::from_result("fetch", Err(e)),
                StepResult::Skipped("fetch failed".to_string()),
            ),
        };

        let insight =
            StepResult::from_result("insights", self.insights.run(&self.config.insight_prompt).await);

        let refresh = match &self.config.refresh_url {
            Some(url) => StepResult::from_result(
                "refresh",
                trigger_refresh(self.http_client.as_ref(), url, self.config.timeout_ms).await,
            ),
            None => StepResult::Skipped("no refresh URL configured".to_string()),
        };

        let report = PipelineReport {
            fetched,
            sales,
            insight,
            refresh,
        };
        tracing::info!(failures = report.has_failures(), "Automation completed");
        report
    }
}
