//! Static configuration: workflow settings, credentials and pipeline wiring.
//!
//! Nothing is reloaded at runtime. Values come from code or, for the binary,
//! from `ROWFLOW_*` environment variables.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::destination::TableId;
use crate::error::{Result, RowflowError};

/// Default per-call timeout (30 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Prompt used by the automation pipeline when none is configured.
pub const DEFAULT_INSIGHT_PROMPT: &str =
    "Analyze the latest sales data trends and provide key insights.";

/// How a bearer token is obtained.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Credentials {
    /// No Authorization header (emulators, pre-signed URLs)
    #[default]
    Anonymous,
    /// A fixed access token
    Bearer(String),
    /// Read the access token from this environment variable at call time
    Env(String),
}

impl Credentials {
    /// Resolve to a bearer token. Anonymous resolves to an empty token.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Credentials::Anonymous => Ok(String::new()),
            Credentials::Bearer(token) => Ok(token.clone()),
            Credentials::Env(var) => match std::env::var(var) {
                Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
                _ => Err(RowflowError::Config(format!(
                    "credential environment variable {} is not set",
                    var
                ))),
            },
        }
    }
}

// Tokens never reach logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            Credentials::Env(var) => f.debug_tuple("Env").field(var).finish(),
        }
    }
}

/// Configuration for a [`SubmissionWorkflow`](crate::workflow::SubmissionWorkflow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Table every batch is written to
    pub destination_id: TableId,

    /// Auth for the destination
    #[serde(default)]
    pub credentials: Credentials,

    /// Maximum wait for the destination before reporting a transport error (milliseconds).
    /// Zero leaves the wait to the transport.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Ask the store to insert valid rows even when others in the batch are invalid.
    /// When false the store rejects the whole batch if any row is invalid.
    #[serde(default = "default_true")]
    pub skip_invalid_rows: bool,

    /// Ask the store to drop fields that are not in the table schema instead of
    /// rejecting the row.
    #[serde(default)]
    pub ignore_unknown_values: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl WorkflowConfig {
    pub fn new(destination_id: TableId) -> Self {
        Self {
            destination_id,
            credentials: Credentials::Anonymous,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            skip_invalid_rows: true,
            ignore_unknown_values: false,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where the automation pipeline reads its sales rows from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SalesSource {
    /// GET a JSON document and read rows from the array under `rows_key`.
    /// The upstream host gets its own credentials, never the cloud token.
    Http {
        url: String,
        rows_key: String,
        #[serde(default)]
        credentials: Credentials,
    },
    /// Read a headered CSV file
    Csv { path: PathBuf },
}

/// Wiring for the sales automation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sales_table: TableId,
    pub insights_table: TableId,
    pub source: SalesSource,
    /// Field normalized to a calendar date before upload
    pub date_field: String,
    /// Full `:predict` URL of the text-generation model
    pub predict_url: String,
    pub insight_prompt: String,
    /// Dashboard refresh URL; `None` skips the refresh step
    pub refresh_url: Option<String>,
    pub credentials: Credentials,
    pub timeout_ms: u64,
}

impl PipelineConfig {
    /// Read the pipeline configuration from `ROWFLOW_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (environment, test maps).
    ///
    /// Required: `ROWFLOW_SALES_TABLE`, `ROWFLOW_INSIGHTS_TABLE`,
    /// `ROWFLOW_PREDICT_URL`, and one of `ROWFLOW_SALES_URL` / `ROWFLOW_SALES_CSV`.
    /// Optional: `ROWFLOW_SALES_ROWS_KEY` (default `sales`), `ROWFLOW_SALES_TOKEN`
    /// (bearer token for the sales URL only), `ROWFLOW_DATE_FIELD`
    /// (default `date`), `ROWFLOW_INSIGHT_PROMPT`, `ROWFLOW_REFRESH_URL`,
    /// `ROWFLOW_ACCESS_TOKEN`, `ROWFLOW_TIMEOUT_MS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| RowflowError::Config(format!("{} is not set", key)))
        };

        let source = match (get("ROWFLOW_SALES_URL"), get("ROWFLOW_SALES_CSV")) {
            (Some(url), None) => SalesSource::Http {
                url,
                rows_key: get("ROWFLOW_SALES_ROWS_KEY").unwrap_or_else(|| "sales".to_string()),
                credentials: match get("ROWFLOW_SALES_TOKEN") {
                    Some(token) => Credentials::Bearer(token.trim().to_string()),
                    None => Credentials::Anonymous,
                },
            },
            (None, Some(path)) => SalesSource::Csv {
                path: PathBuf::from(path),
            },
            (Some(_), Some(_)) => {
                return Err(RowflowError::Config(
                    "set only one of ROWFLOW_SALES_URL and ROWFLOW_SALES_CSV".to_string(),
                ));
            }
            (None, None) => {
                return Err(RowflowError::Config(
                    "one of ROWFLOW_SALES_URL or ROWFLOW_SALES_CSV must be set".to_string(),
                ));
            }
        };

        let timeout_ms = match get("ROWFLOW_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse().map_err(|e| {
                RowflowError::Config(format!("ROWFLOW_TIMEOUT_MS '{}': {}", raw, e))
            })?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let credentials = match get("ROWFLOW_ACCESS_TOKEN") {
            Some(token) => Credentials::Bearer(token.trim().to_string()),
            None => Credentials::Anonymous,
        };

        Ok(Self {
            sales_table: require("ROWFLOW_SALES_TABLE")?.parse()?,
            insights_table: require("ROWFLOW_INSIGHTS_TABLE")?.parse()?,
            source,
            date_field: get("ROWFLOW_DATE_FIELD").unwrap_or_else(|| "date".to_string()),
            predict_url: require("ROWFLOW_PREDICT_URL")?,
            insight_prompt: get("ROWFLOW_INSIGHT_PROMPT")
                .unwrap_or_else(|| DEFAULT_INSIGHT_PROMPT.to_string()),
            refresh_url: get("ROWFLOW_REFRESH_URL"),
            credentials,
            timeout_ms,
        })
    }

    /// Workflow settings for one of the pipeline's tables.
    pub fn workflow_config(&self, table: &TableId) -> WorkflowConfig {
        WorkflowConfig::new(table.clone())
            .with_credentials(self.credentials.clone())
            .with_timeout_ms(self.timeout_ms)
    }
}
