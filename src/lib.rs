//! Insert-and-verify row submission for hosted tabular stores.
//!
//! This crate validates semi-structured records, submits them to a tabular store
//! (BigQuery `insertAll`, or anything implementing [`Destination`]) in a single call,
//! and classifies the store's per-row report as full, partial or failed acceptance.
//!
//! Around that core sit the thin adapters the sales automation needs: a text
//! generation client, upstream readers, a dashboard refresh trigger, and a
//! pipeline that chains them.

pub mod batch;
pub mod config;
pub mod destination;
pub mod domain;
pub mod error;
pub mod generation;
pub mod handler;
pub mod http;
pub mod insights;
pub mod pipeline;
pub mod refresh;
pub mod source;
pub mod workflow;

// Re-export commonly used types
pub use batch::*;
pub use config::{Credentials, PipelineConfig, SalesSource, WorkflowConfig};
pub use destination::{BigQueryDestination, Destination, InMemoryDestination, TableId};
pub use error::{Result, RowflowError};
pub use generation::{TextGenerator, VertexTextGenerator};
pub use http::{HttpClient, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use insights::{InsightOutcome, InsightWorkflow};
pub use pipeline::{Pipeline, PipelineReport, StepResult};
pub use workflow::{DuplicatePolicy, SubmissionLedger, SubmissionWorkflow, validate};
