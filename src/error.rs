//! Error types for the row submission workflow.

use thiserror::Error;

/// Result type alias using the rowflow error type.
pub type Result<T> = std::result::Result<T, RowflowError>;

/// Main error type for rowflow.
///
/// Row-level rejections reported by a destination are not errors; they are
/// carried in [`SubmissionOutcome`](crate::batch::SubmissionOutcome).
#[derive(Error, Debug)]
pub enum RowflowError {
    /// Input was rejected before any network call (missing fields, empty batch,
    /// refused duplicate).
    #[error("Validation error: {reason}")]
    Validation {
        reason: String,
        /// Offending field names, sorted. Empty when the failure is not field-specific.
        fields: Vec<String>,
    },

    /// The call to an external service could not complete (network, auth, quota,
    /// timeout, malformed response).
    #[error("Transport error: {cause}")]
    Transport { cause: String },

    /// Static configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RowflowError {
    /// Validation failure naming the fields that are missing or not acceptable scalars.
    pub fn missing_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        fields.sort();
        fields.dedup();
        RowflowError::Validation {
            reason: format!("missing or invalid fields: {}", fields.join(", ")),
            fields,
        }
    }

    /// Validation failure that is not tied to particular fields.
    pub fn validation(reason: impl Into<String>) -> Self {
        RowflowError::Validation {
            reason: reason.into(),
            fields: Vec::new(),
        }
    }

    pub fn transport(cause: impl Into<String>) -> Self {
        RowflowError::Transport {
            cause: cause.into(),
        }
    }

    /// True for failures raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, RowflowError::Validation { .. })
    }

    /// True for failures of the network call itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RowflowError::Transport { .. } | RowflowError::HttpClient(_)
        )
    }

    /// Collapse any failure of a destination call into [`RowflowError::Transport`].
    ///
    /// Validation and configuration errors are returned unchanged; they were
    /// raised before anything went over the wire.
    pub fn into_transport(self) -> Self {
        match self {
            e @ (RowflowError::Validation { .. }
            | RowflowError::Config(_)
            | RowflowError::Transport { .. }) => e,
            other => RowflowError::Transport {
                cause: other.to_string(),
            },
        }
    }
}
