//! Favorite-flavor endpoint logic.
//!
//! Takes the JSON body of a POST `{email, favorite_flavor}`, writes one row,
//! and answers with a `{"message": ...}` document. Hosting (an HTTP function,
//! a tool-calling agent) is left to the caller.

use serde::{Deserialize, Serialize};

use crate::destination::Destination;
use crate::domain::batch::RowRejection;
use crate::domain::record::Record;
use crate::error::Result;
use crate::workflow::SubmissionWorkflow;

pub const FAVORITE_FLAVOR_FIELDS: [&str; 2] = ["email", "favorite_flavor"];

/// Response body of the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn describe(rejected: &[RowRejection]) -> String {
    rejected
        .iter()
        .map(|r| format!("row {}: {}", r.index, r.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Record one user's favorite flavor.
///
/// Only the two expected fields are forwarded. The email doubles as the row's
/// insert id so that a retried call is deduplicated by the store.
///
/// # Errors
/// `Validation` for a body that is not an object or lacks either field;
/// `Transport` when the store cannot be reached. Rows refused by the store are
/// reported in the message, not as errors.
#[tracing::instrument(skip(workflow, body))]
pub async fn record_favorite_flavor<D: Destination>(
    workflow: &SubmissionWorkflow<D>,
    body: serde_json::Value,
) -> Result<Message> {
    tracing::debug!(body = %body, "Received favorite flavor");

    let incoming = Record::from_json(body)?;
    let mut record: Record = FAVORITE_FLAVOR_FIELDS
        .iter()
        .filter_map(|field| incoming.get(field).map(|v| (*field, v.clone())))
        .collect();
    let insert_id = record.get("email").and_then(|v| v.as_str()).map(str::to_string);
    if let Some(id) = insert_id {
        record = record.with_insert_id(id);
    }

    let outcome = workflow
        .submit_records(vec![record], &FAVORITE_FLAVOR_FIELDS)
        .await
        .inspect_err(|e| {
            if !e.is_validation() {
                tracing::error!(error = %e, "Could not record favorite flavor");
            }
        })?;

    if outcome.is_all_accepted() {
        Ok(Message::new("New row has been added."))
    } else {
        Ok(Message::new(format!(
            "Encountered errors while inserting rows: {}",
            describe(&outcome.rejected)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::error::RowflowError;
    use crate::destination::{InMemoryDestination, TableId};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (InMemoryDestination, SubmissionWorkflow<InMemoryDestination>, TableId) {
        let table: TableId = "proj.users.favorite_flavors".parse().unwrap();
        let destination = InMemoryDestination::new();
        let workflow =
            SubmissionWorkflow::new(WorkflowConfig::new(table.clone()), Arc::new(destination.clone()));
        (destination, workflow, table)
    }

    #[tokio::test]
    async fn test_records_row_and_drops_extra_fields() {
        let (destination, workflow, table) = setup();
        let message = record_favorite_flavor(
            &workflow,
            json!({"email": "a@x.com", "favorite_flavor": "mint", "session": "xyz"}),
        )
        .await
        .unwrap();

        assert_eq!(message.message, "New row has been added.");
        let rows = destination.rows(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].insert_id(), Some("a@x.com"));
        assert!(rows[0].get("session").is_none());
    }

    #[tokio::test]
    async fn test_store_rejection_is_reported_in_message() {
        let (destination, workflow, _) = setup();
        destination.reject_when(|_, _| Some("no such field: favorite_flavor".to_string()));

        let message = record_favorite_flavor(
            &workflow,
            json!({"email": "a@x.com", "favorite_flavor": "mint"}),
        )
        .await
        .unwrap();
        assert_eq!(
            message.message,
            "Encountered errors while inserting rows: row 0: no such field: favorite_flavor"
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_validation_error() {
        let (destination, workflow, _) = setup();
        let err = record_favorite_flavor(&workflow, json!({"email": "a@x.com"}))
            .await
            .unwrap_err();
        match err {
            RowflowError::Validation { fields, .. } => {
                assert_eq!(fields, vec!["favorite_flavor".to_string()])
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(destination.call_count(), 0);

        assert!(
            record_favorite_flavor(&workflow, json!("mint"))
                .await
                .unwrap_err()
                .is_validation()
        );
    }
}
