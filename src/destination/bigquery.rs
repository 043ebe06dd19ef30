//! BigQuery streaming inserts via `tabledata.insertAll`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Destination, RowError, RowReport, TableId};
use crate::config::{Credentials, WorkflowConfig};
use crate::domain::record::Record;
use crate::error::{Result, RowflowError};
use crate::http::{HttpClient, HttpRequest};

/// Public BigQuery API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com";

/// Longest slice of an error response body kept in a transport error.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    kind: &'static str,
    skip_invalid_rows: bool,
    ignore_unknown_values: bool,
    rows: Vec<InsertAllRow<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRow<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    insert_id: Option<&'a str>,
    json: &'a Record,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrors>,
}

#[derive(Deserialize)]
struct InsertErrors {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
    location: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        let mut text = match (&self.reason, &self.message) {
            (Some(reason), Some(message)) if !message.is_empty() => {
                format!("{}: {}", reason, message)
            }
            (Some(reason), _) => reason.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "unknown error".to_string(),
        };
        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            text.push_str(&format!(" (at {})", location));
        }
        text
    }
}

/// Destination writing to BigQuery tables through the REST API.
///
/// With `skip_invalid_rows` enabled the store inserts every valid row and
/// reports the rest; otherwise one invalid row fails the whole request and
/// the store reports every row (valid ones with reason `stopped`).
pub struct BigQueryDestination<H: HttpClient> {
    http_client: Arc<H>,
    base_url: String,
    credentials: Credentials,
    timeout_ms: u64,
    skip_invalid_rows: bool,
    ignore_unknown_values: bool,
}

impl<H: HttpClient> BigQueryDestination<H> {
    pub fn new(http_client: Arc<H>, config: &WorkflowConfig) -> Self {
        Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: config.credentials.clone(),
            timeout_ms: config.timeout_ms,
            skip_invalid_rows: config.skip_invalid_rows,
            ignore_unknown_values: config.ignore_unknown_values,
        }
    }

    /// Point at another endpoint (emulator, regional endpoint, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn insert_all_path(table: &TableId) -> String {
        format!(
            "/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            table.project, table.dataset, table.table
        )
    }
}

#[async_trait]
impl<H: HttpClient> Destination for BigQueryDestination<H> {
    #[tracing::instrument(skip(self, rows), fields(table = %table, rows = rows.len()))]
    async fn insert_rows(&self, table: &TableId, rows: &[Record]) -> Result<RowReport> {
        let body = serde_json::to_string(&InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            skip_invalid_rows: self.skip_invalid_rows,
            ignore_unknown_values: self.ignore_unknown_values,
            rows: rows
                .iter()
                .map(|record| InsertAllRow {
                    insert_id: record.insert_id(),
                    json: record,
                })
                .collect(),
        })?;

        let request = HttpRequest::new(
            "POST",
            self.base_url.as_str(),
            Self::insert_all_path(table),
            body,
        );
        let token = self.credentials.resolve()?;

        let response = self
            .http_client
            .execute(&request, &token, self.timeout_ms)
            .await?;

        if !response.is_success() {
            let snippet: String = response.body.chars().take(MAX_ERROR_BODY).collect();
            return Err(RowflowError::transport(format!(
                "insertAll returned HTTP {}: {}",
                response.status, snippet
            )));
        }

        let parsed: InsertAllResponse = serde_json::from_str(&response.body)?;
        let report: RowReport = parsed
            .insert_errors
            .into_iter()
            .flat_map(|entry| {
                let index = entry.index;
                let reasons: Vec<String> = if entry.errors.is_empty() {
                    vec!["unknown error".to_string()]
                } else {
                    entry.errors.iter().map(ErrorProto::describe).collect()
                };
                reasons
                    .into_iter()
                    .map(move |reason| RowError::new(index, reason))
            })
            .collect();

        tracing::debug!(row_errors = report.len(), "insertAll completed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};
    use serde_json::json;

    const PATH: &str = "/bigquery/v2/projects/proj/datasets/users/tables/favorite_flavors/insertAll";

    fn setup() -> (Arc<MockHttpClient>, BigQueryDestination<MockHttpClient>, TableId) {
        let table: TableId = "proj.users.favorite_flavors".parse().unwrap();
        let config = WorkflowConfig::new(table.clone())
            .with_credentials(Credentials::Bearer("tok".into()))
            .with_timeout_ms(1234);
        let http = Arc::new(MockHttpClient::new());
        let destination = BigQueryDestination::new(http.clone(), &config);
        (http, destination, table)
    }

    fn respond(http: &MockHttpClient, status: u16, body: serde_json::Value) {
        http.add_response(
            &format!("POST {}", PATH),
            Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    #[tokio::test]
    async fn test_request_shape() {
        let (http, destination, table) = setup();
        respond(&http, 200, json!({"kind": "bigquery#tableDataInsertAllResponse"}));

        let rows = vec![
            Record::new()
                .with("email", "a@x.com")
                .with("favorite_flavor", "mint")
                .with_insert_id("a@x.com"),
            Record::new().with("email", "b@x.com"),
        ];
        let report = destination.insert_rows(&table, &rows).await.unwrap();
        assert!(report.is_empty());

        let calls = http.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, DEFAULT_BASE_URL);
        assert_eq!(calls[0].bearer_token, "tok");
        assert_eq!(calls[0].timeout_ms, 1234);

        let sent: serde_json::Value = serde_json::from_str(&calls[0].body).unwrap();
        assert_eq!(
            sent,
            json!({
                "kind": "bigquery#tableDataInsertAllRequest",
                "skipInvalidRows": true,
                "ignoreUnknownValues": false,
                "rows": [
                    {"insertId": "a@x.com", "json": {"email": "a@x.com", "favorite_flavor": "mint"}},
                    {"json": {"email": "b@x.com"}}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_insert_errors_become_row_report() {
        let (http, destination, table) = setup();
        respond(
            &http,
            200,
            json!({
                "insertErrors": [
                    {"index": 1, "errors": [
                        {"reason": "invalid", "location": "sales", "message": "Cannot convert value to integer."}
                    ]},
                    {"index": 0, "errors": []}
                ]
            }),
        );

        let rows = vec![Record::new().with("sales", 1), Record::new().with("sales", "lots")];
        let report = destination.insert_rows(&table, &rows).await.unwrap();
        assert_eq!(
            report,
            vec![
                RowError::new(1, "invalid: Cannot convert value to integer. (at sales)"),
                RowError::new(0, "unknown error"),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_error_status_is_transport_error() {
        let (http, destination, table) = setup();
        respond(
            &http,
            403,
            json!({"error": {"code": 403, "message": "Access Denied"}}),
        );

        let err = destination
            .insert_rows(&table, &[Record::new().with("email", "a@x.com")])
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("HTTP 403"));
        assert!(err.to_string().contains("Access Denied"));
    }
}
