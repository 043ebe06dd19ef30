//! BigQuery and Vertex adapters against a local HTTP server, through the real reqwest client.

use rowflow::batch::{Batch, Record, SubmissionStatus};
use rowflow::destination::BigQueryDestination;
use rowflow::generation::{TextGenerator, VertexTextGenerator};
use rowflow::workflow::SubmissionWorkflow;
use rowflow::{Credentials, ReqwestHttpClient, RowflowError, TableId, WorkflowConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSERT_PATH: &str = "/bigquery/v2/projects/your_project/datasets/your_dataset/tables/sales_data/insertAll";

fn table() -> TableId {
    "your_project.your_dataset.sales_data".parse().unwrap()
}

fn workflow(server: &MockServer, timeout_ms: u64) -> SubmissionWorkflow<BigQueryDestination<ReqwestHttpClient>> {
    let config = WorkflowConfig::new(table())
        .with_credentials(Credentials::Bearer("ya29.test".into()))
        .with_timeout_ms(timeout_ms);
    let destination = BigQueryDestination::new(Arc::new(ReqwestHttpClient::new()), &config)
        .with_base_url(server.uri());
    SubmissionWorkflow::new(config, Arc::new(destination))
}

fn sales_rows() -> Vec<Record> {
    vec![
        Record::new().with("date", "2025-03-16").with("sales", 10000).with("region", "US"),
        Record::new().with("date", "2025-03-16").with("sales", 8000).with("region", "EU"),
    ]
}

#[test_log::test(tokio::test)]
async fn test_insert_all_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_partial_json(json!({
            "skipInvalidRows": true,
            "rows": [
                {"json": {"date": "2025-03-16", "sales": 10000, "region": "US"}},
                {"json": {"date": "2025-03-16", "sales": 8000, "region": "EU"}}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"kind": "bigquery#tableDataInsertAllResponse"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = workflow(&server, 5_000)
        .submit(Batch::new(sales_rows()).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.accepted_count, 2);
    assert_eq!(outcome.status, SubmissionStatus::AllAccepted);
}

#[test_log::test(tokio::test)]
async fn test_insert_all_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [
                {"index": 1, "errors": [{"reason": "invalid", "message": "type mismatch"}]}
            ]
        })))
        .mount(&server)
        .await;

    let outcome = workflow(&server, 5_000)
        .submit(Batch::new(sales_rows()).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.accepted_count, 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].index, 1);
    assert_eq!(outcome.rejected[0].reason, "invalid: type mismatch");
    assert_eq!(outcome.status, SubmissionStatus::PartiallyAccepted);
}

#[test_log::test(tokio::test)]
async fn test_auth_failure_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Request had invalid authentication credentials."}
        })))
        .mount(&server)
        .await;

    let err = workflow(&server, 5_000)
        .submit(Batch::new(sales_rows()).unwrap())
        .await
        .unwrap_err();

    match err {
        RowflowError::Transport { cause } => {
            assert!(cause.contains("HTTP 401"), "{cause}");
            assert!(cause.contains("invalid authentication credentials"), "{cause}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_network_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = workflow(&server, 200)
        .submit(Batch::new(sales_rows()).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, RowflowError::Transport { .. }), "{err:?}");
}

#[test_log::test(tokio::test)]
async fn test_vertex_predict_round_trip() {
    let server = MockServer::start().await;
    let predict_path = "/v1/projects/p/locations/us-central1/publishers/google/models/text-bison@001:predict";
    Mock::given(method("POST"))
        .and(path(predict_path))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_partial_json(json!({
            "instances": [{"prompt": "Analyze last month's sales trends"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"content": "EU sales dipped 20% while US held steady."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = VertexTextGenerator::new(
        Arc::new(ReqwestHttpClient::new()),
        format!("{}{}", server.uri(), predict_path),
        Credentials::Bearer("ya29.test".into()),
        5_000,
    );

    let text = generator
        .generate("Analyze last month's sales trends")
        .await
        .unwrap();
    assert_eq!(
        text.as_deref(),
        Some("EU sales dipped 20% while US held steady.")
    );
}
