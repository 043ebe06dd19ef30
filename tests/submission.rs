use rowflow::batch::{Batch, Record, RowRejection, SubmissionOutcome, SubmissionStatus};
use rowflow::destination::InMemoryDestination;
use rowflow::workflow::{DuplicatePolicy, SubmissionLedger, SubmissionWorkflow, validate};
use rowflow::{RowflowError, TableId, WorkflowConfig};
use std::sync::Arc;
use std::time::Duration;

const REQUIRED: [&str; 2] = ["email", "favorite_flavor"];

fn table() -> TableId {
    "proj.users.favorite_flavors".parse().unwrap()
}

fn setup() -> (InMemoryDestination, SubmissionWorkflow<InMemoryDestination>) {
    let destination = InMemoryDestination::new();
    let workflow = SubmissionWorkflow::new(
        WorkflowConfig::new(table()).with_timeout_ms(500),
        Arc::new(destination.clone()),
    );
    (destination, workflow)
}

fn flavor(email: &str, flavor: &str) -> Record {
    Record::new()
        .with("email", email)
        .with("favorite_flavor", flavor)
}

#[test_log::test(tokio::test)]
async fn test_single_row_accepted() {
    let (destination, workflow) = setup();

    let outcome = workflow
        .submit_records(vec![flavor("a@x.com", "mint")], &REQUIRED)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SubmissionOutcome {
            accepted_count: 1,
            rejected: vec![],
            status: SubmissionStatus::AllAccepted,
        }
    );
    assert_eq!(destination.rows(&table()), vec![flavor("a@x.com", "mint")]);
}

#[test_log::test(tokio::test)]
async fn test_missing_required_field_fails_before_network() {
    let (destination, workflow) = setup();

    let record = Record::new().with("email", "a@x.com");
    match validate(record.clone(), &REQUIRED) {
        Err(RowflowError::Validation { fields, .. }) => {
            assert_eq!(fields, vec!["favorite_flavor".to_string()])
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let err = workflow
        .submit_records(vec![record], &REQUIRED)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(destination.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_second_row_rejected_is_partial() {
    let (destination, workflow) = setup();
    destination.reject_when(|index, _| (index == 1).then(|| "type mismatch".to_string()));

    let batch = Batch::new(vec![flavor("a@x.com", "mint"), flavor("b@x.com", "vanilla")]).unwrap();
    let outcome = workflow.submit(batch).await.unwrap();

    assert_eq!(
        outcome,
        SubmissionOutcome {
            accepted_count: 1,
            rejected: vec![RowRejection {
                index: 1,
                reason: "type mismatch".to_string()
            }],
            status: SubmissionStatus::PartiallyAccepted,
        }
    );
}

#[test_log::test(tokio::test)]
async fn test_every_row_rejected_is_failed() {
    let (destination, workflow) = setup();
    destination.reject_when(|_, _| Some("no such field".to_string()));

    let batch = Batch::new(vec![flavor("a@x.com", "mint"), flavor("b@x.com", "mint")]).unwrap();
    let outcome = workflow.submit(batch).await.unwrap();

    assert_eq!(outcome.accepted_count, 0);
    assert_eq!(outcome.rejected.len(), 2);
    assert_eq!(outcome.status, SubmissionStatus::Failed);
    assert!(destination.rows(&table()).is_empty());
}

#[test_log::test(tokio::test)]
async fn test_network_failure_is_transport_error() {
    let (destination, workflow) = setup();
    destination.fail_next("operation timed out");

    let batch = Batch::new(vec![flavor("a@x.com", "mint")]).unwrap();
    match workflow.submit(batch).await {
        Err(RowflowError::Transport { cause }) => assert_eq!(cause, "operation timed out"),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert!(destination.rows(&table()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_destination_slower_than_timeout_is_transport_error() {
    let destination = InMemoryDestination::new().with_latency(Duration::from_secs(60));
    let workflow = SubmissionWorkflow::new(
        WorkflowConfig::new(table()).with_timeout_ms(500),
        Arc::new(destination.clone()),
    );

    let batch = Batch::new(vec![flavor("a@x.com", "mint")]).unwrap();
    let err = workflow.submit(batch).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(destination.call_count(), 1);
    assert!(destination.rows(&table()).is_empty());
}

#[test_log::test(tokio::test)]
async fn test_independent_workflows_run_concurrently() {
    let destination = InMemoryDestination::new();
    let sales: TableId = "proj.sales_reports.monthly_sales".parse().unwrap();

    let a = SubmissionWorkflow::new(WorkflowConfig::new(table()), Arc::new(destination.clone()));
    let b = SubmissionWorkflow::new(WorkflowConfig::new(sales.clone()), Arc::new(destination.clone()));

    let (ra, rb) = tokio::join!(
        a.submit(Batch::new(vec![flavor("a@x.com", "mint")]).unwrap()),
        b.submit(
            Batch::new(vec![
                Record::new().with("date", "2025-03-16").with("sales", 10000).with("region", "US"),
                Record::new().with("date", "2025-03-16").with("sales", 8000).with("region", "EU"),
            ])
            .unwrap()
        ),
    );

    assert!(ra.unwrap().is_all_accepted());
    assert_eq!(rb.unwrap().accepted_count, 2);
    assert_eq!(destination.rows(&table()).len(), 1);
    assert_eq!(destination.rows(&sales).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_duplicates_are_refused_under_reject_policy() {
    let destination = InMemoryDestination::new().with_latency(Duration::from_millis(50));
    let ledger = Arc::new(SubmissionLedger::new());
    let workflow = SubmissionWorkflow::new(
        WorkflowConfig::new(table()).with_timeout_ms(500),
        Arc::new(destination.clone()),
    )
    .with_ledger(ledger.clone(), DuplicatePolicy::Reject);

    let rows = vec![flavor("a@x.com", "mint")];
    let (a, b) = tokio::join!(
        workflow.submit(Batch::new(rows.clone()).unwrap()),
        workflow.submit(Batch::new(rows.clone()).unwrap()),
    );

    let (ok, refused): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(|r| r.is_ok());
    assert_eq!(ok.len(), 1);
    assert_eq!(refused.len(), 1);
    let err = refused.into_iter().next().unwrap().unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("in flight"), "{err}");

    assert_eq!(destination.call_count(), 1);
    assert_eq!(destination.rows(&table()).len(), 1);
    assert_eq!(ledger.len(), 1);
}
