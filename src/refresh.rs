//! Dashboard refresh trigger.

use crate::error::{Result, RowflowError};
use crate::http::{HttpClient, HttpRequest};

/// Fire one POST at `url` to nudge a dashboard into refreshing.
///
/// The response carries no contract: a non-2xx status is logged and otherwise
/// ignored. Only failure to reach the endpoint is an error.
#[tracing::instrument(skip(client), fields(url = %url))]
pub async fn trigger_refresh<H: HttpClient + ?Sized>(
    client: &H,
    url: &str,
    timeout_ms: u64,
) -> Result<()> {
    let request = HttpRequest::from_url("POST", url, "")?;
    let response = client
        .execute(&request, "", timeout_ms)
        .await
        .map_err(RowflowError::into_transport)?;

    if response.is_success() {
        tracing::info!(status = response.status, "Dashboard refresh triggered");
    } else {
        tracing::warn!(
            status = response.status,
            "Dashboard refresh endpoint answered with a non-success status"
        );
    }
    Ok(())
}
