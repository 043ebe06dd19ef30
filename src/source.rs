//! Upstream data sources: read the input rows once per run.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::record::{DATE_FORMAT, FieldValue, Record};
use crate::error::{Result, RowflowError};
use crate::http::{HttpClient, HttpRequest};

/// GET a JSON document and turn the array under `rows_key` into records.
///
/// A non-2xx status is a transport error. A document that is not JSON, or has
/// no array under `rows_key`, is reported as-is for the caller to log.
#[tracing::instrument(skip(client, bearer_token), fields(url = %url, rows_key = %rows_key))]
pub async fn fetch_http<H: HttpClient + ?Sized>(
    client: &H,
    url: &str,
    rows_key: &str,
    bearer_token: &str,
    timeout_ms: u64,
) -> Result<Vec<Record>> {
    let request = HttpRequest::from_url("GET", url, "")?;
    let response = client
        .execute(&request, bearer_token, timeout_ms)
        .await
        .map_err(RowflowError::into_transport)?;

    if !response.is_success() {
        return Err(RowflowError::transport(format!(
            "upstream returned HTTP {}",
            response.status
        )));
    }

    let document: serde_json::Value = serde_json::from_str(&response.body)?;
    let rows = match document {
        serde_json::Value::Object(mut map) => match map.remove(rows_key) {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => {
                return Err(anyhow::anyhow!(
                    "upstream document has no '{}' array",
                    rows_key
                )
                .into());
            }
        },
        _ => return Err(anyhow::anyhow!("upstream document is not a JSON object").into()),
    };

    let records = rows
        .into_iter()
        .map(Record::from_json)
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(records = records.len(), "Fetched upstream rows");
    Ok(records)
}

/// Read a headered CSV file into records.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let records = read_csv_from(file)?;
    tracing::info!(path = %path.display(), records = records.len(), "Read CSV rows");
    Ok(records)
}

/// Read headered CSV from any reader. Cells are typed by [`parse_cell`].
pub fn read_csv_from<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    reader
        .records()
        .map(|row| {
            let row = row?;
            Ok(headers
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name, parse_cell(cell)))
                .collect::<Record>())
        })
        .collect()
}

/// Type a CSV cell: empty → Null, then integer, float, bool, `YYYY-MM-DD` date,
/// falling back to string.
pub fn parse_cell(cell: &str) -> FieldValue {
    if cell.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return FieldValue::Integer(i);
    }
    if let Ok(x) = cell.parse::<f64>() {
        if x.is_finite() {
            return FieldValue::Float(x);
        }
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        _ => {}
    }
    if let Ok(date) = NaiveDate::parse_from_str(cell, DATE_FORMAT) {
        return FieldValue::Date(date);
    }
    FieldValue::String(cell.to_string())
}

/// Parse a date from `YYYY-MM-DD`, RFC 3339, or `YYYY-MM-DD HH:MM:SS[.f]`.
/// Time-of-day is dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Convert `field` in every record to a calendar date.
///
/// Missing and null values are left alone. Any value that cannot be read as a
/// date fails the whole call, naming each offending row as `"{index}.{field}"`.
pub fn normalize_dates(records: Vec<Record>, field: &str) -> Result<Vec<Record>> {
    let mut offending = Vec::new();

    let normalized = records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            let parsed = match record.get(field) {
                None | Some(FieldValue::Null) | Some(FieldValue::Date(_)) => None,
                Some(FieldValue::String(raw)) => match parse_date(raw) {
                    Some(date) => Some(date),
                    None => {
                        offending.push(format!("{}.{}", index, field));
                        None
                    }
                },
                Some(_) => {
                    offending.push(format!("{}.{}", index, field));
                    None
                }
            };
            if let Some(date) = parsed {
                record.replace(field, FieldValue::Date(date));
            }
            record
        })
        .collect();

    if offending.is_empty() {
        Ok(normalized)
    } else {
        Err(RowflowError::missing_fields(offending))
    }
}
