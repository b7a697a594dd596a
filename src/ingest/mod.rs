/// data.go.kr API clients.
///
/// Both AirKorea and KMA publish through the same gateway and wrap their
/// items in the same `response.header` / `response.body.items` envelope.
/// This module owns the shared request and envelope handling.
///
/// Submodules:
/// - `airkorea`: particulate-matter measurements, statistics and advisories.
/// - `kma`: ultra-short-range weather forecasts.

pub mod airkorea;
pub mod kma;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::logging::{self, DataSource};
use crate::model::RawRecord;

/// Result code data.go.kr uses for a successful call.
const RESULT_OK: &str = "00";

/// Longest body excerpt kept in a parse error.
const MAX_EXCERPT: usize = 200;

/// Both agencies publish dates and hours in Korea Standard Time (UTC+9).
const KST_OFFSET_SECS: i32 = 9 * 3600;

pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time in KST.
pub fn now_kst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&kst())
}

// ============================================================================
// Envelope Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    response: EnvelopeResponse,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    header: Option<EnvelopeHeader>,
    body: Option<EnvelopeBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeHeader {
    result_code: String,
    result_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    #[serde(default)]
    items: Value,
    /// Number or numeric string depending on the service.
    #[serde(default, rename = "totalCount")]
    total_count: Option<Value>,
}

/// One page of items plus the total the service reports for the query.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub total_count: Option<u64>,
}

impl Page {
    /// True when the service holds more items than this page carries.
    pub fn is_truncated(&self) -> bool {
        self.total_count
            .is_some_and(|total| total > self.records.len() as u64)
    }
}

// ============================================================================
// Request helpers
// ============================================================================

/// Builds a GET request against `base_url/path`. The service key goes
/// through the query encoder, so configure the *decoded* key.
pub fn build_request(
    client: &Client,
    base_url: &str,
    path: &str,
    service_key: &str,
    params: &[(&str, String)],
) -> RequestBuilder {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    client
        .get(url)
        .header("Accept", "application/json")
        .query(&[("serviceKey", service_key)])
        .query(params)
}

/// Sends a request and unwraps the envelope into a [`Page`].
///
/// `query` names the request in error messages, e.g. "PM10 hourly".
pub fn fetch_page(request: RequestBuilder, query: &str) -> Result<Page, FetchError> {
    let response = request.send()?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let body = response.text()?;
    let page = parse_page(&body)?;
    if page.records.is_empty() {
        return Err(FetchError::NoData(query.to_string()));
    }
    Ok(page)
}

/// Like [`fetch_page`], for queries that expect every matching item.
///
/// Only the first page is read. A page smaller than `totalCount` is logged
/// as a warning and returned as-is.
pub fn fetch_records(
    request: RequestBuilder,
    source: DataSource,
    query: &str,
) -> Result<Vec<RawRecord>, FetchError> {
    let page = fetch_page(request, query)?;
    if page.is_truncated() {
        logging::warn(
            source,
            None,
            &format!(
                "{} truncated: {} of {} items received, raise the page size",
                query,
                page.records.len(),
                page.total_count.unwrap_or_default()
            ),
        );
    }
    Ok(page.records)
}

// ============================================================================
// Envelope parsing
// ============================================================================

/// Extracts the item objects from a data.go.kr JSON body.
pub fn parse_envelope(body: &str) -> Result<Vec<RawRecord>, FetchError> {
    parse_page(body).map(|page| page.records)
}

/// Extracts the item objects and `totalCount` from a data.go.kr JSON body.
///
/// Accepts `items` as an array, as `{ "item": [...] }` (KMA), as a single
/// `{ "item": {...} }`, or as an empty string (KMA with no data). Non-object
/// items are skipped.
pub fn parse_page(body: &str) -> Result<Page, FetchError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        // Gateway errors (bad key, quota) come back as XML.
        FetchError::Parse(format!("{}; body starts with {:?}", e, excerpt(body)))
    })?;

    if let Some(header) = envelope.response.header {
        if header.result_code != RESULT_OK {
            return Err(FetchError::Api {
                code: header.result_code,
                message: header.result_msg.unwrap_or_default(),
            });
        }
    }

    let body = envelope
        .response
        .body
        .ok_or_else(|| FetchError::Parse("envelope has no response.body".to_string()))?;

    let items = match body.items {
        Value::Object(mut wrapper) => wrapper.remove("item").unwrap_or(Value::Null),
        other => other,
    };

    let records = match items {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        Value::Null | Value::String(_) => Vec::new(),
        other => return Err(FetchError::Parse(format!("unexpected items value: {}", other))),
    };

    let total_count = match body.total_count {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    Ok(Page { records, total_count })
}

fn excerpt(body: &str) -> String {
    body.chars().take(MAX_EXCERPT).collect()
}

// ============================================================================
// Tests
// ============================================================================
