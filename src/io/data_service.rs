//! Data service client - fetches one dataset snapshot per date
//!
//! Wire format:
//! - request: `POST {"date": "2020-3-15"}` (month and day not zero-padded)
//! - response: `{"date": "2020-3-14", "regionRecords": [...], "facilityRecords": [...]}`
//!
//! The response date is the date actually served; the service substitutes
//! the nearest available date when the requested one has no data. Records
//! carry a join key, an optional date and any number of metric fields. The
//! join key is the first string among `joinKey`, `facility`, `county` and
//! `name`; a record with none of them is skipped rather than failing the
//! whole snapshot.

use crate::domain::snapshot::{CaseRecord, DatasetSnapshot};
use crate::domain::types::{CaseDate, JoinKey, MetricMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("data service returned HTTP {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Source of dataset snapshots (mockable for tests)
#[async_trait]
pub trait DataService: Send + Sync {
    async fn fetch(&self, date: CaseDate) -> Result<DatasetSnapshot, FetchError>;
}

#[derive(Debug, Serialize)]
pub struct DateRequest {
    pub date: CaseDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateResponse {
    pub date: CaseDate,
    #[serde(default, alias = "data")]
    pub region_records: Vec<WireRecord>,
    #[serde(default)]
    pub facility_records: Vec<WireRecord>,
}

/// One record as sent; fields are interpreted after the body is accepted
pub type WireRecord = Map<String, Value>;

/// Fields that can name a record, highest precedence first
///
/// Only the chosen one is the join key; the others stay as descriptive fields.
const JOIN_KEY_FIELDS: [&str; 4] = ["joinKey", "facility", "county", "name"];

/// Placeholder strings the service uses for "no value"
const MISSING_MARKERS: [&str; 6] = ["", "na", "n/a", "nan", "null", "-"];

/// Interpret a wire field as a metric
///
/// Returns `None` when the field is not a metric at all (descriptive text,
/// booleans, nested values), `Some(None)` for a missing value.
fn metric_value(value: &Value) -> Option<Option<f64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => Some(n.as_f64()),
        Value::String(s) => {
            let trimmed = s.trim();
            if MISSING_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m)) {
                return Some(None);
            }
            let digits: String = trimmed.chars().filter(|c| *c != ',').collect();
            match digits.parse::<f64>() {
                Ok(v) if v.is_finite() => Some(Some(v)),
                _ => None,
            }
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// First usable join key field and its value
fn join_key_of(record: &WireRecord) -> Option<(&'static str, &str)> {
    JOIN_KEY_FIELDS.iter().find_map(|&field| match record.get(field) {
        Some(Value::String(key)) if !key.trim().is_empty() => Some((field, key.as_str())),
        _ => None,
    })
}

/// Convert one wire record, or `None` when it has no usable join key
fn into_record(mut record: WireRecord, snapshot_date: CaseDate) -> Option<CaseRecord> {
    let Some((key_field, key)) = join_key_of(&record) else {
        debug!(fields = ?record.keys().collect::<Vec<_>>(), "record_without_join_key");
        return None;
    };
    let join_key = JoinKey::normalize(key);
    record.remove(key_field);

    let date = match record.remove("date") {
        None | Some(Value::Null) => snapshot_date,
        Some(Value::String(raw)) => raw.parse::<CaseDate>().unwrap_or_else(|e| {
            debug!(key = %join_key, error = %e, "record_date_ignored");
            snapshot_date
        }),
        Some(other) => {
            debug!(key = %join_key, value = %other, "record_date_ignored");
            snapshot_date
        }
    };

    let metrics: MetricMap = record
        .iter()
        .filter_map(|(name, value)| metric_value(value).map(|v| (name.clone(), v)))
        .collect();
    Some(CaseRecord { join_key, date, metrics })
}

/// Convert a record list, returning the records kept and the number skipped
fn convert_records(records: Vec<WireRecord>, date: CaseDate) -> (Vec<CaseRecord>, usize) {
    let total = records.len();
    let kept: Vec<CaseRecord> = records.into_iter().filter_map(|r| into_record(r, date)).collect();
    let skipped = total - kept.len();
    (kept, skipped)
}

/// A decoded snapshot plus the records that could not be joined at all
#[derive(Debug)]
pub struct DecodedResponse {
    pub snapshot: DatasetSnapshot,
    pub skipped: usize,
}

impl DateResponse {
    pub fn into_snapshot(self) -> DecodedResponse {
        let date = self.date;
        let (region_records, region_skipped) = convert_records(self.region_records, date);
        let (facility_records, facility_skipped) = convert_records(self.facility_records, date);
        DecodedResponse {
            snapshot: DatasetSnapshot { date, region_records, facility_records },
            skipped: region_skipped + facility_skipped,
        }
    }
}

/// Decode a response body into a snapshot
///
/// Only a malformed body or effective date fails the whole response;
/// records without a join key are dropped and counted.
pub fn decode_response(body: &[u8]) -> Result<DecodedResponse, FetchError> {
    let response: DateResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::InvalidBody(e.to_string()))?;
    let decoded = response.into_snapshot();
    if decoded.skipped > 0 {
        warn!(date = %decoded.snapshot.date, skipped = %decoded.skipped, "records_without_join_key_skipped");
    }
    Ok(decoded)
}

/// HTTP client for the data service endpoint
pub struct HttpDataService {
    client: reqwest::Client,
    url: String,
}

impl HttpDataService {
    /// `timeout` of `None` waits indefinitely
    pub fn new(url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        Self::from_builder(url, timeout, reqwest::Client::builder())
    }

    fn from_builder(
        url: &str,
        timeout: Option<Duration>,
        mut builder: reqwest::ClientBuilder,
    ) -> anyhow::Result<Self> {
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, url: url.to_string() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataService for HttpDataService {
    async fn fetch(&self, date: CaseDate) -> Result<DatasetSnapshot, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .json(&DateRequest { date })
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transport(e.to_string()))?;
        let DecodedResponse { snapshot, skipped } = decode_response(&body)?;

        info!(
            requested = %date,
            served = %snapshot.date,
            records = %snapshot.len(),
            skipped = %skipped,
            latency_ms = %start.elapsed().as_millis(),
            "data_service_fetch"
        );
        Ok(snapshot)
    }
}
