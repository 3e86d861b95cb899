use crate::error::{Result, UnisphereError};
use crate::ApiResponse;
use pmx_common::MetricSample;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const HTTP_NO_CONTENT: u16 = 204;
pub const HTTP_PARTIAL_CONTENT: u16 = 206;

/// Field dropped from every record before conversion.
const TIMESTAMP_FIELD: &str = "timestamp";

/// Numeric representations Unisphere may use for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericKind {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl NumericKind {
    pub fn as_f64(self) -> f64 {
        match self {
            NumericKind::Signed(v) => v as f64,
            NumericKind::Unsigned(v) => v as f64,
            NumericKind::Float(v) => v,
        }
    }
}

/// One field of a Unisphere JSON record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(NumericKind),
    Text(String),
    /// Booleans, nulls, nested arrays or objects.
    Other(IgnoredAny),
}

/// A flat JSON object, fields in name order.
pub type Record = BTreeMap<String, FieldValue>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsEnvelope {
    #[serde(default)]
    result_list: ResultList,
    count: u64,
}

/// Records stay undecoded until the latest one is picked.
#[derive(Debug, Default, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

/// Extract the most recent sample from a metrics reply.
///
/// Returns `Ok(None)` when Unisphere has nothing to report: a 204 or 206
/// status, or a `count` of zero. Otherwise the record at `count - 1` is used;
/// its `timestamp` and every non-numeric field are dropped and the remaining
/// values are converted to `f64`.
///
/// # Errors
///
/// [`UnisphereError::HttpStatus`] for any other non-2xx status,
/// [`UnisphereError::Decode`] when the body is not a metrics envelope or the
/// latest record is not a flat object, and
/// [`UnisphereError::UnexpectedShape`] when fewer than `count` records came back.
///
/// # Examples
///
/// ```
/// use pmx_unisphere::extract::extract_latest;
/// use pmx_unisphere::ApiResponse;
///
/// let body = r#"{"resultList":{"result":[{"timestamp":1,"hitRatio":80},{"timestamp":2,"hitRatio":85}]},"count":2}"#;
/// let sample = extract_latest(&ApiResponse::new(200, body)).unwrap().unwrap();
/// assert_eq!(sample.get("hitRatio"), Some(85.0));
/// assert_eq!(sample.len(), 1);
/// ```
pub fn extract_latest(response: &ApiResponse) -> Result<Option<MetricSample>> {
    match response.status {
        HTTP_NO_CONTENT => {
            tracing::debug!("HTTP no content");
            return Ok(None);
        }
        HTTP_PARTIAL_CONTENT => {
            tracing::debug!("HTTP partial content, skipping");
            return Ok(None);
        }
        _ if !response.is_success() => {
            return Err(UnisphereError::http_status(response.status, &response.body));
        }
        _ => {}
    }

    let envelope: MetricsEnvelope =
        serde_json::from_slice(&response.body).map_err(|source| UnisphereError::Decode {
            what: "metrics response",
            source,
        })?;

    if envelope.count == 0 {
        return Ok(None);
    }

    let records = envelope.result_list.result;
    let available = records.len();
    let index = usize::try_from(envelope.count - 1).unwrap_or(usize::MAX);
    let latest = records.into_iter().nth(index).ok_or_else(|| {
        UnisphereError::UnexpectedShape(format!(
            "count is {} but only {available} records were returned",
            envelope.count
        ))
    })?;
    tracing::trace!(count = envelope.count, "Using the latest record");

    let latest: Record = serde_json::from_value(latest).map_err(|source| UnisphereError::Decode {
        what: "latest metrics record",
        source,
    })?;
    Ok(Some(numeric_fields(latest)))
}

fn numeric_fields(record: Record) -> MetricSample {
    record
        .into_iter()
        .filter(|(name, _)| name != TIMESTAMP_FIELD)
        .filter_map(|(name, value)| match value {
            FieldValue::Number(n) => Some((name, n.as_f64())),
            FieldValue::Text(_) | FieldValue::Other(_) => None,
        })
        .collect()
}
