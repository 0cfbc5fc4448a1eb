use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A point in time as reported upstream: either the native epoch seconds or
/// the same instant expressed in the local time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    Raw(i64),
    Local(DateTime<Local>),
}

impl Timestamp {
    /// Returns `None` when `secs` is outside chrono's representable range
    pub fn from_epoch(secs: i64, raw_mode: bool) -> Option<Self> {
        if raw_mode {
            return Some(Timestamp::Raw(secs));
        }
        Local.timestamp_opt(secs, 0).single().map(Timestamp::Local)
    }
}

/// One channel's current value together with its recorded extremes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading<T> {
    pub value: T,
    pub max_value: T,
    pub max_time: Timestamp,
    pub min_value: T,
    pub min_time: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

/// Latest known state of one sensor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Reading<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<Reading<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<i64>,
}

/// Listing entry from `sensors/list`, without readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSummary {
    pub id: i64,
    pub name: Option<String>,
    pub last_update: Option<i64>,
    pub model: Option<String>,
}

/// Either shape `list` can produce
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorListing {
    Summary(Vec<SensorSummary>),
    Detail(Vec<SensorRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Summary,
    Detail { raw_mode: bool },
}

/// Upstream `sensors/list` body
#[derive(Debug, Deserialize)]
pub struct UpstreamSensorList {
    #[serde(default)]
    pub sensor: Vec<UpstreamSensorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamSensorEntry {
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub sensor_id: i64,
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub info: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
