//! Turns one upstream `sensor/info` payload into a [`SensorRecord`].
//!
//! Upstream payloads are loosely structured. A payload that cannot be decoded
//! or has no usable `name` yields [`SensorRecord::default`]. The temperature
//! and humidity blocks are each read as a unit and dropped when any of their
//! parts is missing or has the wrong shape. Channels are matched by position:
//! `temp` must be the first entry of `data` and `humidity` the second.

use crate::errors::{Error, Result};
use crate::metrics::PARSER_FALLBACKS_TOTAL;
use crate::model::{Reading, SensorRecord, Timestamp};
use serde_json::{Map, Value};
use tracing::debug;

const TEMPERATURE_CHANNEL: (usize, &str) = (0, "temp");
const HUMIDITY_CHANNEL: (usize, &str) = (1, "humidity");

pub fn parse(raw: &[u8], raw_mode: bool) -> Result<SensorRecord> {
    let obj = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(obj)) if !obj.is_empty() => obj,
        Ok(_) => return Ok(fallback("payload is not a populated object")),
        Err(e) => {
            debug!("Undecodable sensor payload: {}", e);
            return Ok(fallback("payload is not valid JSON"));
        }
    };

    // Any non-null name counts; scalars like numeric names are stringified
    let name = match obj.get("name") {
        None | Some(Value::Null) => return Ok(fallback("payload has no name")),
        Some(Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
    };

    let id = obj
        .get("id")
        .and_then(as_integer)
        .ok_or(Error::MissingField("id"))?;

    let data = obj.get("data").and_then(Value::as_array);
    let temperature = data
        .and_then(|d| channel_at(d, TEMPERATURE_CHANNEL))
        .and_then(|c| read_channel(c, as_float, raw_mode));
    let humidity = data
        .and_then(|d| channel_at(d, HUMIDITY_CHANNEL))
        .and_then(|c| read_channel(c, as_integer, raw_mode));

    let timezone_offset = obj
        .get("timezoneoffset")
        .and_then(as_integer)
        .ok_or(Error::MissingField("timezoneoffset"))?;

    Ok(SensorRecord {
        id,
        name: Some(name),
        client_name: string_field(&obj, "clientName"),
        last_updated: time_field(&obj, "lastUpdated", raw_mode),
        temperature,
        humidity,
        timezone_offset: Some(timezone_offset),
    })
}

fn fallback(reason: &str) -> SensorRecord {
    debug!("Using default sensor record: {}", reason);
    PARSER_FALLBACKS_TOTAL.inc();
    SensorRecord::default()
}

/// The channel at `index`, but only if it carries the expected tag
fn channel_at<'a>(data: &'a [Value], (index, tag): (usize, &str)) -> Option<&'a Map<String, Value>> {
    let channel = data.get(index)?.as_object()?;
    (channel.get("name")?.as_str()? == tag).then_some(channel)
}

fn read_channel<T>(
    channel: &Map<String, Value>,
    number: fn(&Value) -> Option<T>,
    raw_mode: bool,
) -> Option<Reading<T>> {
    Some(Reading {
        value: number(channel.get("value")?)?,
        max_value: number(channel.get("max")?)?,
        max_time: time_field(channel, "maxTime", raw_mode)?,
        min_value: number(channel.get("min")?)?,
        min_time: time_field(channel, "minTime", raw_mode)?,
        last_updated: time_field(channel, "lastUpdated", raw_mode),
    })
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn time_field(obj: &Map<String, Value>, key: &str, raw_mode: bool) -> Option<Timestamp> {
    let secs = obj.get(key).and_then(as_integer)?;
    Timestamp::from_epoch(secs, raw_mode)
}

/// Integers arrive as JSON numbers or decimal strings. Floats truncate
/// toward zero; strings must hold a whole number.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
