use rand::Rng;
use serde_json::{json, Value};

const HISTORY_POINTS: i64 = 24;
const HISTORY_STEP_SECS: i64 = 3600;

/// Sensors whose only channel is humidity, reported at index 0
pub fn is_humidity_only(id: usize) -> bool {
    id % 7 == 3
}

/// Sensors that report `"name": null`
pub fn is_nameless(id: usize) -> bool {
    id % 11 == 5
}

fn name(id: usize) -> Value {
    if is_nameless(id) {
        Value::Null
    } else {
        json!(format!("Sensor {}", id))
    }
}

fn model(id: usize) -> &'static str {
    if is_humidity_only(id) {
        "humidity"
    } else {
        "temperaturehumidity"
    }
}

/// Body of `sensors/list` for sensors `1..=devices`
pub fn sensor_list(devices: usize, now: i64) -> Value {
    let sensors: Vec<Value> = (1..=devices)
        .map(|id| {
            json!({
                "id": id.to_string(),
                "name": name(id),
                "lastUpdated": now - id as i64,
                "model": model(id),
                "protocol": "fineoffset",
                "sensorId": (100 + id).to_string(),
                "ignored": 0,
                "online": "1",
                "editable": 1,
                "battery": 254,
                "keepHistory": "1"
            })
        })
        .collect();

    json!({ "sensor": sensors })
}

fn temperature(rng: &mut impl Rng, now: i64) -> Value {
    let value: f64 = rng.gen_range(15.0..30.0);
    json!({
        "name": "temp",
        "value": format!("{:.1}", value),
        "scale": "0",
        "lastUpdated": now,
        "max": format!("{:.1}", value + rng.gen_range(0.0..5.0)),
        "maxTime": now - rng.gen_range(60..86_400),
        "min": format!("{:.1}", value - rng.gen_range(0.0..5.0)),
        "minTime": now - rng.gen_range(60..86_400)
    })
}

fn humidity(rng: &mut impl Rng, now: i64) -> Value {
    let value: i64 = rng.gen_range(30..80);
    json!({
        "name": "humidity",
        "value": value.to_string(),
        "scale": "0",
        "lastUpdated": now,
        "max": (value + rng.gen_range(0..15)).to_string(),
        "maxTime": now - rng.gen_range(60..86_400),
        "min": (value - rng.gen_range(0..15)).to_string(),
        "minTime": now - rng.gen_range(60..86_400)
    })
}

/// Body of `sensor/info?id=..`, or `None` for unknown ids
pub fn sensor_info(id: usize, devices: usize, rng: &mut impl Rng, now: i64) -> Option<Value> {
    if id == 0 || id > devices {
        return None;
    }

    let data = if is_humidity_only(id) {
        vec![humidity(rng, now)]
    } else {
        vec![temperature(rng, now), humidity(rng, now)]
    };

    Some(json!({
        "id": id.to_string(),
        "clientName": "Simulated Home",
        "name": name(id),
        "lastUpdated": now - id as i64,
        "ignored": 0,
        "editable": 1,
        "data": data,
        "protocol": "fineoffset",
        "sensorId": (100 + id).to_string(),
        "timezoneoffset": 3600,
        "battery": 254,
        "keepHistory": "1"
    }))
}

/// Body of `sensor/history?id=..`: hourly points for the last day
pub fn sensor_history(id: usize, rng: &mut impl Rng, now: i64) -> Value {
    let history: Vec<Value> = (0..HISTORY_POINTS)
        .rev()
        .map(|step| {
            let ts = now - step * HISTORY_STEP_SECS;
            let mut data = vec![json!({
                "name": "humidity",
                "value": rng.gen_range(30..80).to_string(),
                "scale": 0
            })];
            if !is_humidity_only(id) {
                data.insert(
                    0,
                    json!({
                        "name": "temp",
                        "value": format!("{:.1}", rng.gen_range(15.0..30.0)),
                        "scale": 0
                    }),
                );
            }
            json!({ "ts": ts, "data": data })
        })
        .collect();

    json!({ "history": history })
}
