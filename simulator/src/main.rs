mod sensors;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Simulator CLI arguments
#[derive(Debug, Parser)]
#[clap(name = "simulator", version, about = "Local stand-in for the upstream sensor API")]
struct Args {
    /// Listen address
    #[clap(long, env = "SIM_ADDR", default_value = "127.0.0.1:9090")]
    addr: String,

    /// Number of simulated sensors
    #[clap(long, env = "DEVICES", default_value_t = 12)]
    devices: usize,

    /// Seed for reproducible readings
    #[clap(long, env = "SIM_SEED")]
    seed: Option<u64>,
}

#[derive(Clone)]
struct AppState {
    devices: usize,
    rng: Arc<Mutex<StdRng>>,
}

#[derive(Debug, Deserialize)]
struct SensorQuery {
    id: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting upstream simulator");
    info!("Address: {}, Devices: {}", args.addr, args.devices);

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let state = AppState {
        devices: args.devices,
        rng: Arc::new(Mutex::new(rng)),
    };

    let app = Router::new()
        .route("/json/sensors/list", get(sensor_list))
        .route("/json/sensor/info", get(sensor_info))
        .route("/json/sensor/history", get(sensor_history))
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(&args.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", args.addr, e);
            std::process::exit(1);
        }
    };

    info!("Simulator listening on {}", args.addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Simulator server error: {}", e);
    }
}

/// Upstream only answers OAuth-signed requests
fn reject_unsigned(headers: &HeaderMap) -> Option<Response> {
    let signed = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("OAuth "));
    if signed {
        return None;
    }
    warn!("Rejecting unsigned request");
    Some(
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing OAuth authorization" })),
        )
            .into_response(),
    )
}

fn not_found(id: usize) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Sensor {} not found", id) })),
    )
        .into_response()
}

async fn sensor_list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(rejection) = reject_unsigned(&headers) {
        return rejection;
    }
    debug!("sensors/list");
    Json(sensors::sensor_list(state.devices, Utc::now().timestamp())).into_response()
}

async fn sensor_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SensorQuery>,
) -> Response {
    if let Some(rejection) = reject_unsigned(&headers) {
        return rejection;
    }
    debug!("sensor/info id={}", query.id);

    let info = {
        let mut rng = match state.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        sensors::sensor_info(query.id, state.devices, &mut *rng, Utc::now().timestamp())
    };

    match info {
        Some(body) => Json(body).into_response(),
        None => not_found(query.id),
    }
}

async fn sensor_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SensorQuery>,
) -> Response {
    if let Some(rejection) = reject_unsigned(&headers) {
        return rejection;
    }
    debug!("sensor/history id={}", query.id);

    if query.id == 0 || query.id > state.devices {
        return not_found(query.id);
    }

    let history = {
        let mut rng = match state.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        sensors::sensor_history(query.id, &mut *rng, Utc::now().timestamp())
    };

    Json(history).into_response()
}
