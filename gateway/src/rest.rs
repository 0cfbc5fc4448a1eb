use crate::config::RootEndpoint;
use crate::errors::Error;
use crate::fetch::SensorFetcher;
use crate::model::{
    HealthResponse, HistoryResponse, InfoResponse, ListMode, SensorListing, SensorRecord,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

#[derive(Clone)]
struct AppState {
    fetcher: SensorFetcher,
    root_endpoint: RootEndpoint,
}

/// `raw` selects upstream epoch timestamps (the default) or local times
#[derive(Debug, Deserialize)]
pub struct TimestampQuery {
    raw: Option<bool>,
}

impl TimestampQuery {
    fn raw_mode(&self) -> bool {
        self.raw.unwrap_or(true)
    }
}

pub fn create_router(fetcher: SensorFetcher, root_endpoint: RootEndpoint) -> Router {
    let state = AppState {
        fetcher,
        root_endpoint,
    };

    Router::new()
        .route("/", get(root))
        .route("/healthcheck", get(healthcheck))
        .route("/sensorlist", get(get_sensor_list))
        .route("/sensors", get(get_sensors))
        .route("/sensor/info/:id", get(get_sensor_info))
        .route("/sensor/history/:id", get(get_sensor_history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.root_endpoint {
        RootEndpoint::Info => Ok(Json(InfoResponse {
            info: "Unspecified endpoint",
        })
        .into_response()),
        RootEndpoint::SensorList => {
            Ok(Json(state.fetcher.list(ListMode::Summary).await?).into_response())
        }
    }
}

async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

async fn get_sensor_list(State(state): State<AppState>) -> Result<Json<SensorListing>, AppError> {
    Ok(Json(state.fetcher.list(ListMode::Summary).await?))
}

async fn get_sensors(
    State(state): State<AppState>,
    Query(params): Query<TimestampQuery>,
) -> Result<Json<SensorListing>, AppError> {
    let mode = ListMode::Detail {
        raw_mode: params.raw_mode(),
    };
    Ok(Json(state.fetcher.list(mode).await?))
}

async fn get_sensor_info(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<TimestampQuery>,
) -> Result<Json<SensorRecord>, AppError> {
    Ok(Json(state.fetcher.sensor(id, params.raw_mode()).await?))
}

async fn get_sensor_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        sensor_id: id,
        result: state.fetcher.history(id).await,
    })
}

struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        let status = if self.0.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
