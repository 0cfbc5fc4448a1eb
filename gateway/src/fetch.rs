use crate::client::UpstreamClient;
use crate::errors::{Error, Result};
use crate::metrics::{FANOUT_SIZE, HISTORY_ERRORS_TOTAL};
use crate::model::{ListMode, SensorListing, SensorRecord, SensorSummary, UpstreamSensorList};
use crate::parser::{self, as_integer};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub const HISTORY_ERROR_MESSAGE: &str = "Error while fetching data.";

const SENSOR_LIST_PATH: &str = "sensors/list";
const SENSOR_INFO_PATH: &str = "sensor/info";
const SENSOR_HISTORY_PATH: &str = "sensor/history";

#[derive(Clone)]
pub struct SensorFetcher {
    client: UpstreamClient,
    workers: usize,
}

impl SensorFetcher {
    pub fn new(client: UpstreamClient, workers: usize) -> Self {
        Self {
            client,
            workers: workers.max(1),
        }
    }

    pub async fn list(&self, mode: ListMode) -> Result<SensorListing> {
        match mode {
            ListMode::Summary => Ok(SensorListing::Summary(self.list_summaries().await?)),
            ListMode::Detail { raw_mode } => {
                Ok(SensorListing::Detail(self.list_details(raw_mode).await?))
            }
        }
    }

    /// Sensor listing in upstream order, without per-sensor requests
    pub async fn list_summaries(&self) -> Result<Vec<SensorSummary>> {
        let list = self.fetch_list().await?;

        list.sensor
            .into_iter()
            .map(|entry| -> Result<SensorSummary> {
                Ok(SensorSummary {
                    id: as_integer(&entry.id).ok_or(Error::MissingField("id"))?,
                    name: entry.name,
                    last_update: entry.last_updated.as_ref().and_then(as_integer),
                    model: entry.model,
                })
            })
            .collect()
    }

    /// Fetches and parses every listed sensor concurrently.
    ///
    /// At most `workers` detail requests are in flight at once. Records come
    /// back in completion order. The first failing sensor fails the whole
    /// call and aborts the fetches still running.
    pub async fn list_details(&self, raw_mode: bool) -> Result<Vec<SensorRecord>> {
        let list = self.fetch_list().await?;
        let ids = list
            .sensor
            .iter()
            .map(|entry| as_integer(&entry.id).ok_or(Error::MissingField("id")))
            .collect::<Result<Vec<i64>>>()?;

        FANOUT_SIZE.set(ids.len() as f64);
        debug!("Fanning out {} detail fetches over {} workers", ids.len(), self.workers);

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        for id in ids {
            let client = self.client.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::TaskJoin(e.to_string()))?;
                fetch_sensor(&client, id, raw_mode).await
            });
        }

        let mut records = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(e)) => {
                    error!("Sensor detail fetch failed, abandoning batch: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Sensor detail task failed: {}", e);
                    return Err(Error::TaskJoin(e.to_string()));
                }
            }
        }

        info!("Fetched {} sensor records", records.len());
        Ok(records)
    }

    pub async fn sensor(&self, id: i64, raw_mode: bool) -> Result<SensorRecord> {
        fetch_sensor(&self.client, id, raw_mode).await
    }

    /// Upstream history for `id`, passed through untouched. Any failure is
    /// replaced by `{"error": "Error while fetching data."}`.
    pub async fn history(&self, id: i64) -> Value {
        match self.fetch_history(id).await {
            Ok(history) => history,
            Err(e) => {
                warn!("History for sensor {} unavailable: {}", id, e);
                HISTORY_ERRORS_TOTAL.inc();
                json!({ "error": HISTORY_ERROR_MESSAGE })
            }
        }
    }

    async fn fetch_history(&self, id: i64) -> Result<Value> {
        let body = self
            .client
            .get(SENSOR_HISTORY_PATH, &[("id", id.to_string())])
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_list(&self) -> Result<UpstreamSensorList> {
        let body = self.client.get(SENSOR_LIST_PATH, &[]).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn fetch_sensor(client: &UpstreamClient, id: i64, raw_mode: bool) -> Result<SensorRecord> {
    let body = client
        .get(SENSOR_INFO_PATH, &[("id", id.to_string())])
        .await?;
    parser::parse(&body, raw_mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timestamp;
    use crate::test_support::{spawn_upstream, test_credentials};
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Upstream {
        ids: Vec<i64>,
        failing: Vec<i64>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    async fn sensors_list(State(upstream): State<Upstream>) -> Json<Value> {
        let sensors: Vec<Value> = upstream
            .ids
            .iter()
            .map(|id| {
                json!({"id": id.to_string(), "name": format!("Sensor {}", id),
                       "lastUpdated": 1000 + id, "model": "temperaturehumidity"})
            })
            .collect();
        Json(json!({ "sensor": sensors }))
    }

    async fn sensor_info(
        State(upstream): State<Upstream>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        let id: i64 = params["id"].parse().unwrap();

        let now = upstream.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        upstream.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Later ids answer first so completion order differs from request order
        let delay = 10 * (upstream.ids.len() as u64 + 1).saturating_sub(id as u64);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        upstream.in_flight.fetch_sub(1, Ordering::SeqCst);

        if upstream.failing.contains(&id) {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        if id == 1 {
            return Json(json!({
                "id": 1, "name": "Kitchen", "clientName": "C1", "lastUpdated": 1000,
                "data": [{"name": "temp", "value": "21.5", "max": "25", "min": "18",
                          "maxTime": 1001, "minTime": 1002}],
                "timezoneoffset": 3600
            }))
            .into_response();
        }
        if id == 99 {
            return Json(json!({"id": 99, "name": null})).into_response();
        }
        Json(json!({
            "id": id.to_string(), "name": format!("Sensor {}", id), "clientName": "C1",
            "lastUpdated": 2000, "data": [], "timezoneoffset": 0
        }))
        .into_response()
    }

    async fn sensor_history(Query(params): Query<HashMap<String, String>>) -> Response {
        match params.get("id").map(String::as_str) {
            Some("1") => Json(json!({"history": [{"ts": 1000, "data": [{"name": "temp", "value": "20.1"}]}]}))
                .into_response(),
            Some("2") => "<html>not json</html>".into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn fetcher(upstream: Upstream, workers: usize) -> SensorFetcher {
        let router = Router::new()
            .route("/json/sensors/list", get(sensors_list))
            .route("/json/sensor/info", get(sensor_info))
            .route("/json/sensor/history", get(sensor_history))
            .with_state(upstream);
        let base_url = spawn_upstream(router).await;
        SensorFetcher::new(UpstreamClient::new(&base_url, test_credentials()).unwrap(), workers)
    }

    #[tokio::test]
    async fn test_summaries_keep_upstream_order() {
        let upstream = Upstream {
            ids: vec![3, 1, 2],
            ..Default::default()
        };
        let summaries = fetcher(upstream, 4).await.list_summaries().await.unwrap();

        let ids: Vec<i64> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(summaries[0].name.as_deref(), Some("Sensor 3"));
        assert_eq!(summaries[0].last_update, Some(1003));
        assert_eq!(summaries[0].model.as_deref(), Some("temperaturehumidity"));
    }

    #[tokio::test]
    async fn test_details_preserve_cardinality() {
        let upstream = Upstream {
            ids: (1..=6).collect(),
            ..Default::default()
        };
        let mut records = fetcher(upstream, 8).await.list_details(true).await.unwrap();

        assert_eq!(records.len(), 6);
        records.sort_by_key(|r| r.id);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=6).collect::<Vec<_>>());

        let kitchen = &records[0];
        assert_eq!(kitchen.name.as_deref(), Some("Kitchen"));
        assert_eq!(kitchen.temperature.as_ref().unwrap().value, 21.5);
        assert_eq!(kitchen.last_updated, Some(Timestamp::Raw(1000)));
    }

    #[tokio::test]
    async fn test_nameless_sensor_still_yields_record() {
        let upstream = Upstream {
            ids: vec![1, 99],
            ..Default::default()
        };
        let records = fetcher(upstream, 2).await.list_details(true).await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.contains(&SensorRecord::default()));
    }

    #[tokio::test]
    async fn test_fanout_respects_worker_bound() {
        let upstream = Upstream {
            ids: (1..=6).collect(),
            ..Default::default()
        };
        let max_in_flight = upstream.max_in_flight.clone();
        let records = fetcher(upstream, 2).await.list_details(true).await.unwrap();

        assert_eq!(records.len(), 6);
        assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failing_sensor_fails_batch() {
        let upstream = Upstream {
            ids: vec![1, 2],
            failing: vec![2],
            ..Default::default()
        };
        let err = fetcher(upstream, 2).await.list_details(true).await.unwrap_err();

        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_list_dispatches_on_mode() {
        let upstream = Upstream {
            ids: vec![1, 2],
            ..Default::default()
        };
        let fetcher = fetcher(upstream, 2).await;

        match fetcher.list(ListMode::Summary).await.unwrap() {
            SensorListing::Summary(summaries) => assert_eq!(summaries.len(), 2),
            other => panic!("expected summaries, got {:?}", other),
        }
        match fetcher.list(ListMode::Detail { raw_mode: false }).await.unwrap() {
            SensorListing::Detail(records) => {
                assert_eq!(records.len(), 2);
                assert!(records
                    .iter()
                    .all(|r| matches!(r.last_updated, Some(Timestamp::Local(_)))));
            }
            other => panic!("expected records, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_sensor() {
        let record = fetcher(Upstream::default(), 1)
            .await
            .sensor(1, true)
            .await
            .unwrap();

        assert_eq!(record.id, 1);
        assert_eq!(record.client_name.as_deref(), Some("C1"));
        assert_eq!(record.timezone_offset, Some(3600));
    }

    #[tokio::test]
    async fn test_history_passthrough() {
        let history = fetcher(Upstream::default(), 1).await.history(1).await;

        assert_eq!(
            history,
            json!({"history": [{"ts": 1000, "data": [{"name": "temp", "value": "20.1"}]}]})
        );
    }

    #[tokio::test]
    async fn test_history_errors_become_envelope() {
        let fetcher = fetcher(Upstream::default(), 1).await;
        let envelope = json!({"error": "Error while fetching data."});

        // Undecodable body, then a non-success status
        assert_eq!(fetcher.history(2).await, envelope);
        assert_eq!(fetcher.history(3).await, envelope);
    }

    #[test]
    fn test_history_unreachable_upstream() {
        tokio_test::block_on(async {
            let client = UpstreamClient::new("http://127.0.0.1:9/json", test_credentials()).unwrap();
            let history = SensorFetcher::new(client, 1).history(5).await;

            assert_eq!(history, json!({"error": HISTORY_ERROR_MESSAGE}));
        });
    }
}
