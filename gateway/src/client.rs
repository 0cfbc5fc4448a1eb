use crate::config::Credentials;
use crate::errors::{Error, Result};
use crate::metrics::{UPSTREAM_FAILURES_TOTAL, UPSTREAM_LATENCY_SECONDS, UPSTREAM_REQUESTS_TOTAL};
use crate::oauth;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Signed GET access to the upstream sensor API.
///
/// Cheap to clone; clones share the connection pool and credentials.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<Credentials>,
}

impl UpstreamClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        // Url::join replaces the last segment unless the base ends with '/'
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| Error::Config(format!("invalid upstream URL '{}': {}", base_url, e)))?;

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url,
            credentials: Arc::new(credentials),
        })
    }

    /// GETs `path` (relative to the base URL) and returns the response body.
    ///
    /// Fails on transport errors and on any non-success status.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("invalid upstream path '{}': {}", path, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let authorization =
            oauth::authorization_header(&self.credentials, "GET", &url, &nonce, Utc::now().timestamp());

        debug!("GET {}", url);
        UPSTREAM_REQUESTS_TOTAL.inc();
        let start = Instant::now();

        let result = self.send(url, authorization, path).await;

        UPSTREAM_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            UPSTREAM_FAILURES_TOTAL.inc();
            warn!("Upstream request for {} failed: {}", path, e);
        }
        result
    }

    async fn send(&self, url: Url, authorization: String, path: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                path: path.to_string(),
                status,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
