mod client;
mod config;
mod errors;
mod fetch;
mod metrics;
mod model;
mod oauth;
mod parser;
mod rest;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use client::UpstreamClient;
use config::Config;
use fetch::SensorFetcher;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    config::report_dotenv(dotenv);
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting sensor gateway");
    info!("Upstream: {}", config.base_url);
    info!("HTTP server: {}", config.http_addr);
    info!("Root endpoint: {:?}", config.root_endpoint);
    info!("Fan-out workers: {}", config.fanout_workers);

    metrics::init_metrics().context("Failed to register metrics")?;

    let client = UpstreamClient::new(&config.base_url, config.credentials.clone())
        .context("Failed to build upstream client")?;
    let fetcher = SensorFetcher::new(client, config.fanout_workers);

    // Build HTTP app with sensor routes and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(fetcher, config.root_endpoint));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
