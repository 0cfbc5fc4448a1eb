use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref UPSTREAM_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_upstream_requests_total",
        "Total requests sent to the upstream sensor API"
    ))
    .unwrap();
    pub static ref UPSTREAM_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_upstream_failures_total",
        "Upstream requests that failed in transport or returned a non-success status"
    ))
    .unwrap();
    pub static ref UPSTREAM_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "gateway_upstream_latency_seconds",
            "Time taken by a single upstream request"
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    )
    .unwrap();
    pub static ref PARSER_FALLBACKS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_parser_fallbacks_total",
        "Sensor payloads replaced by a default record"
    ))
    .unwrap();
    pub static ref HISTORY_ERRORS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_history_errors_total",
        "History lookups answered with the error envelope"
    ))
    .unwrap();
    pub static ref FANOUT_SIZE: Gauge = Gauge::with_opts(Opts::new(
        "gateway_fanout_size",
        "Number of sensors in the most recent detail fan-out"
    ))
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    register_all(&REGISTRY)
}

fn register_all(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(UPSTREAM_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(UPSTREAM_LATENCY_SECONDS.clone()))?;
    registry.register(Box::new(PARSER_FALLBACKS_TOTAL.clone()))?;
    registry.register(Box::new(HISTORY_ERRORS_TOTAL.clone()))?;
    registry.register(Box::new(FANOUT_SIZE.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> prometheus::Result<String> {
    encode(&REGISTRY)
}

fn encode(registry: &Registry) -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
