use crate::errors::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.telldus.com/json";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// The four long-lived OAuth1 values used to sign every upstream request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"***")
            .field("consumer_secret", &"***")
            .field("token", &"***")
            .field("token_secret", &"***")
            .finish()
    }
}

/// What `GET /` answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootEndpoint {
    Info,
    SensorList,
}

impl FromStr for RootEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(RootEndpoint::Info),
            "sensorlist" | "list" => Ok(RootEndpoint::SensorList),
            other => Err(Error::Config(format!("unknown ROOT_ENDPOINT '{}'", other))),
        }
    }
}

/// Logs the outcome of loading a `.env` file.
///
/// Loading happens before logging is initialised (the file may set
/// `RUST_LOG`), so the result is reported afterwards. A missing file is
/// not an error.
pub fn report_dotenv(result: dotenvy::Result<PathBuf>) -> Option<PathBuf> {
    match result {
        Ok(path) => {
            info!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => {
            debug!("No .env file found, using process environment only");
            None
        }
        Err(e) => {
            warn!("Failed to load .env file: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: String,
    pub http_addr: String,
    pub root_endpoint: RootEndpoint,
    pub fanout_workers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        let credentials = Credentials {
            consumer_key: required("TELLDUS_OAUTH1_SESSION")?,
            consumer_secret: required("TELLDUS_CLIENT_SECRET")?,
            token: required("TELLDUS_RESOURCE_OWNER_KEY")?,
            token_secret: required("TELLDUS_RESOURCE_OWNER_SECRET")?,
        };

        let base_url = lookup("UPSTREAM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let http_addr = lookup("HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());

        let root_endpoint = match lookup("ROOT_ENDPOINT") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to info", e);
                RootEndpoint::Info
            }),
            None => RootEndpoint::Info,
        };

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let fanout_workers = match lookup("FANOUT_WORKERS") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(
                        "Invalid FANOUT_WORKERS '{}', using {}",
                        raw, default_workers
                    );
                    default_workers
                }
            },
            None => default_workers,
        };

        Ok(Config {
            credentials,
            base_url,
            http_addr,
            root_endpoint,
            fanout_workers,
        })
    }
}
