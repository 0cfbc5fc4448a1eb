use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned {status} for {path}")]
    UpstreamStatus {
        path: String,
        status: reqwest::StatusCode,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field in sensor payload: {0}")]
    MissingField(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch task failed: {0}")]
    TaskJoin(String),
}

impl Error {
    /// True for failures caused by the upstream API being unreachable or unhappy
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::UpstreamStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
