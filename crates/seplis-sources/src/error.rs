use thiserror::Error;

/// Errors raised while talking to the Seplis API
///
/// Lookups translate non-success statuses into "not found" before they get
/// here; `Status` is only produced for fetches a task cannot do without.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Bad task configuration, e.g. an unknown username
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{path} returned HTTP {status}")]
    Status { status: u16, path: String },

    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },

    /// The server broke the paging contract
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl SourceError {
    pub fn decode(path: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
