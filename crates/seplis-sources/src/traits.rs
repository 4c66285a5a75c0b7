use crate::error::SourceError;
use async_trait::async_trait;
use serde_json::Value;

/// Status and decoded body of a GET request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body; `Null` for non-success responses
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: Value::Null }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a successful response, `None` otherwise
    pub fn into_success(self) -> Option<Value> {
        if self.is_success() {
            Some(self.body)
        } else {
            None
        }
    }

    /// Body of a response the caller cannot do without
    pub fn require(self, path: &str) -> Result<Value, SourceError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(SourceError::Status {
                status: self.status,
                path: path.to_string(),
            })
        }
    }
}

/// Read-only access to the Seplis API
///
/// Every call blocks the calling task until the response (or a transport
/// error) is available. Non-success statuses are returned, not raised, so
/// callers decide whether a miss is fatal.
#[async_trait]
pub trait SeplisApi: Send + Sync {
    /// GET `path` (relative to the API host, e.g. `/2/movies/1`) with query parameters
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse, SourceError>;
}
