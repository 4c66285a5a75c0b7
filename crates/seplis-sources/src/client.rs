use crate::error::SourceError;
use crate::traits::{ApiResponse, SeplisApi};
use async_trait::async_trait;
use reqwest::Client;
use seplis_config::ApiConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Shared HTTP client for the Seplis API
#[derive(Clone)]
pub struct SeplisClient {
    client: Arc<Client>,
    base_url: String,
    access_token: Option<String>,
}

impl SeplisClient {
    pub fn new(config: &ApiConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("seplis-tasks/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SeplisApi for SeplisClient {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse, SourceError> {
        trace!(path = path, query = ?query, "GET");

        let mut request = self
            .client
            .get(self.url(path))
            .query(query)
            .header("Accept", "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(path = path, status = status.as_u16(), "Request was not successful: {}", error_text);
            return Ok(ApiResponse::status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::decode(path, e.to_string()))?;

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let config = ApiConfig {
            base_url: "https://api.example.test/".to_string(),
            ..ApiConfig::default()
        };
        let client = SeplisClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://api.example.test");
        assert_eq!(client.url("/2/movies/1"), "https://api.example.test/2/movies/1");
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let config = ApiConfig {
            access_token: Some(String::new()),
            ..ApiConfig::default()
        };
        let client = SeplisClient::new(&config).unwrap();
        assert!(client.access_token.is_none());
    }
}
