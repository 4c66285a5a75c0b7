//! In-memory [`SeplisApi`] used by tests
//!
//! Responses are routed by path plus query string (parameters sorted by
//! name); anything unrouted answers 404. Every request is recorded.

use crate::error::SourceError;
use crate::traits::{ApiResponse, SeplisApi};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<String, ApiResponse>>,
    requests: Mutex<Vec<String>>,
}

fn route_key(path: &str, query: &[(&str, String)]) -> String {
    let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    pairs.sort();
    if pairs.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, pairs.join("&"))
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `path` + `query` with a 200 and `body`
    pub fn respond(&self, path: &str, query: &[(&str, &str)], body: Value) {
        self.route(path, query, ApiResponse::ok(body));
    }

    /// Answer `path` + `query` with a bare status
    pub fn respond_status(&self, path: &str, query: &[(&str, &str)], status: u16) {
        self.route(path, query, ApiResponse::status(status));
    }

    fn route(&self, path: &str, query: &[(&str, &str)], response: ApiResponse) {
        let owned: Vec<(&str, String)> = query.iter().map(|(k, v)| (*k, v.to_string())).collect();
        self.routes
            .lock()
            .unwrap()
            .insert(route_key(path, &owned), response);
    }

    /// Every request made so far, as `path?sorted-query`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose key starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl SeplisApi for FakeApi {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse, SourceError> {
        let key = route_key(path, query);
        self.requests.lock().unwrap().push(key.clone());
        let response = self.routes.lock().unwrap().get(&key).cloned();
        Ok(response.unwrap_or_else(|| ApiResponse::status(404)))
    }
}
