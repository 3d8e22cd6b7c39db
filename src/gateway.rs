//! The one place that talks to the backend.
//!
//! Every request carries `Content-Type: application/json` (multipart uploads
//! excepted), the bearer token and the tenant header when a session exists.
//! A 401 clears the session and is reported as [`ClientError::SessionExpired`];
//! other failures carry the server's message when it sent one.

use crate::errors::{ClientError, GENERIC_ERROR_MESSAGE, Result};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, RequestBody};
use crate::models::{Session, Upload};
use crate::storage::SessionStore;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const TENANT_HEADER: &str = "X-Customer-ID";

/// Path relative to the API base plus ordered query pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Adds the pair only for a non-empty value.
    pub fn query_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.query(key, value),
            _ => self,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

pub struct ApiGateway {
    base_url: String,
    http: Arc<dyn HttpClient>,
    sessions: SessionStore,
}

impl ApiGateway {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>, sessions: SessionStore) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn call(&self, endpoint: &Endpoint, method: Method, body: Option<&Value>) -> Result<Value> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        headers.extend(self.auth_headers().await);
        let body = match body {
            Some(value) => RequestBody::Json(serde_json::to_vec(value)?),
            None => RequestBody::Empty,
        };

        self.dispatch(endpoint, method, headers, body).await
    }

    pub async fn upload(&self, endpoint: &Endpoint, file: Upload, category: Option<&str>) -> Result<Value> {
        let headers = self.auth_headers().await;
        let body = RequestBody::Multipart {
            file,
            category: category.map(str::to_string),
        };

        self.dispatch(endpoint, Method::Post, headers, body).await
    }

    async fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(Session { token, tenant_id, .. }) = self.sessions.current().await {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            if let Some(tenant_id) = tenant_id {
                headers.push((TENANT_HEADER.to_string(), tenant_id));
            }
        }
        headers
    }

    async fn dispatch(
        &self,
        endpoint: &Endpoint,
        method: Method,
        headers: Vec<(String, String)>,
        body: RequestBody,
    ) -> Result<Value> {
        let url = self.url(endpoint)?;
        debug!("{method} {url}");
        let response = self
            .http
            .send(HttpRequest {
                method,
                url: url.to_string(),
                headers,
                body,
            })
            .await?;

        self.normalize(endpoint, response).await
    }

    async fn normalize(&self, endpoint: &Endpoint, response: HttpResponse) -> Result<Value> {
        if response.status == 401 {
            warn!("session rejected on {}", endpoint.path);
            self.sessions.clear().await;
            return Err(ClientError::SessionExpired);
        }

        let payload = serde_json::from_slice::<Value>(&response.body).unwrap_or(Value::Null);
        if response.is_success() {
            return Ok(payload);
        }

        let message = error_message(&payload).unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
        Err(ClientError::Api {
            status: response.status,
            message,
        })
    }

    fn url(&self, endpoint: &Endpoint) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, endpoint.path);
        let mut url = Url::parse(&raw).map_err(|err| ClientError::invalid(format!("bad url {raw}: {err}")))?;
        if !endpoint.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &endpoint.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

fn error_message(payload: &Value) -> Option<String> {
    ["detail", "message"]
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            error_message(&json!({ "detail": "License expired", "message": "other" })).as_deref(),
            Some("License expired")
        );
        assert_eq!(error_message(&json!({ "message": "Bad input" })).as_deref(), Some("Bad input"));
        assert_eq!(error_message(&json!({ "detail": [{ "loc": "x" }] })), None);
        assert_eq!(error_message(&Value::Null), None);
    }

    #[test]
    fn endpoint_skips_empty_optional_pairs() {
        let endpoint = Endpoint::new("/customers")
            .query_opt("license_type", Some(""))
            .query_opt("license_status", None)
            .query_opt("search", Some("köy derneği"));
        assert_eq!(endpoint.query, vec![("search".to_string(), "köy derneği".to_string())]);
    }
}
