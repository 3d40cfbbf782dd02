//! REST client for the planning backend.
//!
//! Wraps the JSON endpoints of the HR backend (month data, assignment,
//! batch update, administrative month operations) using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use gardes_core::batch::{
    AssignRequest, BatchChange, BatchRequest, BatchResponse, GenerateRequest,
};
use gardes_core::models::MonthData;
use gardes_core::types::{DbId, ShiftId};
use gardes_core::MonthKey;
use reqwest::{Method, RequestBuilder, StatusCode};

use crate::backend::{AdminOperation, BackendError, PlanningBackend};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for one planning backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
}

impl HttpBackend {
    /// Create a client for `api_url`, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(api_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    fn request(&self, method: Method, path: &str) -> (RequestBuilder, String) {
        let request_id = uuid::Uuid::now_v7().to_string();
        let builder = self
            .client
            .request(method, format!("{}{path}", self.api_url))
            .header(REQUEST_ID_HEADER, &request_id);
        (builder, request_id)
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl serde::Serialize + Sync)>,
    ) -> Result<T, BackendError> {
        let (mut builder, request_id) = self.request(method.clone(), path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%method, path, request_id = %request_id, error = %e, "Planning API unreachable");
            BackendError::from(e)
        })?;

        let status = response.status();
        tracing::debug!(%method, path, request_id = %request_id, status = status.as_u16(), "Planning API response");

        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            // Some write endpoints answer 204 / empty 200.
            return serde_json::from_str("{}")
                .or_else(|_| serde_json::from_str("null"))
                .map_err(|e| BackendError::Decode(e.to_string()));
        }
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Ensure the response has a success status code.
    ///
    /// 400, 409 and 422 are business-rule rejections; any other failure
    /// status is reported with its raw body.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            return Err(BackendError::Validation {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Err(BackendError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// Pull the human-readable reason out of an `{"error": ...}` body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl PlanningBackend for HttpBackend {
    /// `GET /planning/months/{year}/{month}`
    async fn month_data(&self, month: MonthKey) -> Result<MonthData, BackendError> {
        let path = format!("/planning/months/{}/{}", month.year(), month.month());
        self.send_json(Method::GET, &path, None::<&()>).await
    }

    /// `POST /planning/gardes/{id}/assign`
    async fn assign(
        &self,
        shift_id: ShiftId,
        worker_id: Option<DbId>,
    ) -> Result<BatchResponse, BackendError> {
        let path = format!("/planning/gardes/{shift_id}/assign");
        let body = AssignRequest { worker_id };
        self.send_json(Method::POST, &path, Some(&body)).await
    }

    /// `POST /planning/gardes/batch`
    async fn batch_update(&self, changes: &[BatchChange]) -> Result<BatchResponse, BackendError> {
        let body = BatchRequest {
            changes: changes.to_vec(),
        };
        self.send_json(Method::POST, "/planning/gardes/batch", Some(&body))
            .await
    }

    async fn run_admin(
        &self,
        operation: &AdminOperation,
    ) -> Result<serde_json::Value, BackendError> {
        let month = operation.month();
        let base = format!("/planning/months/{}/{}", month.year(), month.month());
        match operation {
            AdminOperation::GenerateFromTemplate { template_id, .. } => {
                let body = GenerateRequest {
                    template_id: *template_id,
                };
                self.send_json(Method::POST, &format!("{base}/generate"), Some(&body))
                    .await
            }
            AdminOperation::ValidateMonth { .. } => {
                self.send_json(Method::POST, &format!("{base}/validate"), None::<&()>)
                    .await
            }
            AdminOperation::DeleteMonth { .. } => {
                self.send_json(Method::DELETE, &format!("{base}/gardes"), None::<&()>)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/");
        assert_eq!(backend.api_url(), "http://localhost:8000");
    }

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(
            error_message(r#"{"error": "Garde déjà validée", "code": "CONFLICT"}"#),
            "Garde déjà validée"
        );
        assert_eq!(error_message(r#"{"message": "bad"}"#), "bad");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
