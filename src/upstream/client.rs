//! Upstream JSON-RPC client
//!
//! Executes one JSON-RPC call per invocation as an HTTP POST to the origin.
//! Transport failures (unreachable origin, non-200 status, undecodable body,
//! deadline expiry) are kept apart from errors the origin itself reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::UpstreamError;
use crate::upstream::types::{UpstreamRequest, UpstreamResponse};

/// Per-call options threaded through every upstream exchange
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    /// Deadline for the whole exchange, body read included
    pub timeout: Option<Duration>,
}

impl CallContext {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

/// Upstream JSON-RPC client
pub struct UpstreamClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Origin endpoint every request is POSTed to
    origin_url: String,

    /// Source of request ids; calls are independent so ids only aid logging
    next_id: AtomicU64,
}

impl UpstreamClient {
    /// Create a new client for `origin_url`
    pub fn new(origin_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            origin_url: origin_url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }

    /// Call `method` upstream and return its still-undecoded result
    pub async fn call(
        &self,
        ctx: &CallContext,
        method: &str,
        params: Option<&Value>,
    ) -> Result<Box<RawValue>, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, method, url = %self.origin_url, "calling upstream");

        let result = self.exchange(ctx, id, method, params).await;
        if let Err(e) = &result {
            warn!(id, method, error = %e, "upstream call failed");
        }
        result
    }

    /// Call `method` upstream and decode its result as `T`
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: &str,
        params: Option<&Value>,
    ) -> Result<T, UpstreamError> {
        let raw = self.call(ctx, method, params).await?;
        decode_result(method, &raw)
    }

    async fn exchange(
        &self,
        ctx: &CallContext,
        id: u64,
        method: &str,
        params: Option<&Value>,
    ) -> Result<Box<RawValue>, UpstreamError> {
        let request = UpstreamRequest::new(id, method, params);

        let mut builder = self.http_client.post(&self.origin_url).json(&request);
        if let Some(timeout) = ctx.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify_error(e, ctx))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_error(e, ctx))?;

        if status != reqwest::StatusCode::OK {
            return Err(UpstreamError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: UpstreamResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::InvalidEnvelope {
                message: e.to_string(),
            })?;

        if let Some(error) = envelope.error {
            return Err(UpstreamError::Application {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        match envelope.result {
            Some(result) => Ok(result),
            // `"result": null` and an absent result both decode to None
            None => RawValue::from_string("null".to_string()).map_err(|e| {
                UpstreamError::InvalidEnvelope {
                    message: e.to_string(),
                }
            }),
        }
    }

    fn classify_error(&self, err: reqwest::Error, ctx: &CallContext) -> UpstreamError {
        match ctx.timeout {
            Some(timeout) if err.is_timeout() => UpstreamError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
            _ => UpstreamError::Transport {
                url: self.origin_url.clone(),
                message: err.to_string(),
            },
        }
    }
}

/// Decode a raw upstream result into the shape `method` is expected to return
pub fn decode_result<T: DeserializeOwned>(method: &str, raw: &RawValue) -> Result<T, UpstreamError> {
    serde_json::from_str(raw.get()).map_err(|e| UpstreamError::InvalidEnvelope {
        message: format!("unexpected {} result: {}", method, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> CallContext {
        CallContext::with_timeout(Some(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_call_returns_raw_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"tools": [], "extra": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let raw = client.call(&ctx(), "tools/list", None).await.unwrap();
        let value: Value = serde_json::from_str(raw.get()).unwrap();
        assert_eq!(value, json!({"tools": [], "extra": true}));
    }

    #[tokio::test]
    async fn test_params_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"params": {"name": "echo"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": {"ok": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let params = json!({"name": "echo"});
        let value: Value = client
            .call_as(&ctx(), "tools/call", Some(&params))
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": 1}));
    }

    #[tokio::test]
    async fn test_non_200_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let err = client.call(&ctx(), "tools/list", None).await.unwrap_err();
        assert!(err.is_transport());
        match err {
            UpstreamError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "database down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_error_object_is_application_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "tool exploded"}
            })))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let err = client.call(&ctx(), "tools/call", None).await.unwrap_err();
        assert!(!err.is_transport());
        assert!(err.to_string().contains("tool exploded"));
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let err = client.call(&ctx(), "ping", None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidEnvelope { .. }));
    }

    #[tokio::test]
    async fn test_deadline_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let short = CallContext::with_timeout(Some(Duration::from_millis(50)));
        let err = client.call(&short, "ping", None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_unreachable_origin() {
        let client = UpstreamClient::new("http://127.0.0.1:1");
        let err = client.call(&ctx(), "ping", None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_null_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": null})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri());
        let raw = client.call(&ctx(), "ping", None).await.unwrap();
        assert_eq!(raw.get(), "null");
    }
}
