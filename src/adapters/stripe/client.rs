//! Authenticated request/response wrapper for the card processor API.
//!
//! Every call authenticates with HTTP Basic using the secret key as the
//! username and an empty password. GET bodies travel as a query string,
//! POST and DELETE bodies as `application/x-www-form-urlencoded` with
//! composite fields flattened to `key[sub]=value`.
//!
//! Responses are decoded into JSON and classified:
//!
//! | Outcome                                   | Error                      |
//! |-------------------------------------------|----------------------------|
//! | connection failure or timeout             | `GatewayError::Transport`  |
//! | body is not JSON (or is `null`)           | `GatewayError::Protocol`   |
//! | `{error:{message,type}}` with HTTP 404    | `GatewayError::NotFound`   |
//! | `{error:{message,type}}` otherwise        | `GatewayError::Processor`  |
//!
//! The client never retries.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::ProcessorConfig;
use crate::ports::GatewayError;

/// HTTP verb used against the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// Ordered form fields for a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Adds the field only when a value is present.
    pub fn maybe_field<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Adds `parent[key]=value`.
    pub fn nested(self, parent: &str, key: &str, value: impl ToString) -> Self {
        self.field(format!("{}[{}]", parent, key), value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// One outbound request. The auth key lives on the client, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub method: HttpMethod,
    pub endpoint: String,
    pub body: FormBody,
    pub blocking: bool,
}

impl RequestEnvelope {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint, FormBody::new())
    }

    pub fn post(endpoint: impl Into<String>, body: FormBody) -> Self {
        Self::new(HttpMethod::Post, endpoint, body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint, FormBody::new())
    }

    fn new(method: HttpMethod, endpoint: impl Into<String>, body: FormBody) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body,
            blocking: true,
        }
    }

    /// Fire the request without waiting for the response.
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseResult {
    /// Decoded response body.
    Json(Value),
    /// Non-blocking request handed off; no body was awaited.
    Dispatched,
}

impl ResponseResult {
    /// The decoded body, or a protocol error when the request was not awaited.
    pub fn into_json(self) -> Result<Value, GatewayError> {
        match self {
            ResponseResult::Json(value) => Ok(value),
            ResponseResult::Dispatched => Err(GatewayError::Protocol(
                "response of a non-blocking request is not available".to_string(),
            )),
        }
    }
}

/// Processor HTTP client.
#[derive(Clone)]
pub struct GatewayClient {
    http_client: reqwest::Client,
    api_key: SecretString,
    api_base_url: String,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    pub fn new(config: &ProcessorConfig) -> Result<Self, GatewayError> {
        Self::with_timeout(
            config.api_base_url.clone(),
            config.secret_key.clone(),
            config.timeout(),
        )
    }

    pub fn with_timeout(
        api_base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base_url, endpoint.trim_start_matches('/'))
    }

    /// Send a request and classify the response.
    pub async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseResult, GatewayError> {
        if !envelope.blocking {
            let client = self.clone();
            tokio::spawn(async move {
                let endpoint = envelope.endpoint.clone();
                if let Err(e) = client.execute(&envelope).await {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Non-blocking processor request failed");
                }
            });
            return Ok(ResponseResult::Dispatched);
        }

        self.execute(&envelope).await.map(ResponseResult::Json)
    }

    async fn execute(&self, envelope: &RequestEnvelope) -> Result<Value, GatewayError> {
        let url = self.url(&envelope.endpoint);
        let pairs = envelope.body.pairs();

        let request = match envelope.method {
            HttpMethod::Get => self.http_client.get(&url).query(pairs),
            HttpMethod::Post => self.http_client.post(&url).form(pairs),
            HttpMethod::Delete => self.http_client.delete(&url).form(pairs),
        };

        let response = request
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        classify_response(status, &bytes)
    }
}

fn classify_response(status: reqwest::StatusCode, bytes: &[u8]) -> Result<Value, GatewayError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        GatewayError::Protocol(format!("HTTP {} with undecodable body: {}", status, e))
    })?;

    if value.is_null() {
        return Err(GatewayError::Protocol(format!("HTTP {} with empty body", status)));
    }

    if let Some(error) = value.get("error").filter(|e| e.is_object()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown processor error")
            .to_string();
        let kind = error
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(message));
        }
        return Err(GatewayError::Processor { message, kind });
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound(format!("HTTP {}", status)));
    }
    if !status.is_success() {
        return Err(GatewayError::Processor {
            message: format!("HTTP {}", status),
            kind: "http_error".to_string(),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GatewayClient {
        GatewayClient::new(&ProcessorConfig::new("sk_test_123").with_base_url(server.uri()))
            .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // FormBody
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn form_body_flattens_nested_fields() {
        let body = FormBody::new()
            .field("amount", 1500)
            .nested("card", "number", "4242")
            .maybe_field("email", None::<String>);

        assert_eq!(body.get("amount"), Some("1500"));
        assert_eq!(body.get("card[number]"), Some("4242"));
        assert_eq!(body.get("email"), None);
        assert_eq!(body.pairs().len(), 2);
    }

    #[test]
    fn envelopes_block_by_default() {
        assert!(RequestEnvelope::get("plans/p1").blocking);
        assert!(!RequestEnvelope::delete("x").non_blocking().blocking);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Wire behaviour
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn post_sends_form_body_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .and(basic_auth("sk_test_123", ""))
            .and(body_string_contains("amount=1500"))
            .and(body_string_contains("metadata%5Bip_address%5D=10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ch_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let body = FormBody::new()
            .field("amount", 1500)
            .nested("metadata", "ip_address", "10.0.0.1");
        let result = client_for(&server)
            .send(RequestEnvelope::post("charges", body))
            .await
            .unwrap();

        assert_eq!(result, ResponseResult::Json(json!({ "id": "ch_1" })));
    }

    #[tokio::test]
    async fn get_sends_body_as_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut envelope = RequestEnvelope::get("events");
        envelope.body = FormBody::new().field("limit", 3);
        let result = client_for(&server).send(envelope).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn error_envelope_is_processor_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": { "message": "Your card was declined.", "type": "card_error" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(RequestEnvelope::post("charges", FormBody::new()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GatewayError::Processor {
                message: "Your card was declined.".to_string(),
                kind: "card_error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn error_envelope_with_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plans/sub-1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "message": "No such plan: sub-1", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(RequestEnvelope::get("plans/sub-1"))
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::NotFound("No such plan: sub-1".to_string()));
    }

    #[tokio::test]
    async fn undecodable_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/cus_1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(RequestEnvelope::get("customers/cus_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[tokio::test]
    async fn timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events/evt_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "evt_1" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = GatewayClient::with_timeout(
            server.uri(),
            SecretString::new("sk_test_123".to_string()),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = client.send(RequestEnvelope::get("events/evt_1")).await.unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client = GatewayClient::with_timeout(
            "http://127.0.0.1:1",
            SecretString::new("sk_test_123".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client.send(RequestEnvelope::get("events/evt_1")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn non_blocking_send_returns_dispatched() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/customers/cus_1/subscription"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "customer": "cus_1" })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .send(RequestEnvelope::delete("customers/cus_1/subscription").non_blocking())
            .await
            .unwrap();

        assert_eq!(result, ResponseResult::Dispatched);
        assert!(result.into_json().is_err());
    }
}
