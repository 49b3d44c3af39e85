//! Per-call execution context and the transport seam handlers fetch through.

use actionhub_core::{classifier, Fault};
use async_trait::async_trait;
use http::Method;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// One outbound request, described independently of any HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// A response the transport managed to receive, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: JsonValue,
}

impl TransportResponse {
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `Retry-After` in delta-seconds form; HTTP dates are ignored.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.header("retry-after").and_then(|v| v.trim().parse().ok())
    }
}

/// The request never produced a response: connection refused, timeout, bad URL.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<TransportError> for Fault {
    fn from(err: TransportError) -> Self {
        Fault::Transport {
            message: err.message,
            status: err.status,
        }
    }
}

/// Executes HTTP requests on behalf of handlers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError>;
}

/// Opaque credential values keyed by field name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBag {
    values: HashMap<String, String>,
}

impl CredentialBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    /// Blank values count as absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

impl fmt::Debug for CredentialBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&String> = self.values.keys().collect();
        fields.sort();
        f.debug_struct("CredentialBag").field("fields", &fields).finish()
    }
}

/// Everything a handler may use during one dispatch.
///
/// Cloning is cheap: the transport and credentials are shared.
#[derive(Clone)]
pub struct ExecutionContext {
    execution_id: String,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialBag>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            transport,
            credentials: Arc::new(CredentialBag::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the generated execution id with one the caller correlates on.
    pub fn with_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialBag) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn credentials(&self) -> &CredentialBag {
        &self.credentials
    }

    /// Looks up a credential, failing with a missing-credential fault when absent.
    pub fn credential(&self, field: &str) -> Result<&str, Fault> {
        self.credentials
            .get(field)
            .ok_or_else(|| Fault::missing_credential(field))
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs one request, returning whatever response arrived.
    pub async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, Fault> {
        if self.cancel.is_cancelled() {
            return Err(Fault::Cancelled);
        }
        tracing::debug!(method = %request.method, url = %request.url, "fetch");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Fault::Cancelled),
            result = self.transport.fetch(request) => result.map_err(Fault::from),
        }
    }

    /// Runs one request and turns error statuses or embedded error payloads into a fault.
    ///
    /// An error status yields [`Fault::Status`]; an error structure inside a
    /// successful response yields [`Fault::ErrorBody`].
    pub async fn fetch_json(&self, request: FetchRequest) -> Result<JsonValue, Fault> {
        let response = self.fetch(request).await?;
        if classifier::is_error_status(response.status) {
            return Err(Fault::Status {
                retry_after_secs: response.retry_after_secs(),
                status: response.status,
                body: response.body,
            });
        }
        if classifier::embedded_status(&response.body).is_some() {
            return Err(Fault::ErrorBody(response.body));
        }
        Ok(response.body)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("credentials", &self.credentials)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actionhub_core::{classify, ErrorKind};
    use serde_json::json;

    struct Fixed(TransportResponse);

    #[async_trait]
    impl Transport for Fixed {
        async fn fetch(&self, _request: FetchRequest) -> Result<TransportResponse, TransportError> {
            Ok(self.0.clone())
        }
    }

    fn ctx(response: TransportResponse) -> ExecutionContext {
        ExecutionContext::new(Arc::new(Fixed(response)))
    }

    #[tokio::test]
    async fn embedded_error_with_http_200_becomes_fault() {
        let body = json!({"statusCode": 404, "error": "Not Found", "message": "Event not found"});
        let fault = ctx(TransportResponse::new(200, body))
            .fetch_json(FetchRequest::get("http://x"))
            .await
            .unwrap_err();
        assert!(matches!(fault, Fault::ErrorBody(_)));
        let record = classify(&fault);
        assert_eq!(record.kind, ErrorKind::NotFound);
        assert_eq!(record.status_code, Some(404));
    }

    #[tokio::test]
    async fn resource_with_code_field_is_returned_as_is() {
        let body = json!({"id": "e1", "code": "404"});
        let value = ctx(TransportResponse::new(200, body.clone()))
            .fetch_json(FetchRequest::get("http://x"))
            .await
            .unwrap();
        assert_eq!(value, body);
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let response = TransportResponse::new(429, json!({})).with_header("Retry-After", "30");
        let fault = ctx(response)
            .fetch_json(FetchRequest::get("http://x"))
            .await
            .unwrap_err();
        assert!(matches!(fault, Fault::Status { status: 429, .. }));
        let record = classify(&fault);
        assert_eq!(record.kind, ErrorKind::RateLimited);
        assert_eq!(record.retry_after_secs, Some(30));
    }

    #[tokio::test]
    async fn cancelled_context_does_not_fetch() {
        let ctx = ctx(TransportResponse::new(200, json!({})));
        ctx.cancellation().cancel();
        let fault = ctx.fetch_json(FetchRequest::get("http://x")).await.unwrap_err();
        assert!(matches!(fault, Fault::Cancelled));
    }

    #[test]
    fn caller_supplied_id_replaces_generated_one() {
        let generated = ctx(TransportResponse::new(200, json!({})));
        assert!(uuid::Uuid::parse_str(generated.execution_id()).is_ok());
        let named = generated.with_id("run-42");
        assert_eq!(named.execution_id(), "run-42");
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let bag = CredentialBag::new().with("api_key", "  ");
        assert!(!bag.contains("api_key"));
        let shown = format!("{:?}", CredentialBag::new().with("api_key", "secret"));
        assert!(!shown.contains("secret"));
    }
}
