//! `Transport` implementation backed by reqwest.

use super::client_cache::{ClientCache, ClientConfig};
use crate::error::ConnectorResult;
use actionhub_registry::{FetchRequest, Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    cache: ClientCache,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(cache: ClientCache, config: ClientConfig) -> Self {
        Self { cache, config }
    }

    pub fn from_settings(settings: &actionhub_config::RuntimeSettings) -> Self {
        Self::new(ClientCache::new(), ClientConfig::from_settings(settings))
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    fn build(&self, request: FetchRequest) -> ConnectorResult<reqwest::RequestBuilder> {
        let client = self.cache.get_client(&self.config)?;
        let mut builder = client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.clone();
        let builder = self.build(request).map_err(|e| TransportError::new(e.to_string()))?;
        let response = builder.send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "request failed before a response arrived");
            let error = TransportError::new(e.to_string());
            match e.status() {
                Some(status) => error.with_status(status.as_u16()),
                None => error,
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::new(e.to_string()).with_status(status))?;

        tracing::debug!(url = %url, status, bytes = text.len(), "response received");
        Ok(TransportResponse {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

/// JSON when possible, otherwise the raw text; an empty body is `null`.
fn parse_body(text: &str) -> JsonValue {
    if text.trim().is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}
