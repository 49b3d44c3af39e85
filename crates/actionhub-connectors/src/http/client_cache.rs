//! HTTP client caching keyed by client configuration

use crate::error::{ConnectorError, ConnectorResult};
use actionhub_config::RuntimeSettings;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Settings that require a distinct `reqwest::Client`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    pub connect_timeout_ms: u64,
    pub total_timeout_ms: u64,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            connect_timeout_ms: settings.connect_timeout().as_millis() as u64,
            total_timeout_ms: settings.request_timeout().as_millis() as u64,
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn build_client(&self) -> ConnectorResult<Client> {
        if self.connect_timeout_ms == 0 || self.total_timeout_ms == 0 {
            return Err(ConnectorError::InvalidConfig(
                "HTTP timeouts must be greater than zero".to_string(),
            ));
        }
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .timeout(Duration::from_millis(self.total_timeout_ms));
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        Ok(builder.build()?)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&RuntimeSettings::default())
    }
}

/// Shares `reqwest::Client` instances between transports with the same configuration
#[derive(Debug, Clone, Default)]
pub struct ClientCache {
    cache: Arc<RwLock<HashMap<ClientConfig, Arc<Client>>>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a client for the given configuration
    pub fn get_client(&self, config: &ClientConfig) -> ConnectorResult<Arc<Client>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(client) = cache.get(config) {
                return Ok(client.clone());
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have built it while we waited for the write lock.
        if let Some(client) = cache.get(config) {
            return Ok(client.clone());
        }

        let client = Arc::new(config.build_client()?);
        cache.insert(config.clone(), client.clone());
        tracing::debug!(cached_clients = cache.len(), "built HTTP client");
        Ok(client)
    }

    pub fn stats(&self) -> ClientCacheStats {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        ClientCacheStats {
            cached_clients: cache.len(),
        }
    }

    pub fn clear(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[derive(Debug, Clone)]
pub struct ClientCacheStats {
    pub cached_clients: usize,
}
