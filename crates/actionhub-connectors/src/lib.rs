pub mod error;
pub mod humanitix;
pub mod rest;
pub mod url_builder;

#[cfg(feature = "http")]
pub mod http;

// Re-export commonly used types
pub use error::{ConnectorError, ConnectorResult};
pub use rest::{ListProtocol, MergedReadAction, ResourceSpec};
pub use url_builder::UrlBuilder;

#[cfg(feature = "http")]
pub use http::{ClientCache, ClientConfig, ReqwestTransport};

use actionhub_config::RuntimeSettings;
use actionhub_registry::ActionRegistry;

/// Installs one integration's actions into a registry.
pub type Registrar = fn(&mut ActionRegistry, &RuntimeSettings) -> ConnectorResult<()>;

/// Every integration shipped with this crate.
pub const REGISTRARS: &[(&str, Registrar)] = &[("humanitix", humanitix::register)];

/// Builds a registry holding all shipped integrations.
pub fn register_all(settings: &RuntimeSettings) -> ConnectorResult<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    for (name, registrar) in REGISTRARS {
        registrar(&mut registry, settings)?;
        tracing::info!(integration = %name, actions = registry.len(), "integration registered");
    }
    Ok(registry)
}
