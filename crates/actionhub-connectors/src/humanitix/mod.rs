//! Humanitix public API v1: events, orders, tickets, tags, check-in and check-out.
//!
//! Authentication is an account API key sent in the `x-api-key` header.

use crate::error::{ConnectorError, ConnectorResult};
use crate::rest::{AuthHeader, CommandAction, CommandSpec, MergedReadAction, ResourceSpec};
use actionhub_config::{DeclarationLoader, FileFormat, IntegrationDeclaration, RuntimeSettings};
use actionhub_core::ActionDescriptor;
use actionhub_registry::{ActionHandler, ActionRegistry, Method};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.humanitix.com/v1";
pub const CREDENTIAL_FIELD: &str = "api_key";
const API_KEY_HEADER: &str = "x-api-key";

const DECLARATION: &str = include_str!("actions.json");

/// Input fields forwarded as query parameters when the action declares them.
const QUERY_PARAMS: &[(&str, &str)] = &[
    ("override_location", "overrideLocation"),
    ("event_date_id", "eventDateId"),
    ("since", "since"),
    ("status", "status"),
];

pub fn declaration() -> ConnectorResult<IntegrationDeclaration> {
    Ok(DeclarationLoader::new().parse_content(DECLARATION, FileFormat::Json)?)
}

pub fn register(registry: &mut ActionRegistry, settings: &RuntimeSettings) -> ConnectorResult<()> {
    register_with_base_url(registry, settings, DEFAULT_BASE_URL)
}

/// Registers every declared action against `base_url` instead of the public API host.
pub fn register_with_base_url(
    registry: &mut ActionRegistry,
    settings: &RuntimeSettings,
    base_url: &str,
) -> ConnectorResult<()> {
    for descriptor in declaration()?.descriptors()? {
        let handler: Arc<dyn ActionHandler> = match descriptor.name.as_str() {
            "get_events" => read(
                &descriptor,
                settings,
                base_url,
                "events/{event_id}",
                "events",
                "event",
                "events",
            )?,
            "get_orders" => read(
                &descriptor,
                settings,
                base_url,
                "events/{event_id}/orders/{order_id}",
                "events/{event_id}/orders",
                "order",
                "orders",
            )?,
            "get_tickets" => read(
                &descriptor,
                settings,
                base_url,
                "events/{event_id}/tickets/{ticket_id}",
                "events/{event_id}/tickets",
                "ticket",
                "tickets",
            )?,
            "get_tags" => read(
                &descriptor,
                settings,
                base_url,
                "tags/{tag_id}",
                "tags",
                "tag",
                "tags",
            )?,
            "check_in" => scan(&descriptor, base_url, "check-in")?,
            "check_out" => scan(&descriptor, base_url, "check-out")?,
            other => {
                return Err(ConnectorError::InvalidConfig(format!(
                    "no handler for declared action '{}'",
                    other
                )));
            }
        };
        tracing::debug!(action = %descriptor.name, "registering humanitix action");
        registry.register_arc(descriptor, handler)?;
    }
    Ok(())
}

fn auth() -> AuthHeader {
    AuthHeader::new(API_KEY_HEADER, CREDENTIAL_FIELD)
}

fn declared_query_params(
    descriptor: &ActionDescriptor,
) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
    QUERY_PARAMS
        .iter()
        .copied()
        .filter(|(field, _)| descriptor.input(field).is_some())
}

fn read(
    descriptor: &ActionDescriptor,
    settings: &RuntimeSettings,
    base_url: &str,
    single_path: &str,
    list_path: &str,
    item_key: &str,
    collection_key: &str,
) -> ConnectorResult<Arc<dyn ActionHandler>> {
    let policy = descriptor.read_policy.clone().ok_or_else(|| {
        ConnectorError::InvalidConfig(format!(
            "action '{}' needs a merged_read policy",
            descriptor.name
        ))
    })?;
    let mut spec = ResourceSpec::new(base_url, single_path, list_path, item_key, collection_key)
        .with_auth(auth());
    for (field, param) in declared_query_params(descriptor) {
        spec = spec.with_query_param(field, param);
    }
    Ok(Arc::new(MergedReadAction::new(spec, policy, settings)?))
}

fn scan(
    descriptor: &ActionDescriptor,
    base_url: &str,
    verb: &str,
) -> ConnectorResult<Arc<dyn ActionHandler>> {
    let path = format!("events/{{event_id}}/tickets/{{ticket_id}}/{}", verb);
    let mut spec = CommandSpec::new(base_url, Method::POST, path)
        .with_output("scanningMessages", "scanning_messages", json!([]))
        .with_auth(auth());
    for (field, param) in declared_query_params(descriptor) {
        spec = spec.with_query_param(field, param);
    }
    Ok(Arc::new(CommandAction::new(spec)?))
}
