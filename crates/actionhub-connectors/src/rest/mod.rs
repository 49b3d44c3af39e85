//! Data-driven REST actions shared by integrations.

pub mod command;
pub mod merged_read;

pub use command::{CommandAction, CommandSpec};
pub use merged_read::{ListProtocol, MergedReadAction, ResourceSpec};

use actionhub_core::{Fault, JsonMap};
use actionhub_registry::{ExecutionContext, FetchRequest};
use serde_json::Value as JsonValue;

/// Header carrying a credential value, e.g. `x-api-key` from `api_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub header: String,
    pub credential: String,
}

impl AuthHeader {
    pub fn new(header: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            credential: credential.into(),
        }
    }

    pub fn apply(
        &self,
        request: FetchRequest,
        ctx: &ExecutionContext,
    ) -> Result<FetchRequest, Fault> {
        let value = ctx.credential(&self.credential)?;
        Ok(request.with_header(self.header.as_str(), value))
    }
}

/// Renders a scalar input as a query or path value. Blank strings count as absent.
pub(crate) fn scalar_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn input_string(inputs: &JsonMap, field: &str) -> Option<String> {
    inputs.get(field).and_then(scalar_string)
}
