//! Input contract enforcement run before every handler call.

use actionhub_core::{ActionDescriptor, Fault, JsonMap};
use serde_json::Value as JsonValue;

/// Applies defaults and checks presence and type tags against the descriptor.
///
/// When a merged-read identifier is present, listing-only parameters are left
/// untouched: they are neither defaulted nor type-checked. Undeclared inputs
/// pass through unchanged.
pub fn validate_inputs(
    descriptor: &ActionDescriptor,
    mut inputs: JsonMap,
) -> Result<JsonMap, Fault> {
    let single_policy = match &descriptor.read_policy {
        Some(policy) => policy.identifier_of(&inputs)?.map(|_| policy),
        None => None,
    };

    for param in &descriptor.inputs {
        if single_policy.is_some_and(|policy| policy.is_listing_only(&param.name)) {
            continue;
        }
        match inputs.get(&param.name) {
            None | Some(JsonValue::Null) => {
                if let Some(default) = &param.default {
                    inputs.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(Fault::validation(param.name.as_str(), "is required"));
                }
            }
            Some(value) if !param.type_tag.matches(value) => {
                return Err(Fault::validation(
                    param.name.as_str(),
                    format!("expected {}, got {}", param.type_tag, json_type_name(value)),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(inputs)
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_f64() => "number",
        JsonValue::Number(_) => "integer",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
