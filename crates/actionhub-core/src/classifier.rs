//! Maps heterogeneous failure signals onto the [`ErrorKind`] taxonomy.
//!
//! Precedence, highest first: missing credential, transport-level HTTP status,
//! status embedded in the response body, local validation, everything else.
//! Every function here is pure and total.

use crate::error::{ErrorKind, ErrorRecord, Fault};
use crate::sanitization::redact;
use serde_json::Value as JsonValue;

/// Keys that mark a top-level status code on their own.
const STATUS_KEYS: &[&str] = &["statusCode", "status_code"];

/// Generic keys that only count as a status inside an error structure.
const LOOSE_STATUS_KEYS: &[&str] = &["status", "code"];

/// Keys that carry a human readable reason, in preference order.
const MESSAGE_KEYS: &[&str] = &["message", "error_message", "error_description", "detail"];

pub fn classify(fault: &Fault) -> ErrorRecord {
    match fault {
        Fault::MissingCredential { field } => ErrorRecord::new(
            ErrorKind::Auth,
            format!(
                "No '{}' credential is available for this connection. \
                 Reconnect the integration to re-authenticate and try again.",
                field
            ),
        ),
        Fault::Status {
            status,
            body,
            retry_after_secs,
        } => {
            // A transport-level success can still wrap an embedded error.
            let status = if is_error_status(*status) {
                *status
            } else {
                embedded_status(body).unwrap_or(*status)
            };
            from_status(status, body, *retry_after_secs)
        }
        Fault::ErrorBody(body) => match embedded_status(body) {
            Some(status) => from_status(status, body, None),
            None => ErrorRecord::new(
                ErrorKind::Unexpected,
                with_detail(
                    "The service returned an error payload without a status code.".into(),
                    upstream_message(body),
                ),
            )
            .with_raw(redact(body)),
        },
        Fault::Validation { field, reason } => ErrorRecord::new(
            ErrorKind::Validation,
            format!(
                "Invalid value for '{}': {}. Check the field and try again.",
                field, reason
            ),
        ),
        Fault::Transport {
            message,
            status: Some(status),
        } => from_status(*status, &JsonValue::String(message.clone()), None),
        Fault::Transport {
            message,
            status: None,
        } => ErrorRecord::new(
            ErrorKind::Unexpected,
            format!("The request could not be completed: {}", message),
        ),
        Fault::Cancelled => ErrorRecord::new(
            ErrorKind::Unexpected,
            "The request was cancelled before it completed.",
        ),
        Fault::Unexpected(description) => ErrorRecord::new(
            ErrorKind::Unexpected,
            format!("Unexpected error: {}", description),
        ),
    }
}

/// Checks a transport response that did not fail at the transport level.
///
/// Returns `None` when the response is a genuine success.
pub fn inspect(
    status: u16,
    body: &JsonValue,
    retry_after_secs: Option<u64>,
) -> Option<ErrorRecord> {
    if is_error_status(status) {
        return Some(from_status(status, body, retry_after_secs));
    }
    embedded_status(body).map(|embedded| from_status(embedded, body, retry_after_secs))
}

pub fn is_error_status(status: u16) -> bool {
    (400..=599).contains(&status)
}

/// Reads an error status from a body shaped like a structured error payload.
///
/// At the top level only `statusCode`/`status_code` count, unless an `error` or
/// `message` field sits beside a plain `status`/`code`. Inside an `error`
/// object every status key counts.
pub fn embedded_status(body: &JsonValue) -> Option<u16> {
    let obj = body.as_object()?;
    if let Some(status) = find_status(obj, STATUS_KEYS) {
        return Some(status);
    }
    if obj.contains_key("error") || obj.contains_key("message") {
        if let Some(status) = find_status(obj, LOOSE_STATUS_KEYS) {
            return Some(status);
        }
    }
    let nested = obj.get("error").and_then(JsonValue::as_object)?;
    find_status(nested, STATUS_KEYS).or_else(|| find_status(nested, LOOSE_STATUS_KEYS))
}

fn find_status(obj: &serde_json::Map<String, JsonValue>, keys: &[&str]) -> Option<u16> {
    keys.iter().filter_map(|key| obj.get(*key)).find_map(|value| {
        let code = match value {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        u16::try_from(code).ok().filter(|c| is_error_status(*c))
    })
}

/// Extracts the upstream-provided explanation from an error body, if any.
pub fn upstream_message(body: &JsonValue) -> Option<String> {
    match body {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Object(obj) => {
            let message = MESSAGE_KEYS
                .iter()
                .filter_map(|key| obj.get(*key).and_then(JsonValue::as_str))
                .find(|s| !s.trim().is_empty())
                .map(str::to_string);
            match (obj.get("error"), message) {
                (Some(JsonValue::String(label)), Some(msg))
                    if !label.is_empty() && label != &msg =>
                {
                    Some(format!("{}: {}", label, msg))
                }
                (Some(JsonValue::String(label)), None) if !label.is_empty() => {
                    Some(label.clone())
                }
                (Some(nested @ JsonValue::Object(_)), None) => upstream_message(nested),
                (_, msg) => msg,
            }
        }
        _ => None,
    }
}

fn from_status(status: u16, body: &JsonValue, retry_after_secs: Option<u64>) -> ErrorRecord {
    let detail = upstream_message(body);
    let (kind, message) = match status {
        401 => (
            ErrorKind::Auth,
            "Authentication failed (HTTP 401). \
             Reconnect the account to refresh its credentials and try again."
                .to_string(),
        ),
        403 => (
            ErrorKind::Forbidden,
            "Permission denied (HTTP 403). \
             Check that the connected account has access to this resource."
                .to_string(),
        ),
        404 => (
            ErrorKind::NotFound,
            "Resource not found (HTTP 404). Check that the ID is correct and still exists."
                .to_string(),
        ),
        429 => {
            let wait = match retry_after_secs {
                Some(secs) => format!("Wait {} seconds before trying again.", secs),
                None => "Wait before trying again.".to_string(),
            };
            (
                ErrorKind::RateLimited,
                format!("Rate limit exceeded (HTTP 429). {}", wait),
            )
        }
        other => (
            ErrorKind::UpstreamError,
            format!("The service returned an error (HTTP {}).", other),
        ),
    };

    let mut record = ErrorRecord::new(kind, with_detail(message, detail)).with_status(status);
    if kind == ErrorKind::RateLimited {
        record = record.with_retry_after(retry_after_secs);
    }
    if !body.is_null() {
        record = record.with_raw(redact(body));
    }
    record
}

fn with_detail(message: String, detail: Option<String>) -> String {
    match detail {
        Some(detail) => format!("{} Upstream said: {}", message, detail),
        None => message,
    }
}
