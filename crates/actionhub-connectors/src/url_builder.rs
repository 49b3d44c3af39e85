//! URL building utilities for REST integrations

use crate::error::{ConnectorError, ConnectorResult};
use url::Url;

/// URL builder that handles joining, path templates and identifier encoding
pub struct UrlBuilder;

impl UrlBuilder {
    /// Appends a relative path to the base URL, keeping the base path.
    ///
    /// - `join("https://api.example.com/v1", "events")` -> `https://api.example.com/v1/events`
    /// - `join("https://api.example.com/v1/", "/events")` -> `https://api.example.com/v1/events`
    pub fn join(base_url: &str, path: &str) -> ConnectorResult<String> {
        let mut base = Url::parse(base_url).map_err(|e| {
            ConnectorError::InvalidConfig(format!("Invalid base URL '{}': {}", base_url, e))
        })?;

        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Ok(base.to_string());
        }

        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let joined = base.join(path).map_err(|e| {
            ConnectorError::InvalidConfig(format!(
                "Failed to join URL '{}' with path '{}': {}",
                base_url, path, e
            ))
        })?;
        Ok(joined.to_string())
    }

    /// Percent-encodes one identifier for use as a single path segment.
    ///
    /// Empty identifiers and ones that could climb or split the path are rejected.
    pub fn path_segment(field: &str, value: &str) -> ConnectorResult<String> {
        let invalid = |reason: &str| ConnectorError::InvalidIdentifier {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if value == "." || value == ".." || value.contains('/') || value.contains('\\') {
            return Err(invalid("must not contain path separators or dot segments"));
        }
        if value.chars().any(char::is_control) {
            return Err(invalid("must not contain control characters"));
        }
        Ok(urlencoding::encode(value).into_owned())
    }

    /// Fills `{name}` placeholders with encoded values from `lookup`.
    pub fn expand<F>(template: &str, lookup: F) -> ConnectorResult<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                ConnectorError::InvalidConfig(format!("Unclosed placeholder in '{}'", template))
            })?;
            let name = &after[..end];
            let value = lookup(name).ok_or_else(|| ConnectorError::InvalidIdentifier {
                field: name.to_string(),
                reason: "is required".to_string(),
            })?;
            out.push_str(&Self::path_segment(name, &value)?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Names of the `{name}` placeholders in a template, in order.
    pub fn placeholders(template: &str) -> Vec<&str> {
        template
            .split('{')
            .skip(1)
            .filter_map(|part| part.split_once('}').map(|(name, _)| name))
            .collect()
    }

    /// Validate that a URL is well-formed
    pub fn validate(url: &str) -> ConnectorResult<()> {
        Url::parse(url)
            .map_err(|e| ConnectorError::InvalidConfig(format!("Invalid URL '{}': {}", url, e)))?;
        Ok(())
    }
}
