//! Merged-read resolution: one action serves both "get one" and "list many".
//!
//! A [`ReadPolicy`] names the identifier field and the fields that only make
//! sense when listing. A non-empty identifier always wins and listing-only
//! fields are then ignored, whatever they contain.

use crate::error::{CoreError, CoreResult, Fault};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub type JsonMap = Map<String, JsonValue>;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 100;

fn default_page_field() -> String {
    "page".to_string()
}

fn default_page_size_field() -> String {
    "page_size".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPolicy {
    /// Input field holding the single-item identifier.
    pub identifier: String,
    /// Filters that only apply when listing (`since`, `status`, ...).
    #[serde(default)]
    pub listing_only: Vec<String>,
    #[serde(default = "default_page_field")]
    pub page_field: String,
    #[serde(default = "default_page_size_field")]
    pub page_size_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
    /// Input field carrying the caller's overall result cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_field: Option<String>,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cap: Option<usize>,
}

/// Outcome of resolving an invocation's inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadMode {
    Single(String),
    List(ListQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub cursor: Option<String>,
    pub cap: Option<usize>,
    /// Listing-only filters the caller actually supplied.
    pub filters: JsonMap,
}

impl ReadPolicy {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            listing_only: Vec::new(),
            page_field: default_page_field(),
            page_size_field: default_page_size_field(),
            cursor_field: None,
            cap_field: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            default_cap: None,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_listing_only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listing_only.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_page_sizes(mut self, default_page_size: u32, max_page_size: u32) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_cursor_field(mut self, field: impl Into<String>) -> Self {
        self.cursor_field = Some(field.into());
        self
    }

    pub fn with_cap_field(mut self, field: impl Into<String>) -> Self {
        self.cap_field = Some(field.into());
        self
    }

    pub fn with_default_cap(mut self, cap: usize) -> Self {
        self.default_cap = Some(cap);
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(CoreError::Invalid(
                "read policy needs an identifier field".to_string(),
            ));
        }
        if self.is_listing_only(&self.identifier) {
            return Err(CoreError::Invalid(format!(
                "identifier '{}' cannot also be a listing-only field",
                self.identifier
            )));
        }
        if self.max_page_size == 0 || self.default_page_size == 0 {
            return Err(CoreError::Invalid("page sizes must be at least 1".to_string()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(CoreError::Invalid(format!(
                "default page size {} exceeds maximum {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// True for declared filters and for the paging control fields.
    pub fn is_listing_only(&self, field: &str) -> bool {
        field == self.page_field
            || field == self.page_size_field
            || self.cursor_field.as_deref() == Some(field)
            || self.cap_field.as_deref() == Some(field)
            || self.listing_only.iter().any(|f| f == field)
    }

    /// Returns the identifier if the inputs select single-item mode.
    ///
    /// Absent, null and blank identifiers select list mode; any other
    /// non-scalar value is rejected rather than silently listing.
    pub fn identifier_of(&self, inputs: &JsonMap) -> Result<Option<String>, Fault> {
        match inputs.get(&self.identifier) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.trim().to_string())),
            Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(Fault::validation(
                self.identifier.as_str(),
                "must be a string or number",
            )),
        }
    }

    pub fn resolve(&self, inputs: &JsonMap) -> Result<ReadMode, Fault> {
        if let Some(id) = self.identifier_of(inputs)? {
            return Ok(ReadMode::Single(id));
        }

        let page = positive_int(inputs, &self.page_field)?.unwrap_or(1);
        let requested =
            positive_int(inputs, &self.page_size_field)?.unwrap_or(self.default_page_size);
        let page_size = if requested > self.max_page_size {
            tracing::debug!(requested, max = self.max_page_size, "clamping page size");
            self.max_page_size
        } else {
            requested
        };

        let cursor = match &self.cursor_field {
            Some(field) => match inputs.get(field) {
                Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(JsonValue::Number(n)) => Some(n.to_string()),
                Some(JsonValue::Null) | None => None,
                Some(JsonValue::String(_)) => None,
                Some(_) => {
                    return Err(Fault::validation(field.as_str(), "must be a string cursor"));
                }
            },
            None => None,
        };

        let cap = match &self.cap_field {
            Some(field) => positive_int(inputs, field)?.map(|c| c as usize).or(self.default_cap),
            None => self.default_cap,
        };

        let filters = self
            .listing_only
            .iter()
            .filter_map(|field| match inputs.get(field) {
                Some(JsonValue::Null) | None => None,
                Some(value) => Some((field.clone(), value.clone())),
            })
            .collect();

        Ok(ReadMode::List(ListQuery {
            page,
            page_size,
            cursor,
            cap,
            filters,
        }))
    }
}

/// Reads an optional integer ≥ 1, accepting numeric strings from lenient callers.
fn positive_int(inputs: &JsonMap, field: &str) -> Result<Option<u32>, Fault> {
    let parsed = match inputs.get(field) {
        None | Some(JsonValue::Null) => return Ok(None),
        Some(JsonValue::Number(n)) => n.as_u64(),
        Some(JsonValue::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(0) => Err(Fault::validation(field, "must be at least 1")),
        Some(n) => Ok(Some(u32::try_from(n).unwrap_or(u32::MAX))),
        None => Err(Fault::validation(field, "must be a positive integer")),
    }
}
