//! One action serving both "get one" and "list many" for a REST resource.

use super::{input_string, AuthHeader};
use crate::error::ConnectorResult;
use crate::url_builder::UrlBuilder;
use actionhub_config::RuntimeSettings;
use actionhub_core::{
    classify, Fault, JsonMap, ListQuery, Page, PageRequest, PaginationState, Paginator, ReadMode,
    ReadPolicy, ResponseEnvelope,
};
use actionhub_registry::{ActionHandler, ExecutionContext, FetchRequest};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Mutex;

/// How the upstream pages its collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListProtocol {
    PageNumber {
        page_param: String,
        page_size_param: String,
    },
    Cursor {
        cursor_param: String,
        limit_param: String,
        next_cursor_field: String,
    },
}

impl ListProtocol {
    pub fn page_number(page_param: impl Into<String>, page_size_param: impl Into<String>) -> Self {
        Self::PageNumber {
            page_param: page_param.into(),
            page_size_param: page_size_param.into(),
        }
    }

    pub fn cursor(
        cursor_param: impl Into<String>,
        limit_param: impl Into<String>,
        next_cursor_field: impl Into<String>,
    ) -> Self {
        Self::Cursor {
            cursor_param: cursor_param.into(),
            limit_param: limit_param.into(),
            next_cursor_field: next_cursor_field.into(),
        }
    }
}

/// Where a resource lives and how its responses are shaped.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub base_url: String,
    /// Path template for one item, e.g. `events/{event_id}/orders/{order_id}`.
    pub single_path: String,
    pub list_path: String,
    /// Output key for a single item.
    pub item_key: String,
    /// Output key for a collection; also where the upstream nests it.
    pub collection_key: String,
    pub protocol: ListProtocol,
    /// Input field to query parameter. Listing-only fields are dropped in single mode.
    pub query_params: Vec<(String, String)>,
    pub auth: Option<AuthHeader>,
}

impl ResourceSpec {
    pub fn new(
        base_url: impl Into<String>,
        single_path: impl Into<String>,
        list_path: impl Into<String>,
        item_key: impl Into<String>,
        collection_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            single_path: single_path.into(),
            list_path: list_path.into(),
            item_key: item_key.into(),
            collection_key: collection_key.into(),
            protocol: ListProtocol::page_number("page", "pageSize"),
            query_params: Vec::new(),
            auth: None,
        }
    }

    pub fn with_protocol(mut self, protocol: ListProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_query_param(mut self, field: impl Into<String>, param: impl Into<String>) -> Self {
        self.query_params.push((field.into(), param.into()));
        self
    }

    pub fn with_auth(mut self, auth: AuthHeader) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[derive(Debug)]
pub struct MergedReadAction {
    spec: ResourceSpec,
    policy: ReadPolicy,
    settings: RuntimeSettings,
}

impl MergedReadAction {
    /// The policy's page sizes are narrowed to the runtime limits.
    pub fn new(
        spec: ResourceSpec,
        policy: ReadPolicy,
        settings: &RuntimeSettings,
    ) -> ConnectorResult<Self> {
        UrlBuilder::validate(&spec.base_url)?;
        let max = policy.max_page_size.min(settings.max_page_size);
        let default = policy
            .default_page_size
            .min(settings.default_page_size)
            .min(max);
        let policy = policy.with_page_sizes(default, max);
        policy.validate()?;
        Ok(Self {
            spec,
            policy,
            settings: settings.clone(),
        })
    }

    pub fn policy(&self) -> &ReadPolicy {
        &self.policy
    }

    fn request(
        &self,
        template: &str,
        id: Option<&str>,
        inputs: &JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<FetchRequest, Fault> {
        let path = UrlBuilder::expand(template, |name| match id {
            Some(id) if name == self.policy.identifier => Some(id.to_string()),
            _ => input_string(inputs, name),
        })?;
        let mut request = FetchRequest::get(UrlBuilder::join(&self.spec.base_url, &path)?)
            .with_header("Accept", "application/json");
        for (field, param) in &self.spec.query_params {
            if id.is_some() && self.policy.is_listing_only(field) {
                continue;
            }
            if let Some(value) = input_string(inputs, field) {
                request = request.with_query(param.as_str(), value);
            }
        }
        match &self.spec.auth {
            Some(auth) => auth.apply(request, ctx),
            None => Ok(request),
        }
    }

    async fn read_one(
        &self,
        id: &str,
        inputs: &JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<ResponseEnvelope, Fault> {
        let request = self.request(&self.spec.single_path, Some(id), inputs, ctx)?;
        let body = ctx.fetch_json(request).await?;
        if !body.is_object() {
            return Err(malformed(format!(
                "expected a JSON object for '{}', got {}",
                self.spec.item_key,
                describe(&body)
            )));
        }
        let mut data = JsonMap::new();
        data.insert(self.spec.item_key.clone(), body);
        Ok(ResponseEnvelope::success(data))
    }

    async fn read_many(
        &self,
        query: ListQuery,
        inputs: &JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<ResponseEnvelope, Fault> {
        let base = self.request(&self.spec.list_path, None, inputs, ctx)?;

        // A caller naming a page or cursor is resuming: serve exactly that page.
        let resuming = input_string(inputs, &self.policy.page_field).is_some()
            || query.cursor.is_some();
        let max_pages = if resuming { 1 } else { self.settings.max_pages };

        let (paginator, initial) = match &self.spec.protocol {
            ListProtocol::PageNumber { .. } => (
                Paginator::page_number(query.page_size),
                PaginationState::from_page(query.page),
            ),
            ListProtocol::Cursor { .. } => (
                Paginator::cursor(query.page_size),
                PaginationState::from_cursor(query.cursor.clone()),
            ),
        };
        let paginator = paginator
            .with_cap(query.cap.or(self.settings.default_cap))
            .with_max_pages(max_pages)
            .with_partial_results(self.settings.partial_results())
            .with_cancellation(ctx.cancellation().clone());

        let last_total: Mutex<Option<u64>> = Mutex::new(None);
        let outcome = paginator
            .drive(
                |page_request: PageRequest| {
                    let request = self.page_request(base.clone(), &page_request);
                    let last_total = &last_total;
                    async move {
                        let body = ctx.fetch_json(request).await?;
                        let page = self.parse_page(&body)?;
                        if let Ok(mut total) = last_total.lock() {
                            *total = page.total;
                        }
                        Ok::<_, Fault>(page)
                    }
                },
                initial,
            )
            .await?;

        let state = outcome.state;
        let total = last_total.into_inner().ok().flatten();
        let mut data = JsonMap::new();
        data.insert(
            "total".into(),
            json!(total.unwrap_or(state.accumulated.len() as u64)),
        );
        data.insert("pageSize".into(), json!(query.page_size));
        data.insert("has_more".into(), json!(!state.exhausted));
        match &self.spec.protocol {
            ListProtocol::PageNumber { .. } => {
                data.insert("page".into(), json!(query.page));
                let next = state.page_index.filter(|_| !state.exhausted);
                data.insert("next_page".into(), json!(next));
            }
            ListProtocol::Cursor { .. } => {
                let next = state.cursor.clone().filter(|_| !state.exhausted);
                data.insert("next_cursor".into(), json!(next));
            }
        }
        if let Some(fault) = &outcome.interrupted {
            data.insert("partial".into(), json!(true));
            data.insert("partial_error".into(), json!(classify(fault).message));
        }
        tracing::debug!(
            pages = outcome.pages_fetched,
            items = state.accumulated.len(),
            exhausted = state.exhausted,
            "list read finished"
        );
        data.insert(
            self.spec.collection_key.clone(),
            JsonValue::Array(state.accumulated),
        );
        Ok(ResponseEnvelope::success(data))
    }

    fn page_request(&self, base: FetchRequest, page: &PageRequest) -> FetchRequest {
        match &self.spec.protocol {
            ListProtocol::PageNumber {
                page_param,
                page_size_param,
            } => base
                .with_query(page_param.as_str(), page.page_index.unwrap_or(1).to_string())
                .with_query(page_size_param.as_str(), page.limit.to_string()),
            ListProtocol::Cursor {
                cursor_param,
                limit_param,
                ..
            } => {
                let request = base.with_query(limit_param.as_str(), page.limit.to_string());
                match &page.cursor {
                    Some(cursor) => request.with_query(cursor_param.as_str(), cursor.clone()),
                    None => request,
                }
            }
        }
    }

    /// Accepts a bare array, or an object nesting the collection under its key or `data`.
    fn parse_page(&self, body: &JsonValue) -> Result<Page<JsonValue>, Fault> {
        let key = self.spec.collection_key.as_str();
        let items = match body {
            JsonValue::Array(items) => items.clone(),
            JsonValue::Object(obj) => {
                let (field, value) = match (obj.get(key), obj.get("data")) {
                    (Some(value), _) => (key, value),
                    (None, Some(value)) => ("data", value),
                    (None, None) => {
                        return Err(malformed(format!(
                            "response has neither '{}' nor 'data'",
                            key
                        )));
                    }
                };
                match value {
                    JsonValue::Array(items) => items.clone(),
                    other => {
                        return Err(malformed(format!(
                            "'{}' should be an array, got {}",
                            field,
                            describe(other)
                        )));
                    }
                }
            }
            other => {
                return Err(malformed(format!(
                    "expected a '{}' collection, got {}",
                    key,
                    describe(other)
                )));
            }
        };
        let total = body.get("total").and_then(JsonValue::as_u64);
        let next_cursor = match &self.spec.protocol {
            ListProtocol::Cursor {
                next_cursor_field, ..
            } => body.get(next_cursor_field).and_then(super::scalar_string),
            ListProtocol::PageNumber { .. } => None,
        };
        Ok(Page::new(items)
            .with_total(total)
            .with_next_cursor(next_cursor))
    }
}

fn malformed(detail: String) -> Fault {
    Fault::unexpected(format!("malformed payload: {}", detail))
}

fn describe(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "an empty body",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "text",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[async_trait]
impl ActionHandler for MergedReadAction {
    async fn execute(
        &self,
        inputs: JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<ResponseEnvelope, Fault> {
        match self.policy.resolve(&inputs)? {
            ReadMode::Single(id) => self.read_one(&id, &inputs, ctx).await,
            ReadMode::List(query) => self.read_many(query, &inputs, ctx).await,
        }
    }
}
