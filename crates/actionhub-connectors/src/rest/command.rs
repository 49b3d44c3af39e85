//! Non-read REST calls (check-in style POSTs) built on the same context helpers.

use super::{input_string, AuthHeader};
use crate::error::ConnectorResult;
use crate::url_builder::UrlBuilder;
use actionhub_core::{Fault, JsonMap, ResponseEnvelope};
use actionhub_registry::{ActionHandler, ExecutionContext, FetchRequest, Method};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    /// Field read from the upstream response.
    pub source: String,
    /// Key the value is reported under.
    pub target: String,
    /// Reported when the upstream omits the field.
    pub default: JsonValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub base_url: String,
    pub method: Method,
    pub path: String,
    pub query_params: Vec<(String, String)>,
    pub outputs: Vec<OutputField>,
    pub auth: Option<AuthHeader>,
}

impl CommandSpec {
    pub fn new(base_url: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            method,
            path: path.into(),
            query_params: Vec::new(),
            outputs: Vec::new(),
            auth: None,
        }
    }

    pub fn with_query_param(mut self, field: impl Into<String>, param: impl Into<String>) -> Self {
        self.query_params.push((field.into(), param.into()));
        self
    }

    pub fn with_output(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        default: JsonValue,
    ) -> Self {
        self.outputs.push(OutputField {
            source: source.into(),
            target: target.into(),
            default,
        });
        self
    }

    pub fn with_auth(mut self, auth: AuthHeader) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[derive(Debug)]
pub struct CommandAction {
    spec: CommandSpec,
}

impl CommandAction {
    pub fn new(spec: CommandSpec) -> ConnectorResult<Self> {
        UrlBuilder::validate(&spec.base_url)?;
        Ok(Self { spec })
    }

    fn request(&self, inputs: &JsonMap, ctx: &ExecutionContext) -> Result<FetchRequest, Fault> {
        let path = UrlBuilder::expand(&self.spec.path, |name| input_string(inputs, name))?;
        let url = UrlBuilder::join(&self.spec.base_url, &path)?;
        let mut request = FetchRequest::new(self.spec.method.clone(), url)
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json");
        for (field, param) in &self.spec.query_params {
            if let Some(value) = input_string(inputs, field) {
                request = request.with_query(param.as_str(), value);
            }
        }
        match &self.spec.auth {
            Some(auth) => auth.apply(request, ctx),
            None => Ok(request),
        }
    }
}

#[async_trait]
impl ActionHandler for CommandAction {
    async fn execute(
        &self,
        inputs: JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<ResponseEnvelope, Fault> {
        let request = self.request(&inputs, ctx)?;
        let body = ctx.fetch_json(request).await?;
        // An empty body is a plain acknowledgement; anything else must be an object.
        if !(body.is_null() || body.is_object()) {
            return Err(Fault::unexpected(
                "malformed payload: expected a JSON object or an empty body",
            ));
        }
        let data = self
            .spec
            .outputs
            .iter()
            .map(|output| {
                let value = body.get(&output.source).filter(|v| !v.is_null()).cloned();
                (output.target.clone(), value.unwrap_or_else(|| output.default.clone()))
            })
            .collect();
        Ok(ResponseEnvelope::success(data))
    }
}
