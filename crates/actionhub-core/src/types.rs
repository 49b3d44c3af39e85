use crate::error::{CoreError, CoreResult};
use crate::resolver::ReadPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Type tag attached to an input parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }

    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "any" => Ok(Self::Any),
            other => Err(CoreError::Invalid(format!("unknown type tag '{}'", other))),
        }
    }
}

/// One named parameter of an action's input contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    #[serde(default)]
    pub required: bool,
    /// Value used when the caller omits the parameter. `None` means absence stays absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, value: JsonValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Static description of an action: its name, input contract and output contract.
///
/// Built once at load time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered input parameters.
    #[serde(default)]
    pub inputs: Vec<ParamSpec>,
    /// Names of the fields a successful result carries.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Credential field that must be present before the action may run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_policy: Option<ReadPolicy>,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            required_credential: None,
            read_policy: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input(mut self, param: ParamSpec) -> Self {
        self.inputs.push(param);
        self
    }

    pub fn with_output(mut self, field: impl Into<String>) -> Self {
        self.outputs.push(field.into());
        self
    }

    pub fn requires_credential(mut self, field: impl Into<String>) -> Self {
        self.required_credential = Some(field.into());
        self
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = Some(policy);
        self
    }

    pub fn input(&self, name: &str) -> Option<&ParamSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Structural checks: non-empty name, unique parameter names, coherent read policy.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Invalid("action name must not be empty".to_string()));
        }
        for (i, param) in self.inputs.iter().enumerate() {
            if self.inputs[..i].iter().any(|p| p.name == param.name) {
                return Err(CoreError::Invalid(format!(
                    "action '{}' declares input '{}' twice",
                    self.name, param.name
                )));
            }
            if let Some(default) = &param.default {
                if !param.type_tag.matches(default) {
                    return Err(CoreError::Invalid(format!(
                        "default for '{}.{}' is not of type {}",
                        self.name, param.name, param.type_tag
                    )));
                }
            }
        }
        if let Some(policy) = &self.read_policy {
            policy.validate()?;
        }
        Ok(())
    }
}
