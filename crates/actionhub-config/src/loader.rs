//! Action declaration documents.
//!
//! Each integration ships one document naming its actions with JSON-schema
//! style `input_schema`/`output_schema` objects. Only the subset needed to
//! build [`ActionDescriptor`]s is read; schema keywords beyond `type`,
//! `default`, `description` and `required` are ignored.

use crate::error::{ConfigError, ConfigResult};
use actionhub_core::{ActionDescriptor, ParamSpec, ReadPolicy, TypeTag};
use indexmap::IndexMap;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

/// Supported file formats for declaration and settings files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Detect file format from extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("json") => Ok(FileFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    pub fn parse<T: serde::de::DeserializeOwned>(self, content: &str) -> ConfigResult<T> {
        Ok(match self {
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthDeclaration>,
    #[serde(deserialize_with = "unique_keys")]
    pub actions: IndexMap<String, ActionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthDeclaration {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Credential field every action of the integration needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: ObjectSchema,
    #[serde(default)]
    pub output_schema: ObjectSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_read: Option<ReadPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "unique_keys")]
    pub properties: IndexMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    /// A type name, or a list such as `["string", "null"]`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySchema {
    pub fn type_tag(&self, field: &str) -> ConfigResult<TypeTag> {
        let invalid = |reason: String| ConfigError::InvalidType {
            field: field.to_string(),
            reason,
        };
        let parse = |name: &str| name.parse::<TypeTag>().map_err(|e| invalid(e.to_string()));
        match &self.kind {
            None => Ok(TypeTag::Any),
            Some(JsonValue::String(name)) => parse(name),
            Some(JsonValue::Array(names)) => {
                let mut tags = names.iter().filter(|n| n.as_str() != Some("null"));
                match (tags.next(), tags.next()) {
                    (Some(JsonValue::String(name)), None) => parse(name),
                    // Absent or a union of several types: accept anything.
                    _ => Ok(TypeTag::Any),
                }
            }
            Some(other) => Err(invalid(format!("expected a type name, found {}", other))),
        }
    }
}

impl ActionDeclaration {
    pub fn to_descriptor(
        &self,
        name: &str,
        required_credential: Option<&str>,
    ) -> ConfigResult<ActionDescriptor> {
        for field in &self.input_schema.required {
            if !self.input_schema.properties.contains_key(field) {
                return Err(ConfigError::Validation(format!(
                    "action '{}' requires undeclared input '{}'",
                    name, field
                )));
            }
        }

        let mut descriptor = ActionDescriptor::new(name);
        if let Some(description) = &self.description {
            descriptor = descriptor.with_description(description.clone());
        }
        for (field, property) in &self.input_schema.properties {
            let type_tag = property.type_tag(&format!("{}.{}", name, field))?;
            let mut param = if self.input_schema.required.contains(field) {
                ParamSpec::required(field.clone(), type_tag)
            } else {
                ParamSpec::optional(field.clone(), type_tag)
            };
            param.default = property.default.clone();
            param.description = property.description.clone();
            descriptor = descriptor.with_input(param);
        }
        for field in self.output_schema.properties.keys() {
            descriptor = descriptor.with_output(field.clone());
        }
        if let Some(field) = required_credential {
            descriptor = descriptor.requires_credential(field);
        }
        if let Some(policy) = &self.merged_read {
            if !self.input_schema.properties.contains_key(&policy.identifier) {
                return Err(ConfigError::Validation(format!(
                    "action '{}' merges reads on undeclared input '{}'",
                    name, policy.identifier
                )));
            }
            descriptor = descriptor.with_read_policy(policy.clone());
        }
        descriptor.validate()?;
        Ok(descriptor)
    }
}

impl IntegrationDeclaration {
    pub fn required_credential(&self) -> Option<&str> {
        self.auth.as_ref().and_then(|auth| auth.required_field.as_deref())
    }

    pub fn action(&self, name: &str) -> Option<&ActionDeclaration> {
        self.actions.get(name)
    }

    pub fn descriptor(&self, name: &str) -> ConfigResult<ActionDescriptor> {
        let action = self.action(name).ok_or_else(|| {
            ConfigError::Validation(format!(
                "action '{}' is not declared by '{}'",
                name, self.name
            ))
        })?;
        action.to_descriptor(name, self.required_credential())
    }

    /// Descriptors for every declared action, in declaration order.
    pub fn descriptors(&self) -> ConfigResult<Vec<ActionDescriptor>> {
        self.actions
            .iter()
            .map(|(name, action)| action.to_descriptor(name, self.required_credential()))
            .collect()
    }
}

/// Loads and checks declaration documents.
#[derive(Debug, Clone, Default)]
pub struct DeclarationLoader;

impl DeclarationLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<IntegrationDeclaration> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let format = FileFormat::from_path(path)?;
        tracing::debug!(path = %path.display(), ?format, "loading action declarations");
        self.parse_content(&content, format)
    }

    pub fn parse_content(
        &self,
        content: &str,
        format: FileFormat,
    ) -> ConfigResult<IntegrationDeclaration> {
        let declaration: IntegrationDeclaration = format.parse(content)?;
        self.validate(&declaration)?;
        Ok(declaration)
    }

    fn validate(&self, declaration: &IntegrationDeclaration) -> ConfigResult<()> {
        if declaration.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "integration name must not be empty".to_string(),
            ));
        }
        if declaration.actions.is_empty() {
            return Err(ConfigError::Validation(format!(
                "integration '{}' declares no actions",
                declaration.name
            )));
        }
        declaration.descriptors().map(|_| ())
    }
}

/// Deserializes a map, rejecting repeated keys instead of keeping the last one.
fn unique_keys<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueKeys<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeys<V> {
        type Value = IndexMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(serde::de::Error::custom(format!("duplicate key '{}'", key)));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}
