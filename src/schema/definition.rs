use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::error::SchemaError;

/// Column names managed by the engine itself. Schemas may not declare them.
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Closed set of declarable field types.
///
/// Anything outside this set fails at parse time with
/// `SchemaError::UnsupportedType`, before a record definition is ever built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
    Text,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Text => "text",
        }
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldType::String),
            "integer" => Ok(FieldType::Integer),
            "decimal" => Ok(FieldType::Decimal),
            "boolean" => Ok(FieldType::Boolean),
            "timestamp" => Ok(FieldType::Timestamp),
            "text" => Ok(FieldType::Text),
            other => Err(SchemaError::UnsupportedType(other.to_string())),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared field. Immutable once the owning schema is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            unique: false,
            max_length: None,
            min_value: None,
            max_value: None,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn min_value(mut self, min: Decimal) -> Self {
        self.min_value = Some(min);
        self
    }

    pub fn max_value(mut self, max: Decimal) -> Self {
        self.max_value = Some(max);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// The six operations derived for every schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
    List,
    Count,
}

impl Operation {
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Count => "count",
        }
    }
}

/// Per-schema route gating flags.
///
/// `require_auth` dominates: when set, every operation is gated and
/// `read_public` is ignored. Otherwise reads are public iff `read_public`
/// and writes are gated iff `write_protected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub require_auth: bool,
    pub read_public: bool,
    pub write_protected: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            read_public: false,
            write_protected: true,
        }
    }
}

impl AuthConfig {
    /// Fully public routes, reads and writes alike.
    pub fn public() -> Self {
        Self {
            require_auth: false,
            read_public: true,
            write_protected: false,
        }
    }

    /// Public catalog style: anyone may read, writes need a credential.
    pub fn public_read() -> Self {
        Self {
            require_auth: false,
            read_public: true,
            write_protected: true,
        }
    }

    /// Whether the given operation needs a verified credential.
    pub fn requires_auth(&self, op: Operation) -> bool {
        if self.require_auth {
            return true;
        }
        if op.is_write() {
            self.write_protected
        } else {
            !self.read_public
        }
    }
}

/// Declarative description of one entity: fields, constraints, gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl SchemaDefinition {
    /// Build and validate a schema. Invariants: name is a lowercase
    /// identifier, at least one field, unique field names, no collisions
    /// with system columns.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        Self::validate_name(&name)?;

        if fields.is_empty() {
            return Err(SchemaError::NoFields(name));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            Self::validate_field_name(&name, &field.name)?;
            if SYSTEM_FIELDS.contains(&field.name.as_str()) {
                return Err(SchemaError::ReservedField {
                    schema: name,
                    field: field.name.clone(),
                });
            }
            if !seen.insert(field.name.clone()) {
                return Err(SchemaError::DuplicateField {
                    schema: name,
                    field: field.name.clone(),
                });
            }
        }

        Ok(Self {
            name,
            title: None,
            description: None,
            fields,
            auth: AuthConfig::default(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Parse a schema from its JSON representation. Unknown field types
    /// surface as `SchemaError::UnsupportedType`, shape violations as the
    /// corresponding invariant error.
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        let raw: RawSchema = serde_json::from_value(value)
            .map_err(|e| SchemaError::InvalidDefinition(e.to_string()))?;

        let mut fields = Vec::with_capacity(raw.fields.len());
        for f in raw.fields {
            let field_type = FieldType::from_str(&f.field_type)?;
            fields.push(FieldDefinition {
                name: f.name,
                field_type,
                required: f.required,
                unique: f.unique,
                max_length: f.max_length,
                min_value: f.min_value,
                max_value: f.max_value,
                default: f.default,
                description: f.description,
            });
        }

        let mut schema = Self::new(raw.name, fields)?;
        schema.title = raw.title;
        schema.description = raw.description;
        if let Some(auth) = raw.auth {
            schema.auth = auth;
        }
        Ok(schema)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.required)
    }

    /// API path segment, e.g. `/api/v1/product`.
    pub fn api_path(&self) -> String {
        format!("/api/v1/{}", self.name)
    }

    fn validate_name(name: &str) -> Result<(), SchemaError> {
        let valid = !name.is_empty()
            && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(SchemaError::InvalidName(name.to_string()))
        }
    }

    fn validate_field_name(schema: &str, field: &str) -> Result<(), SchemaError> {
        let valid = !field.is_empty()
            && field.chars().next().is_some_and(|c| c.is_ascii_lowercase())
            && field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(SchemaError::InvalidFieldName {
                schema: schema.to_string(),
                field: field.to_string(),
            })
        }
    }
}

/// Wire shape used by `from_json`; field types stay strings so unknown
/// names can be reported precisely instead of as a serde parse failure.
#[derive(Deserialize)]
struct RawSchema {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    fields: Vec<RawField>,
    #[serde(default)]
    auth: Option<AuthConfig>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    max_length: Option<u32>,
    #[serde(default)]
    min_value: Option<Decimal>,
    #[serde(default)]
    max_value: Option<Decimal>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}
