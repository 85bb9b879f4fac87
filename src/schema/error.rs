use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema '{0}' is already registered")]
    DuplicateSchema(String),

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Unsupported field type: {0}")]
    UnsupportedType(String),

    #[error("Invalid schema name: {0}")]
    InvalidName(String),

    #[error("Schema '{0}' must declare at least one field")]
    NoFields(String),

    #[error("Schema '{schema}' declares field '{field}' more than once")]
    DuplicateField { schema: String, field: String },

    #[error("Field name '{field}' in schema '{schema}' is reserved")]
    ReservedField { schema: String, field: String },

    #[error("Invalid field name '{field}' in schema '{schema}'")]
    InvalidFieldName { schema: String, field: String },

    #[error("Invalid schema definition: {0}")]
    InvalidDefinition(String),
}
