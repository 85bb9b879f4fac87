pub mod builtin;
pub mod definition;
pub mod error;
pub mod registry;

pub use definition::{
    AuthConfig, FieldDefinition, FieldType, Operation, SchemaDefinition, SYSTEM_FIELDS,
};
pub use error::SchemaError;
pub use registry::SchemaRegistry;
