pub mod definition;
pub mod factory;

pub use definition::{ColumnDefinition, ColumnType, RecordDefinition};
pub use factory::{ModelError, ModelFactory};
