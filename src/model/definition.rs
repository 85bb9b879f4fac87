use serde::{Deserialize, Serialize};

/// Canonical storage representation of a declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Uuid,
    Varchar(u32),
    BigInt,
    Numeric { precision: u8, scale: u8 },
    Boolean,
    TimestampTz,
    Text,
}

impl ColumnType {
    /// SQL type name used in generated DDL.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Varchar(len) => format!("varchar({})", len),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Numeric { precision, scale } => {
                format!("numeric({}, {})", precision, scale)
            }
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::TimestampTz => "timestamptz".to_string(),
            ColumnType::Text => "text".to_string(),
        }
    }

    /// Type name as reported by `information_schema.columns.data_type`,
    /// used to verify an existing table against the compiled definition.
    pub fn information_schema_name(&self) -> &'static str {
        match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Varchar(_) => "character varying",
            ColumnType::BigInt => "bigint",
            ColumnType::Numeric { .. } => "numeric",
            ColumnType::Boolean => "boolean",
            ColumnType::TimestampTz => "timestamp with time zone",
            ColumnType::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
}

/// Derived storage shape for one schema. Compiled once at startup by the
/// model factory and treated as an immutable artifact afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDefinition {
    pub schema_name: String,
    pub table_name: String,
    /// System columns first (id, created_at, updated_at), then declared
    /// fields in declaration order.
    pub columns: Vec<ColumnDefinition>,
}

impl RecordDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
