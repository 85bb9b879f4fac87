use std::collections::HashMap;

use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::schema::{FieldType, SchemaDefinition};

use super::definition::{ColumnDefinition, ColumnType, RecordDefinition};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Table '{table}' does not match its compiled definition: {detail}")]
    ShapeMismatch { table: String, detail: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Compiles schema definitions into record definitions and reconciles them
/// with the underlying store at startup. Schema evolution is unsupported:
/// an existing table with a different shape is a fatal startup error.
pub struct ModelFactory;

impl ModelFactory {
    /// Pure function of the schema; calling twice with an unchanged schema
    /// yields an equal definition.
    pub fn build(schema: &SchemaDefinition) -> RecordDefinition {
        let mut columns = vec![
            ColumnDefinition {
                name: "id".to_string(),
                column_type: ColumnType::Uuid,
                not_null: true,
                unique: true,
            },
            ColumnDefinition {
                name: "created_at".to_string(),
                column_type: ColumnType::TimestampTz,
                not_null: true,
                unique: false,
            },
            ColumnDefinition {
                name: "updated_at".to_string(),
                column_type: ColumnType::TimestampTz,
                not_null: true,
                unique: false,
            },
        ];

        for field in &schema.fields {
            columns.push(ColumnDefinition {
                name: field.name.clone(),
                column_type: Self::column_type(field.field_type, field.max_length),
                not_null: field.required,
                unique: field.unique,
            });
        }

        RecordDefinition {
            schema_name: schema.name.clone(),
            table_name: schema.name.clone(),
            columns,
        }
    }

    fn column_type(field_type: FieldType, max_length: Option<u32>) -> ColumnType {
        match field_type {
            FieldType::String => ColumnType::Varchar(max_length.unwrap_or(255)),
            // Range checks are enforced at the CRUD layer, not in storage.
            FieldType::Integer => ColumnType::BigInt,
            FieldType::Decimal => ColumnType::Numeric { precision: 10, scale: 2 },
            FieldType::Boolean => ColumnType::Boolean,
            FieldType::Timestamp => ColumnType::TimestampTz,
            FieldType::Text => ColumnType::Text,
        }
    }

    pub fn create_table_sql(definition: &RecordDefinition) -> String {
        let mut parts = Vec::with_capacity(definition.columns.len());
        for col in &definition.columns {
            let mut part = format!("\"{}\" {}", col.name, col.column_type.sql_type());
            if col.name == "id" {
                part.push_str(" PRIMARY KEY");
            } else {
                if col.not_null {
                    part.push_str(" NOT NULL");
                }
                if col.unique {
                    part.push_str(" UNIQUE");
                }
            }
            parts.push(part);
        }
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            definition.table_name,
            parts.join(", ")
        )
    }

    /// Create the table if absent, then verify the live shape against the
    /// compiled definition. Must run before the server starts serving.
    pub async fn ensure_table(
        pool: &PgPool,
        definition: &RecordDefinition,
    ) -> Result<(), ModelError> {
        sqlx::query(&Self::create_table_sql(definition))
            .execute(pool)
            .await?;
        Self::verify_table(pool, definition).await
    }

    async fn verify_table(
        pool: &PgPool,
        definition: &RecordDefinition,
    ) -> Result<(), ModelError> {
        let rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable, \
                    character_maximum_length, numeric_precision, numeric_scale \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(&definition.table_name)
        .fetch_all(pool)
        .await?;

        if rows.is_empty() {
            return Err(ModelError::ShapeMismatch {
                table: definition.table_name.clone(),
                detail: "table is missing after creation".to_string(),
            });
        }

        let unique_rows = sqlx::query(
            "SELECT ccu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.constraint_column_usage ccu \
               ON ccu.constraint_name = tc.constraint_name \
              AND ccu.table_schema = tc.table_schema \
             WHERE tc.table_schema = current_schema() AND tc.table_name = $1 \
               AND tc.constraint_type IN ('UNIQUE', 'PRIMARY KEY')",
        )
        .bind(&definition.table_name)
        .fetch_all(pool)
        .await?;
        let unique_columns: std::collections::HashSet<String> = unique_rows
            .iter()
            .map(|row| row.get("column_name"))
            .collect();

        let live: HashMap<String, LiveColumn> = rows
            .iter()
            .map(|row| {
                let name: String = row.get("column_name");
                let nullable: String = row.get("is_nullable");
                let column = LiveColumn {
                    data_type: row.get("data_type"),
                    nullable: nullable == "YES",
                    char_max_length: row.get("character_maximum_length"),
                    numeric_precision: row.get("numeric_precision"),
                    numeric_scale: row.get("numeric_scale"),
                    unique: unique_columns.contains(&name),
                };
                (name, column)
            })
            .collect();

        Self::check_shape(definition, live)?;
        tracing::debug!(table = %definition.table_name, "table shape verified");
        Ok(())
    }

    /// Compares the compiled definition against the live shape reported
    /// by the catalog. Any drift is reported as a mismatch: declared
    /// varchar lengths, numeric precision and scale, nullability, and
    /// unique constraints all have to agree exactly.
    fn check_shape(
        definition: &RecordDefinition,
        mut live: HashMap<String, LiveColumn>,
    ) -> Result<(), ModelError> {
        let mismatch = |detail: String| ModelError::ShapeMismatch {
            table: definition.table_name.clone(),
            detail,
        };

        for col in &definition.columns {
            let Some(found) = live.remove(&col.name) else {
                return Err(mismatch(format!("missing column '{}'", col.name)));
            };
            if found.data_type != col.column_type.information_schema_name() {
                return Err(mismatch(format!(
                    "column '{}' has type '{}', expected '{}'",
                    col.name,
                    found.data_type,
                    col.column_type.information_schema_name()
                )));
            }
            match col.column_type {
                ColumnType::Varchar(len) => {
                    if found.char_max_length != Some(len as i32) {
                        return Err(mismatch(format!(
                            "column '{}' has max length {:?}, expected {}",
                            col.name, found.char_max_length, len
                        )));
                    }
                }
                ColumnType::Numeric { precision, scale } => {
                    if found.numeric_precision != Some(precision as i32)
                        || found.numeric_scale != Some(scale as i32)
                    {
                        return Err(mismatch(format!(
                            "column '{}' has precision {:?} and scale {:?}, expected ({}, {})",
                            col.name,
                            found.numeric_precision,
                            found.numeric_scale,
                            precision,
                            scale
                        )));
                    }
                }
                _ => {}
            }
            if found.nullable == col.not_null {
                return Err(mismatch(format!(
                    "column '{}' nullability disagrees with the schema",
                    col.name
                )));
            }
            if found.unique != col.unique {
                let detail = if col.unique {
                    format!("column '{}' is missing its unique constraint", col.name)
                } else {
                    format!("column '{}' carries an undeclared unique constraint", col.name)
                };
                return Err(mismatch(detail));
            }
        }

        if let Some(extra) = live.keys().next() {
            return Err(mismatch(format!("unexpected column '{}'", extra)));
        }
        Ok(())
    }
}

/// Column shape as reported by `information_schema` for a live table.
#[derive(Debug, Clone)]
struct LiveColumn {
    data_type: String,
    nullable: bool,
    char_max_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    unique: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};
    use rust_decimal::Decimal;

    fn widget() -> SchemaDefinition {
        SchemaDefinition::new(
            "widget",
            vec![
                FieldDefinition::new("name", FieldType::String)
                    .required()
                    .max_length(100),
                FieldDefinition::new("notes", FieldType::Text),
                FieldDefinition::new("price", FieldType::Decimal)
                    .required()
                    .min_value(Decimal::ZERO),
                FieldDefinition::new("quantity", FieldType::Integer),
                FieldDefinition::new("active", FieldType::Boolean),
                FieldDefinition::new("launched_at", FieldType::Timestamp),
                FieldDefinition::new("sku", FieldType::String).unique(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn build_maps_every_declared_type() {
        let def = ModelFactory::build(&widget());

        assert_eq!(def.table_name, "widget");
        assert_eq!(def.column("name").unwrap().column_type, ColumnType::Varchar(100));
        assert_eq!(def.column("notes").unwrap().column_type, ColumnType::Text);
        assert_eq!(
            def.column("price").unwrap().column_type,
            ColumnType::Numeric { precision: 10, scale: 2 }
        );
        assert_eq!(def.column("quantity").unwrap().column_type, ColumnType::BigInt);
        assert_eq!(def.column("active").unwrap().column_type, ColumnType::Boolean);
        assert_eq!(
            def.column("launched_at").unwrap().column_type,
            ColumnType::TimestampTz
        );
        // string without max_length falls back to varchar(255)
        assert_eq!(def.column("sku").unwrap().column_type, ColumnType::Varchar(255));
    }

    #[test]
    fn build_prepends_system_columns() {
        let def = ModelFactory::build(&widget());
        let names: Vec<&str> = def.column_names().take(3).collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at"]);
        assert_eq!(def.column("id").unwrap().column_type, ColumnType::Uuid);
    }

    #[test]
    fn build_is_idempotent() {
        let schema = widget();
        assert_eq!(ModelFactory::build(&schema), ModelFactory::build(&schema));
    }

    #[test]
    fn required_and_unique_flags_carry_into_columns() {
        let def = ModelFactory::build(&widget());
        assert!(def.column("name").unwrap().not_null);
        assert!(!def.column("notes").unwrap().not_null);
        assert!(def.column("sku").unwrap().unique);
    }

    /// Live shape exactly matching the compiled definition, as the
    /// catalog would report it for a freshly created table.
    fn matching_live(def: &RecordDefinition) -> HashMap<String, LiveColumn> {
        def.columns
            .iter()
            .map(|col| {
                let (char_max_length, numeric_precision, numeric_scale) = match col.column_type {
                    ColumnType::Varchar(len) => (Some(len as i32), None, None),
                    ColumnType::Numeric { precision, scale } => {
                        (None, Some(precision as i32), Some(scale as i32))
                    }
                    _ => (None, None, None),
                };
                let live = LiveColumn {
                    data_type: col.column_type.information_schema_name().to_string(),
                    nullable: !col.not_null,
                    char_max_length,
                    numeric_precision,
                    numeric_scale,
                    unique: col.unique,
                };
                (col.name.clone(), live)
            })
            .collect()
    }

    #[test]
    fn matching_shape_passes() {
        let def = ModelFactory::build(&widget());
        assert!(ModelFactory::check_shape(&def, matching_live(&def)).is_ok());
    }

    #[test]
    fn varchar_length_drift_is_a_mismatch() {
        let def = ModelFactory::build(&widget());
        let mut live = matching_live(&def);
        live.get_mut("name").unwrap().char_max_length = Some(50);
        let err = ModelFactory::check_shape(&def, live).unwrap_err();
        assert!(err.to_string().contains("name"), "unexpected error: {}", err);
    }

    #[test]
    fn numeric_precision_drift_is_a_mismatch() {
        let def = ModelFactory::build(&widget());
        let mut live = matching_live(&def);
        live.get_mut("price").unwrap().numeric_precision = Some(12);
        live.get_mut("price").unwrap().numeric_scale = Some(4);
        let err = ModelFactory::check_shape(&def, live).unwrap_err();
        assert!(err.to_string().contains("price"), "unexpected error: {}", err);
    }

    #[test]
    fn missing_unique_constraint_is_a_mismatch() {
        let def = ModelFactory::build(&widget());
        let mut live = matching_live(&def);
        live.get_mut("sku").unwrap().unique = false;
        let err = ModelFactory::check_shape(&def, live).unwrap_err();
        assert!(err.to_string().contains("unique"), "unexpected error: {}", err);
    }

    #[test]
    fn undeclared_unique_constraint_is_a_mismatch() {
        let def = ModelFactory::build(&widget());
        let mut live = matching_live(&def);
        live.get_mut("quantity").unwrap().unique = true;
        assert!(ModelFactory::check_shape(&def, live).is_err());
    }

    #[test]
    fn missing_and_extra_columns_are_mismatches() {
        let def = ModelFactory::build(&widget());
        let mut live = matching_live(&def);
        live.remove("notes");
        assert!(ModelFactory::check_shape(&def, live).is_err());

        let mut live = matching_live(&def);
        live.insert(
            "legacy".to_string(),
            LiveColumn {
                data_type: "text".to_string(),
                nullable: true,
                char_max_length: None,
                numeric_precision: None,
                numeric_scale: None,
                unique: false,
            },
        );
        assert!(ModelFactory::check_shape(&def, live).is_err());
    }

    #[test]
    fn create_table_sql_shape() {
        let def = ModelFactory::build(&widget());
        let sql = ModelFactory::create_table_sql(&def);

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"widget\""));
        assert!(sql.contains("\"id\" uuid PRIMARY KEY"));
        assert!(sql.contains("\"name\" varchar(100) NOT NULL"));
        assert!(sql.contains("\"price\" numeric(10, 2) NOT NULL"));
        assert!(sql.contains("\"sku\" varchar(255) UNIQUE"));
        assert!(sql.contains("\"created_at\" timestamptz NOT NULL"));
    }
}
