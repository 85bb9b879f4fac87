use std::collections::HashMap;
use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::schema::{FieldDefinition, FieldType, SchemaDefinition, SYSTEM_FIELDS};

use super::CrudError;

/// Validates a create payload against the schema and returns the
/// normalized record body: declared defaults filled in, field order as
/// declared. All problems are collected into one error so the client
/// sees every failing field at once.
pub fn validate_create(
    schema: &SchemaDefinition,
    payload: &Map<String, Value>,
) -> Result<Map<String, Value>, CrudError> {
    let mut field_errors = HashMap::new();
    check_unknown_fields(schema, payload, &mut field_errors);

    let mut normalized = Map::new();
    for field in &schema.fields {
        match payload.get(&field.name) {
            Some(Value::Null) | None => {
                if let Some(default) = &field.default {
                    normalized.insert(field.name.clone(), default.clone());
                } else if field.required {
                    field_errors.insert(field.name.clone(), "This field is required".to_string());
                }
            }
            Some(value) => {
                if let Err(msg) = check_value(field, value) {
                    field_errors.insert(field.name.clone(), msg);
                } else {
                    normalized.insert(field.name.clone(), value.clone());
                }
            }
        }
    }

    if field_errors.is_empty() {
        Ok(normalized)
    } else {
        Err(CrudError::Validation { field_errors })
    }
}

/// Validates a partial update payload. Only the fields present are
/// checked; a required field may not be nulled out.
pub fn validate_update(
    schema: &SchemaDefinition,
    payload: &Map<String, Value>,
) -> Result<Map<String, Value>, CrudError> {
    let mut field_errors = HashMap::new();
    check_unknown_fields(schema, payload, &mut field_errors);

    let mut normalized = Map::new();
    for field in &schema.fields {
        let Some(value) = payload.get(&field.name) else { continue };
        if value.is_null() {
            if field.required {
                field_errors.insert(field.name.clone(), "This field is required".to_string());
            } else {
                normalized.insert(field.name.clone(), Value::Null);
            }
        } else if let Err(msg) = check_value(field, value) {
            field_errors.insert(field.name.clone(), msg);
        } else {
            normalized.insert(field.name.clone(), value.clone());
        }
    }

    if field_errors.is_empty() {
        Ok(normalized)
    } else {
        Err(CrudError::Validation { field_errors })
    }
}

fn check_unknown_fields(
    schema: &SchemaDefinition,
    payload: &Map<String, Value>,
    field_errors: &mut HashMap<String, String>,
) {
    for key in payload.keys() {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            field_errors.insert(key.clone(), "System fields cannot be set".to_string());
        } else if schema.field(key).is_none() {
            field_errors.insert(key.clone(), "Unknown field".to_string());
        }
    }
}

fn check_value(field: &FieldDefinition, value: &Value) -> Result<(), String> {
    match field.field_type {
        FieldType::String | FieldType::Text => {
            let Some(s) = value.as_str() else {
                return Err("Must be a string".to_string());
            };
            if let Some(max) = field.max_length {
                if s.chars().count() > max as usize {
                    return Err(format!("Must be at most {} characters", max));
                }
            }
            Ok(())
        }
        FieldType::Integer => {
            let Some(n) = value.as_i64() else {
                return Err("Must be an integer".to_string());
            };
            check_range(field, Decimal::from(n))
        }
        FieldType::Decimal => {
            let parsed = match value {
                Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                Value::String(s) => Decimal::from_str(s).ok(),
                _ => None,
            };
            let Some(d) = parsed else {
                return Err("Must be a decimal number".to_string());
            };
            check_range(field, d)
        }
        FieldType::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err("Must be a boolean".to_string())
            }
        }
        FieldType::Timestamp => {
            let Some(s) = value.as_str() else {
                return Err("Must be an RFC 3339 timestamp string".to_string());
            };
            if DateTime::parse_from_rfc3339(s).is_ok() {
                Ok(())
            } else {
                Err(format!("Invalid timestamp format: {}", s))
            }
        }
    }
}

fn check_range(field: &FieldDefinition, actual: Decimal) -> Result<(), String> {
    if let Some(min) = field.min_value {
        if actual < min {
            return Err(format!("Must be at least {}", min));
        }
    }
    if let Some(max) = field.max_value {
        if actual > max {
            return Err(format!("Must be at most {}", max));
        }
    }
    Ok(())
}
