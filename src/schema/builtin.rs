//! Builtin schema catalog registered by the server binary.

use rust_decimal::Decimal;
use serde_json::json;

use super::definition::{AuthConfig, FieldDefinition, FieldType, SchemaDefinition};
use super::error::SchemaError;
use super::registry::SchemaRegistry;

/// Product catalog: anyone may browse, writes need a credential.
pub fn product_schema() -> Result<SchemaDefinition, SchemaError> {
    Ok(SchemaDefinition::new(
        "product",
        vec![
            FieldDefinition::new("name", FieldType::String)
                .required()
                .max_length(200)
                .describe("Product name"),
            FieldDefinition::new("description", FieldType::Text)
                .describe("Product description"),
            FieldDefinition::new("price", FieldType::Decimal)
                .required()
                .min_value(Decimal::new(1, 2))
                .describe("Product price in USD"),
            FieldDefinition::new("in_stock", FieldType::Boolean)
                .default_value(json!(true))
                .describe("Whether product is in stock"),
            FieldDefinition::new("stock_quantity", FieldType::Integer)
                .min_value(Decimal::ZERO)
                .default_value(json!(0))
                .describe("Available stock quantity"),
        ],
    )?
    .with_title("Product")
    .with_description("E-commerce product catalog")
    .with_auth(AuthConfig::public_read()))
}

/// Customer records carry personal data, so every operation is gated.
pub fn customer_schema() -> Result<SchemaDefinition, SchemaError> {
    Ok(SchemaDefinition::new(
        "customer",
        vec![
            FieldDefinition::new("first_name", FieldType::String)
                .required()
                .max_length(50),
            FieldDefinition::new("last_name", FieldType::String)
                .required()
                .max_length(50),
            FieldDefinition::new("email", FieldType::String)
                .required()
                .unique()
                .max_length(255)
                .describe("Customer email address"),
            FieldDefinition::new("phone", FieldType::String).max_length(20),
            FieldDefinition::new("loyalty_points", FieldType::Integer)
                .min_value(Decimal::ZERO)
                .default_value(json!(0)),
            FieldDefinition::new("signed_up_at", FieldType::Timestamp)
                .describe("When the customer joined"),
        ],
    )?
    .with_title("Customer")
    .with_description("Customer management")
    .with_auth(AuthConfig::default()))
}

pub fn task_schema() -> Result<SchemaDefinition, SchemaError> {
    Ok(SchemaDefinition::new(
        "task",
        vec![
            FieldDefinition::new("title", FieldType::String)
                .required()
                .max_length(200),
            FieldDefinition::new("description", FieldType::Text),
            FieldDefinition::new("due_date", FieldType::Timestamp)
                .describe("Task due date and time"),
            FieldDefinition::new("estimated_hours", FieldType::Decimal)
                .min_value(Decimal::new(1, 1))
                .describe("Estimated hours to complete"),
            FieldDefinition::new("is_urgent", FieldType::Boolean)
                .default_value(json!(false)),
        ],
    )?
    .with_title("Task")
    .with_description("Task and project management"))
}

/// Registry holding the builtin catalog, in a fixed order.
pub fn builtin_registry() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new();
    registry.register(product_schema()?)?;
    registry.register(customer_schema()?)?;
    registry.register(task_schema()?)?;
    Ok(registry)
}
