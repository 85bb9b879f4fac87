pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::auth::AuthGate;
use crate::crud::CrudService;
use crate::error::ApiError;
use crate::schema::{SchemaDefinition, SchemaRegistry};

use response::{ApiResponse, ApiResult};

/// Shared state for one schema's route set.
#[derive(Clone)]
pub struct RouteContext {
    pub schema: Arc<SchemaDefinition>,
    pub service: Arc<CrudService>,
    pub gate: Arc<AuthGate>,
}

/// Builds the six routes for one schema at the schema's API path. The
/// collection routes answer both with and without the trailing slash,
/// since the spec documents `/api/v1/{schema_name}/`.
pub fn schema_router(ctx: RouteContext) -> Router {
    let prefix = ctx.schema.api_path();
    Router::new()
        .route(&prefix, post(handlers::create).get(handlers::list))
        .route(
            &format!("{}/", prefix),
            post(handlers::create).get(handlers::list),
        )
        .route(&format!("{}/count", prefix), get(handlers::count))
        .route(
            &format!("{}/:id", prefix),
            get(handlers::get_one)
                .put(handlers::update_one)
                .delete(handlers::delete_one),
        )
        .with_state(ctx)
}

/// Read-only introspection routes over the registered schemas.
pub fn describe_router(registry: Arc<SchemaRegistry>) -> Router {
    Router::new()
        .route("/api/v1/schemas", get(describe_all))
        .route("/api/v1/schemas/:name", get(describe_one))
        .with_state(registry)
}

async fn describe_all(State(registry): State<Arc<SchemaRegistry>>) -> ApiResult<Value> {
    let schemas: Vec<Value> = registry
        .all()
        .map(|schema| describe_schema(schema))
        .collect();
    Ok(ApiResponse::success(json!(schemas)))
}

async fn describe_one(
    State(registry): State<Arc<SchemaRegistry>>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    let schema = registry.get(&name).map_err(ApiError::from)?;
    Ok(ApiResponse::success(describe_schema(schema)))
}

fn describe_schema(schema: &SchemaDefinition) -> Value {
    json!({
        "name": schema.name,
        "title": schema.title,
        "description": schema.description,
        "path": schema.api_path(),
        "fields": schema.fields,
        "auth": schema.auth,
    })
}

/// Service banner plus a database liveness probe.
pub fn system_router(pool: PgPool) -> Router {
    Router::new()
        .route("/", get(root_info))
        .route("/health", get(health))
        .with_state(pool)
}

async fn root_info() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "schemas": "/api/v1/schemas",
    })))
}

async fn health(State(pool): State<PgPool>) -> ApiResult<Value> {
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("health check failed: {}", e);
            ApiError::service_unavailable("Database unreachable")
        })?;
    Ok(ApiResponse::success(json!({ "status": "ok" })))
}
