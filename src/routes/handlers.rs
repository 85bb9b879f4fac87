use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::filter::FilterData;
use crate::schema::Operation;

use super::response::{ApiResponse, ApiResult};
use super::RouteContext;

/// Query parameters accepted by list and count. The `where` parameter
/// carries the filter language as a JSON document.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn into_filter(self) -> Result<FilterData, ApiError> {
        let where_clause = match self.where_clause {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                ApiError::bad_request(format!("where must be valid JSON: {}", e))
            })?),
            None => None,
        };
        Ok(FilterData {
            where_clause,
            order: self.order.map(Value::String),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

fn require_object(payload: Value) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

/// Body extraction is deferred past the auth gate: handlers take the
/// `Json` result and unwrap it only after authorization, so malformed
/// bodies still answer 401/403 first and rejections keep the standard
/// error shape.
fn require_json(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

pub async fn create(
    State(ctx): State<RouteContext>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    ctx.gate.authorize(&ctx.schema.auth, Operation::Create, &headers)?;
    let body = require_object(require_json(payload)?)?;
    let record = ctx.service.create(&body).await?;
    Ok(ApiResponse::created(record))
}

pub async fn get_one(
    State(ctx): State<RouteContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    ctx.gate.authorize(&ctx.schema.auth, Operation::Get, &headers)?;
    let record = ctx.service.get(id).await?;
    Ok(ApiResponse::success(record))
}

pub async fn update_one(
    State(ctx): State<RouteContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    ctx.gate.authorize(&ctx.schema.auth, Operation::Update, &headers)?;
    let body = require_object(require_json(payload)?)?;
    let record = ctx.service.update(id, &body).await?;
    Ok(ApiResponse::success(record))
}

pub async fn delete_one(
    State(ctx): State<RouteContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    ctx.gate.authorize(&ctx.schema.auth, Operation::Delete, &headers)?;
    ctx.service.delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}

pub async fn list(
    State(ctx): State<RouteContext>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    ctx.gate.authorize(&ctx.schema.auth, Operation::List, &headers)?;
    let filter = query.into_filter()?;
    let page = ctx.service.list(&filter).await?;
    let has_next = page.offset + (page.items.len() as i64) < page.total;
    Ok(ApiResponse::success(json!({
        "items": page.items,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
        "has_next": has_next,
    })))
}

pub async fn count(
    State(ctx): State<RouteContext>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    ctx.gate.authorize(&ctx.schema.auth, Operation::Count, &headers)?;
    let filter = query.into_filter()?;
    let total = ctx.service.count(&filter).await?;
    Ok(ApiResponse::success(json!({ "count": total })))
}
