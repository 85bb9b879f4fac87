#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use metaforge::auth::{issue_token, AccessLevel, Claims};
use metaforge::config;
use metaforge::engine::Engine;
use metaforge::schema::builtin::builtin_registry;

/// In-process application router backed by a lazy pool that never
/// connects. Exercises everything the handlers decide before touching
/// storage: auth gating, payload validation, filter and pagination
/// checks, schema introspection.
pub fn test_router() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost:1/unused")
        .expect("lazy pool");
    let engine = Engine::compile(builtin_registry().expect("builtin catalog"), pool)
        .expect("engine compile");
    engine.router()
}

fn secret() -> &'static str {
    &config::config().security.jwt_secret
}

pub fn token(access: AccessLevel) -> String {
    let claims = Claims::new("tester", access);
    issue_token(&claims, secret()).expect("issue token")
}

pub fn expired_token() -> String {
    let now = chrono::Utc::now().timestamp();
    // Far enough in the past to defeat the default validation leeway.
    let claims = Claims {
        sub: "tester".to_string(),
        access: AccessLevel::Root,
        exp: now - 600,
        iat: now - 7200,
    };
    issue_token(&claims, secret()).expect("issue token")
}

pub fn request(
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Like `request` but with a verbatim body, for payloads that are not
/// valid JSON.
pub fn raw_request(method: &str, uri: &str, bearer: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.expect("infallible")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("JSON body")
}
