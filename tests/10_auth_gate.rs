mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{body_json, expired_token, raw_request, request, send, test_router, token};
use metaforge::auth::AccessLevel;

#[tokio::test]
async fn product_write_without_token_is_unauthorized() {
    let app = test_router();
    let res = send(
        &app,
        request("POST", "/api/v1/product/", None, Some(json!({"name": "W", "price": 1}))),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(res).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn customer_read_without_token_is_unauthorized() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/customer/", None, None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn read_token_cannot_write() {
    let app = test_router();
    let read = token(AccessLevel::Read);
    let res = send(
        &app,
        request(
            "POST",
            "/api/v1/product/",
            Some(&read),
            Some(json!({"name": "W", "price": 1})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = body_json(res).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn read_token_cannot_delete() {
    let app = test_router();
    let read = token(AccessLevel::Read);
    let res = send(
        &app,
        request(
            "DELETE",
            "/api/v1/product/6dbcba92-6f46-4ba5-bfdf-3e2e38d27a77",
            Some(&read),
            None,
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let app = test_router();
    let stale = expired_token();
    let res = send(&app, request("GET", "/api/v1/customer/", Some(&stale), None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(res).await;
    assert!(body["message"].as_str().unwrap_or_default().contains("expired"));
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = test_router();
    let res = send(
        &app,
        request("GET", "/api/v1/customer/", Some("not.a.token"), None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn basic_scheme_is_rejected() {
    let app = test_router();
    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/customer/")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gate_runs_before_validation() {
    // A payload that would fail validation still yields 401 when the
    // credential is missing.
    let app = test_router();
    let res = send(
        &app,
        request("POST", "/api/v1/customer/", None, Some(json!({"bogus": 1}))),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gate_runs_before_body_parsing() {
    // A body that is not even JSON still yields 401, not a parse error.
    let app = test_router();
    let res = send(
        &app,
        raw_request("POST", "/api/v1/product/", None, "{not json"),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(res).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn read_token_with_malformed_body_is_forbidden() {
    let app = test_router();
    let read = token(AccessLevel::Read);
    let res = send(
        &app,
        raw_request("PUT", "/api/v1/product/6dbcba92-6f46-4ba5-bfdf-3e2e38d27a77", Some(&read), "{not json"),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_schema_path_is_not_found() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/order/", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
