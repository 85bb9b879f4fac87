mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{body_json, request, send, test_router, token};
use metaforge::auth::AccessLevel;

#[tokio::test]
async fn negative_price_is_unprocessable() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        request(
            "POST",
            "/api/v1/product/",
            Some(&edit),
            Some(json!({"name": "Widget", "price": -1})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(res).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["price"]
        .as_str()
        .unwrap_or_default()
        .contains("0.01"));
}

#[tokio::test]
async fn missing_required_fields_reported_per_field() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        request("POST", "/api/v1/product/", Some(&edit), Some(json!({}))),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(res).await;
    assert!(body["field_errors"]["name"].is_string());
    assert!(body["field_errors"]["price"].is_string());
}

#[tokio::test]
async fn unknown_field_is_unprocessable() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        request(
            "POST",
            "/api/v1/product/",
            Some(&edit),
            Some(json!({"name": "W", "price": 1, "color": "red"})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(res).await;
    assert_eq!(body["field_errors"]["color"], "Unknown field");
}

#[tokio::test]
async fn system_field_cannot_be_set() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        request(
            "POST",
            "/api/v1/product/",
            Some(&edit),
            Some(json!({"name": "W", "price": 1, "id": "abc"})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn overlong_name_is_unprocessable() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        request(
            "POST",
            "/api/v1/product/",
            Some(&edit),
            Some(json!({"name": "x".repeat(201), "price": 1})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn non_object_body_is_bad_request() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        request("POST", "/api/v1/product/", Some(&edit), Some(json!([1, 2, 3]))),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_body_is_bad_request_with_error_envelope() {
    let app = test_router();
    let edit = token(AccessLevel::Edit);
    let res = send(
        &app,
        common::raw_request("POST", "/api/v1/product/", Some(&edit), "{not json"),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_record_id_is_bad_request() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/product/not-a-uuid", None, None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_limit_is_bad_request() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/product/?limit=0", None, None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn oversized_limit_is_bad_request() {
    let app = test_router();
    let res = send(
        &app,
        request("GET", "/api/v1/product/?limit=1000001", None, None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn negative_offset_is_bad_request() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/product/?offset=-5", None, None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_filter_column_is_bad_request() {
    let app = test_router();
    let res = send(
        &app,
        request(
            "GET",
            "/api/v1/product/?where=%7B%22bogus%22%3A1%7D",
            None,
            None,
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unparseable_where_is_bad_request() {
    let app = test_router();
    let res = send(
        &app,
        request("GET", "/api/v1/product/?where=not-json", None, None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert!(body["message"].as_str().unwrap_or_default().contains("JSON"));
}

#[tokio::test]
async fn unknown_order_column_is_bad_request() {
    let app = test_router();
    let res = send(
        &app,
        request("GET", "/api/v1/product/?order=bogus%20desc", None, None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn count_validates_filter_too() {
    let app = test_router();
    let res = send(
        &app,
        request(
            "GET",
            "/api/v1/product/count?where=%7B%22bogus%22%3A1%7D",
            None,
            None,
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
