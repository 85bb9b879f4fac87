mod common;

use axum::http::StatusCode;
use serde_json::Value;

use common::{body_json, request, send, test_router};

#[tokio::test]
async fn root_banner_lists_schema_index() {
    let app = test_router();
    let res = send(&app, request("GET", "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["schemas"], "/api/v1/schemas");
}

#[tokio::test]
async fn describe_all_returns_catalog_in_order() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/schemas", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["product", "customer", "task"]);
}

#[tokio::test]
async fn describe_one_exposes_fields_and_auth() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/schemas/product", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let schema = &body["data"];
    assert_eq!(schema["path"], "/api/v1/product");
    assert_eq!(schema["auth"]["read_public"], true);
    assert_eq!(schema["auth"]["write_protected"], true);

    let price = schema["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "price")
        .expect("price field");
    assert_eq!(price["type"], "decimal");
    assert_eq!(price["required"], true);
    assert_eq!(price["min_value"], Value::String("0.01".to_string()));
}

#[tokio::test]
async fn describe_unknown_schema_is_not_found() {
    let app = test_router();
    let res = send(&app, request("GET", "/api/v1/schemas/order", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = body_json(res).await;
    assert_eq!(body["code"], "NOT_FOUND");
}
