use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ride_dispatch::api::rest::router;
use ride_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let state = AppState::new(1024, Duration::from_secs(60));
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn patch_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register_user(app: &axum::Router, username: &str, role: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/users",
            json!({ "username": username, "role": role }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["id"].as_str().unwrap().to_string()
}

async fn online_driver(app: &axum::Router, username: &str) -> String {
    let driver_id = register_user(app, username, "Driver").await;

    let response = app
        .clone()
        .oneshot(post_request(&format!("/drivers/{driver_id}/online")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(patch_request(
            &format!("/drivers/{driver_id}/location"),
            json!({ "lat": 52.52, "lng": 13.405 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    driver_id
}

async fn create_order(app: &axum::Router, client_id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "client_id": client_id,
                "pickup": { "lat": 40.71, "lng": -74.00 },
                "pickup_address": "123 Main St"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["orders"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("available_drivers"));
}

#[tokio::test]
async fn register_user_returns_user() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/users",
            json!({
                "username": "alice",
                "role": "Client",
                "phone_number": "+49301234567"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "Client");
    assert_eq!(body["phone_number"], "+49301234567");
    assert!(body["id"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn register_user_empty_username_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/users",
            json!({ "username": "  ", "role": "Driver" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn set_online_creates_profile_and_stamps_timestamp() {
    let app = setup();
    let driver_id = register_user(&app, "dan", "Driver").await;

    let response = app
        .oneshot(post_request(&format!("/drivers/{driver_id}/online")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["online"], true);
    assert_eq!(body["busy"], false);
    assert!(body["last_online_at"].is_string());
    assert!(body["location"].is_null());
}

#[tokio::test]
async fn set_online_is_idempotent() {
    let app = setup();
    let driver_id = register_user(&app, "dan", "Driver").await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_request(&format!("/drivers/{driver_id}/online")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["online"], true);
        assert!(body["last_online_at"].is_string());
    }
}

#[tokio::test]
async fn client_cannot_go_online_as_driver() {
    let app = setup();
    let client_id = register_user(&app, "carla", "Client").await;

    let response = app
        .oneshot(post_request(&format!("/drivers/{client_id}/online")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_location_out_of_range_returns_400() {
    let app = setup();
    let driver_id = register_user(&app, "dan", "Driver").await;

    let response = app
        .oneshot(patch_request(
            &format!("/drivers/{driver_id}/location"),
            json!({ "lat": 91.0, "lng": 0.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_location_boundary_coordinates_succeed() {
    let app = setup();
    let driver_id = register_user(&app, "dan", "Driver").await;

    let response = app
        .oneshot(patch_request(
            &format!("/drivers/{driver_id}/location"),
            json!({ "lat": -90.0, "lng": -180.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["location"]["lat"], -90.0);
    assert_eq!(body["location"]["lng"], -180.0);
}

#[tokio::test]
async fn online_located_driver_is_listed_exactly_once() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;

    let response = app.oneshot(get_request("/drivers/available")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["user_id"], driver_id.as_str());
}

#[tokio::test]
async fn offline_driver_is_not_listed() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;

    let response = app
        .clone()
        .oneshot(post_request(&format!("/drivers/{driver_id}/offline")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/drivers/available")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn create_order_assigns_available_driver() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;
    let client_id = register_user(&app, "carla", "Client").await;

    let order = create_order(&app, &client_id).await;

    assert_eq!(order["status"], "Assigned");
    assert_eq!(order["driver_id"], driver_id.as_str());
    assert!(order["assigned_at"].is_string());

    let response = app
        .oneshot(get_request(&format!("/drivers/{driver_id}/status")))
        .await
        .unwrap();
    let driver = body_json(response).await;
    assert_eq!(driver["busy"], true);
}

#[tokio::test]
async fn create_order_without_drivers_stays_created() {
    let app = setup();
    let client_id = register_user(&app, "carla", "Client").await;

    let order = create_order(&app, &client_id).await;

    assert_eq!(order["status"], "Created");
    assert!(order["driver_id"].is_null());
    assert!(order["assigned_at"].is_null());
}

#[tokio::test]
async fn order_ids_are_sequential() {
    let app = setup();
    let client_id = register_user(&app, "carla", "Client").await;

    let first = create_order(&app, &client_id).await;
    let second = create_order(&app, &client_id).await;

    assert_eq!(first["id"], 1);
    assert_eq!(second["id"], 2);
}

#[tokio::test]
async fn non_client_cannot_create_orders() {
    let app = setup();
    let driver_id = register_user(&app, "dan", "Driver").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "client_id": driver_id,
                "pickup": { "lat": 40.71, "lng": -74.00 }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn complete_order_frees_driver_and_is_terminal() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;
    let client_id = register_user(&app, "carla", "Client").await;

    let order = create_order(&app, &client_id).await;
    let order_id = order["id"].as_u64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/complete"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let completed = body_json(response).await;
    assert_eq!(completed["status"], "Completed");
    assert!(completed["completed_at"].is_string());

    let response = app
        .clone()
        .oneshot(get_request(&format!("/drivers/{driver_id}/status")))
        .await
        .unwrap();
    let driver = body_json(response).await;
    assert_eq!(driver["busy"], false);

    // A second completion hits the state machine wall.
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/complete"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_the_assigned_driver_can_complete() {
    let app = setup();
    online_driver(&app, "dan").await;
    let other_id = register_user(&app, "mallory", "Driver").await;
    let client_id = register_user(&app, "carla", "Client").await;

    let order = create_order(&app, &client_id).await;
    let order_id = order["id"].as_u64().unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/complete"),
            json!({ "driver_id": other_id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn assigning_a_busy_driver_returns_conflict() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;
    let client_id = register_user(&app, "carla", "Client").await;

    let first = create_order(&app, &client_id).await;
    assert_eq!(first["status"], "Assigned");

    // The only driver is now busy, so the second order waits.
    let second = create_order(&app, &client_id).await;
    assert_eq!(second["status"], "Created");
    let second_id = second["id"].as_u64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{second_id}/assign"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(get_request(&format!("/orders/{second_id}")))
        .await
        .unwrap();
    let details = body_json(response).await;
    assert_eq!(details["order"]["status"], "Created");
    assert!(details["order"]["driver_id"].is_null());
}

#[tokio::test]
async fn busy_driver_is_hidden_within_cache_ttl() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;

    // Warm the availability cache.
    let response = app
        .clone()
        .oneshot(get_request("/drivers/available"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(patch_request(
            &format!("/drivers/{driver_id}/busy"),
            json!({ "busy": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/drivers/available")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let app = setup();
    let response = app.oneshot(get_request("/orders/99")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_details_resolve_client_and_driver() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;
    let client_id = register_user(&app, "carla", "Client").await;

    let order = create_order(&app, &client_id).await;
    let order_id = order["id"].as_u64().unwrap();

    let response = app
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let details = body_json(response).await;
    assert_eq!(details["order"]["status"], "Assigned");
    assert_eq!(details["client"]["id"], client_id.as_str());
    assert_eq!(details["client"]["username"], "carla");
    assert_eq!(details["driver"]["user_id"], driver_id.as_str());
}

#[tokio::test]
async fn orders_are_listed_for_client_and_driver() {
    let app = setup();
    let driver_id = online_driver(&app, "dan").await;
    let client_id = register_user(&app, "carla", "Client").await;

    create_order(&app, &client_id).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/users/{client_id}/orders")))
        .await
        .unwrap();
    let client_orders = body_json(response).await;
    assert_eq!(client_orders.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get_request(&format!("/users/{driver_id}/orders")))
        .await
        .unwrap();
    let driver_orders = body_json(response).await;
    assert_eq!(driver_orders.as_array().unwrap().len(), 1);
    assert_eq!(driver_orders[0]["driver_id"], driver_id.as_str());
}
