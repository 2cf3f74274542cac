use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tourdesk_api::{app, AppState};
use tourdesk_catalog::{PriceBasis, Route, RouteCatalog, VehicleCatalog};
use tourdesk_order::InMemorySeatLedger;
use tourdesk_shared::{Currency, Money};
use tower::ServiceExt;

fn test_app() -> Router {
    let routes = RouteCatalog::from_entries([Route {
        id: "red-tour".to_string(),
        name: "Cappadocia Red Tour".to_string(),
        duration_minutes: 480,
        base_price: Money::new(12_000, Currency::Eur),
        price_basis: PriceBasis::PerDeparture,
        capacity_override: None,
    }])
    .unwrap();
    let state = AppState::new(
        VehicleCatalog::builtin(),
        routes,
        Arc::new(InMemorySeatLedger::new()),
        "TD",
        64,
    )
    .unwrap();
    app(state)
}

async fn call(app: &Router, method: Method, uri: &str, tenant: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant).header("x-agent-id", "agent-1");
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn draft(vehicle: &str, names: &[&str], seats: &[u32]) -> Value {
    json!({
        "target": { "kind": "route", "route_id": "red-tour", "vehicle_type_id": vehicle },
        "tour_date": "2024-06-01",
        "tour_time": "09:00",
        "group_size": names.len(),
        "passenger_names": names,
        "pickup_location": "Hotel Lykia",
        "currency": "EUR",
        "seat_numbers": seats,
    })
}

#[tokio::test]
async fn test_health_needs_no_context() {
    let app = test_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_context_headers_are_rejected() {
    let app = test_app();
    let (status, body) = call(&app, Method::POST, "/v1/bookings", None, Some(draft("vito", &["A"], &[]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_seat_conflict_reports_contested_seats() {
    let app = test_app();
    let (status, first) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("sprinter", &["A", "B"], &[1, 2]))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "PENDING");
    assert_eq!(first["price"]["amount_minor"], 12_000);

    let (status, body) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("sprinter", &["C"], &[2]))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SEAT_CONFLICT");
    assert_eq!(body["contested_seats"], json!([2]));

    let tour_id = first["target"]["tour_id"].as_str().unwrap();
    let (status, occupancy) = call(&app, Method::GET, &format!("/v1/tours/{}/occupancy", tour_id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(occupancy["occupied"], json!([1, 2]));
    assert_eq!(occupancy["capacity"], 16);
}

#[tokio::test]
async fn test_group_larger_than_vehicle_is_unprocessable() {
    let app = test_app();
    let names = ["A", "B", "C", "D", "E", "F", "G"];
    let (status, body) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &names, &[]))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");
}

#[tokio::test]
async fn test_cancel_then_rebook_same_seats() {
    let app = test_app();
    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("sprinter", &["A", "B"], &[3, 4]))).await;
    let id = booking["id"].as_str().unwrap();

    let (status, cancelled) = call(&app, Method::POST, &format!("/v1/bookings/{}/cancel", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, _) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("sprinter", &["C", "D"], &[3, 4]))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_resize_and_release_orphaned_seats() {
    let app = test_app();
    let (_, booking) = call(
        &app,
        Method::POST,
        "/v1/bookings",
        Some("acme"),
        Some(draft("sprinter", &["A", "B", "C", "D"], &[1, 2, 3, 4])),
    )
    .await;
    let id = booking["id"].as_str().unwrap();
    let tour_id = booking["target"]["tour_id"].as_str().unwrap();

    let (status, resized) = call(&app, Method::POST, &format!("/v1/bookings/{}/resize", id), Some("acme"), Some(json!({ "group_size": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resized["passenger_names"], json!(["A", "B"]));

    let (_, occupancy) = call(&app, Method::GET, &format!("/v1/tours/{}/occupancy", tour_id), Some("acme"), None).await;
    assert_eq!(occupancy["occupied"], json!([1, 2, 3, 4]));

    let (status, _) = call(&app, Method::POST, &format!("/v1/bookings/{}/seats/release-orphaned", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, occupancy) = call(&app, Method::GET, &format!("/v1/tours/{}/occupancy", tour_id), Some("acme"), None).await;
    assert_eq!(occupancy["occupied"], json!([1, 2]));
}

#[tokio::test]
async fn test_seat_assignment_and_release() {
    let app = test_app();
    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &["A"], &[]))).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/seats", id),
        Some("acme"),
        Some(json!({ "passenger_index": 0, "seat_number": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");

    let (status, assigned) = call(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/seats", id),
        Some("acme"),
        Some(json!({ "passenger_index": 0, "seat_number": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["passenger_details"]["6"]["name"], "A");

    let (status, released) = call(&app, Method::DELETE, &format!("/v1/bookings/{}/seats/6", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(released["passenger_details"], json!({}));

    let (status, body) = call(&app, Method::DELETE, &format!("/v1/bookings/{}/seats/6", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_completed_booking_cannot_be_cancelled() {
    let app = test_app();
    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &["A"], &[1]))).await;
    let id = booking["id"].as_str().unwrap();

    let (status, paid) = call(&app, Method::POST, &format!("/v1/bookings/{}/payment", id), Some("acme"), Some(json!({ "payment_status": "PAID" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "CONFIRMED");

    let (status, _) = call(&app, Method::POST, &format!("/v1/bookings/{}/complete", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::POST, &format!("/v1/bookings/{}/cancel", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_bookings_are_tenant_scoped() {
    let app = test_app();
    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &["A"], &[]))).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = call(&app, Method::GET, &format!("/v1/bookings/{}", id), Some("globex"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, fetched) = call(&app, Method::GET, &format!("/v1/bookings/{}", id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], booking["id"]);
}

#[tokio::test]
async fn test_layout_endpoints() {
    let app = test_app();
    let (status, layout) = call(&app, Method::GET, "/v1/layouts/27", Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(layout["seats_per_row"], 4);
    assert_eq!(layout["aisle"], json!({ "after": 1 }));

    let (status, body) = call(&app, Method::GET, "/v1/layouts/0", Some("acme"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &["A"], &[2]))).await;
    let tour_id = booking["target"]["tour_id"].as_str().unwrap();
    let (status, view) = call(&app, Method::GET, &format!("/v1/tours/{}/layout", tour_id), Some("acme"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["occupied"], json!([2]));
    assert_eq!(view["chart"], "[DRV]\n[01] [XX] [03]\n[04] [05] [06]");
}

#[tokio::test]
async fn test_metrics_count_reservations() {
    let app = test_app();
    call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &["A"], &[1]))).await;
    call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("vito", &["B"], &[1]))).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"tourdesk_seat_reservations_total{outcome="committed"} 1"#));
    assert!(text.contains(r#"tourdesk_seat_reservations_total{outcome="conflict"} 1"#));
}

#[tokio::test]
async fn test_passenger_update_rejects_phone_without_seat_and_keeps_name() {
    let app = test_app();
    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("sprinter", &["A", "B"], &[1]))).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{}/passengers/1", id),
        Some("acme"),
        Some(json!({ "name": "Zeynep", "phone": "+90 555 000 11 22" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, fetched) = call(&app, Method::GET, &format!("/v1/bookings/{}", id), Some("acme"), None).await;
    assert_eq!(fetched["passenger_names"], json!(["A", "B"]));

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{}/passengers/0", id),
        Some("acme"),
        Some(json!({ "name": "Ayse", "phone": "+90 555 000 11 22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["passenger_names"], json!(["Ayse", "B"]));
    assert_eq!(updated["passenger_details"]["1"]["name"], "Ayse");
}

#[tokio::test]
async fn test_vehicle_cannot_change_once_seats_are_held() {
    let app = test_app();
    let (_, booking) = call(&app, Method::POST, "/v1/bookings", Some("acme"), Some(draft("sprinter", &["A"], &[10]))).await;
    let tour_id = booking["target"]["tour_id"].as_str().unwrap();

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/v1/tours/{}/vehicle", tour_id),
        Some("acme"),
        Some(json!({ "vehicle_type_id": "vito" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, occupancy) = call(&app, Method::GET, &format!("/v1/tours/{}/occupancy", tour_id), Some("acme"), None).await;
    assert_eq!(occupancy["capacity"], 16);
    assert_eq!(occupancy["occupied"], json!([10]));
}
