use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use tuniport_api::{app, AppState};
use tuniport_catalog::PricingConfig;
use tuniport_core::{Account, ClassType, Flight, FlightStatus, ReservationRules, Seat};
use tuniport_store::InMemoryRepository;
use uuid::Uuid;

struct TestApp {
    router: Router,
    flight_id: Uuid,
    user_id: Uuid,
}

/// 2 business + 6 economy seats, 500 TND on the client's account
fn test_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let now = Utc::now();
    let plane_id = Uuid::new_v4();
    let flight = Flight {
        id: Uuid::new_v4(),
        flight_number: "TU512".to_string(),
        origin: "TUN".to_string(),
        destination: "MRS".to_string(),
        departure_time: now + Duration::days(7),
        arrival_time: now + Duration::days(7) + Duration::hours(2),
        plane_id,
        base_price: 100_000,
        status: FlightStatus::Scheduled,
    };
    repo.add_flight(flight.clone());
    for (number, class_type) in [
        ("1A", ClassType::Business),
        ("1C", ClassType::Business),
        ("5A", ClassType::Economy),
        ("5B", ClassType::Economy),
        ("5C", ClassType::Economy),
        ("6A", ClassType::Economy),
        ("6B", ClassType::Economy),
        ("6C", ClassType::Economy),
    ] {
        repo.add_seat(Seat {
            id: Uuid::new_v4(),
            plane_id,
            seat_number: number.to_string(),
            class_type,
        });
    }
    let user_id = Uuid::new_v4();
    repo.add_account(Account { user_id, balance: 500_000, updated_at: now });

    let state = AppState::new(repo, PricingConfig::default(), ReservationRules::default());
    TestApp {
        router: app(state),
        flight_id: flight.id,
        user_id,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn reservation_body(t: &TestApp, class_type: &str, fare_type: &str, passengers: u32) -> Value {
    json!({
        "user_id": t.user_id,
        "flight_id": t.flight_id,
        "class_type": class_type,
        "fare_type": fare_type,
        "passengers": passengers,
    })
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let response = t
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reserve_then_fetch() {
    let t = test_app();

    let (status, created) = send(
        &t.router,
        "POST",
        "/api/reservations",
        Some(reservation_body(&t, "economy", "comfort", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["total_price"], 260_000);
    assert_eq!(created["status"], "Confirmée");
    assert_eq!(created["currency"], "TND");
    assert_eq!(created["seat_numbers"].as_array().unwrap().len(), 2);

    let id = created["id"].as_str().unwrap().to_string();
    let (status, fetched) = send(&t.router, "GET", &format!("/api/reservations/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["seat_numbers"], created["seat_numbers"]);

    let (_, account) = send(&t.router, "GET", &format!("/api/users/{}/account", t.user_id), None).await;
    assert_eq!(account["balance"], 240_000);

    let (_, seats) = send(&t.router, "GET", &format!("/api/flights/{}/seats", t.flight_id), None).await;
    assert_eq!(seats["economy"]["free"], 4);
    assert_eq!(seats["business"]["free"], 2);

    let (_, listed) = send(&t.router, "GET", &format!("/api/users/{}/reservations", t.user_id), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_refunds_and_frees_seats() {
    let t = test_app();
    let (_, created) = send(
        &t.router,
        "POST",
        "/api/reservations",
        Some(reservation_body(&t, "business", "comfort", 1)),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(&t.router, "POST", &format!("/api/reservations/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["refunded"], true);
    assert_eq!(cancelled["refunded_amount"], 260_000);
    assert_eq!(cancelled["reservation"]["status"], "Annulée");

    let (_, account) = send(&t.router, "GET", &format!("/api/users/{}/account", t.user_id), None).await;
    assert_eq!(account["balance"], 500_000);
    let (_, seats) = send(&t.router, "GET", &format!("/api/flights/{}/seats", t.flight_id), None).await;
    assert_eq!(seats["business"]["free"], 2);

    let (status, body) = send(&t.router, "POST", &format!("/api/reservations/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already cancelled"));
}

#[tokio::test]
async fn test_error_statuses() {
    let t = test_app();

    // 2 x 260 TND > 500 TND
    let (status, _) = send(
        &t.router,
        "POST",
        "/api/reservations",
        Some(reservation_body(&t, "business", "comfort", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, _) = send(
        &t.router,
        "POST",
        "/api/reservations",
        Some(reservation_body(&t, "economy", "light", 0)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&t.router, "GET", &format!("/api/reservations/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_seat_shortage_is_a_conflict() {
    let t = test_app();
    let (_, request) = send(
        &t.router,
        "POST",
        "/api/request-solde",
        Some(json!({ "user_id": t.user_id, "amount": 1_000_000 })),
    )
    .await;
    let id = request["id"].as_str().unwrap().to_string();
    send(&t.router, "POST", &format!("/api/request-solde/{}/approve", id), None).await;

    // only 2 business seats on board
    let (status, _) = send(
        &t.router,
        "POST",
        "/api/reservations",
        Some(reservation_body(&t, "business", "light", 3)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, account) = send(&t.router, "GET", &format!("/api/users/{}/account", t.user_id), None).await;
    assert_eq!(account["balance"], 1_500_000);
}

#[tokio::test]
async fn test_quote_accepts_camel_case_fields() {
    let t = test_app();
    let body = json!({
        "userId": t.user_id,
        "flightId": t.flight_id,
        "classType": "Business",
        "fareType": "Light",
        "passengers": 2,
    });

    let (status, quote) = send(&t.router, "POST", "/api/reservations/quote", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["unit_price"], 200_000);
    assert_eq!(quote["total"], 400_000);
    assert_eq!(quote["currency"], "TND");

    let (_, account) = send(&t.router, "GET", &format!("/api/users/{}/account", t.user_id), None).await;
    assert_eq!(account["balance"], 500_000);
}

#[tokio::test]
async fn test_balance_request_flow() {
    let t = test_app();

    let (status, request) = send(
        &t.router,
        "POST",
        "/api/request-solde",
        Some(json!({ "user_id": t.user_id, "amount": 150_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "PENDING");

    let id = request["id"].as_str().unwrap().to_string();
    let (status, approved) = send(&t.router, "POST", &format!("/api/request-solde/{}/approve", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "APPROVED");

    let (_, account) = send(&t.router, "GET", &format!("/api/users/{}/account", t.user_id), None).await;
    assert_eq!(account["balance"], 650_000);

    let (status, _) = send(&t.router, "POST", &format!("/api/request-solde/{}/reject", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &t.router,
        "POST",
        "/api/request-solde",
        Some(json!({ "user_id": t.user_id, "amount": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_a_json_400() {
    let t = test_app();

    let (status, body) = send(
        &t.router,
        "POST",
        "/api/reservations",
        Some(reservation_body(&t, "first", "light", 1)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(
        &t.router,
        "POST",
        "/api/reservations/quote",
        Some(json!({ "user_id": t.user_id, "passengers": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&t.router, "POST", "/api/request-solde", Some(json!({ "amount": 10 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
