use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use shared_models::BookingRequestStatus;
use shared_utils::test_utils::{date, time, ClinicFixture};
use slot_availability_cell::router::slot_availability_routes;

fn create_test_app(fixture: &ClinicFixture) -> Router {
    slot_availability_routes(Arc::new(fixture.state()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json_response)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_calendar_normalizes_interval() {
    let fixture = ClinicFixture::new().await;

    let (status, body) = send(create_test_app(&fixture), get("/calendar?interval_minutes=27")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interval_minutes"], 25);
    assert_eq!(body["slots"][0], "08:00");
    assert_eq!(body["slots"][1], "08:25");
}

#[tokio::test]
async fn test_calendar_requires_interval() {
    let fixture = ClinicFixture::new().await;

    let (status, body) = send(create_test_app(&fixture), get("/calendar")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_bookable_slots_for_current_week() {
    let fixture = ClinicFixture::new().await;
    let uri = format!("/departments/{}/slots?date=2025-03-13", fixture.department.id);

    let (status, body) = send(create_test_app(&fixture), get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_open"], true);
    assert_eq!(body["interval_minutes"], 30);
    assert_eq!(body["week_start"], "2025-03-10");
    assert_eq!(body["slots"].as_array().unwrap().len(), 17);
}

#[tokio::test]
async fn test_malformed_date_is_bad_request() {
    let fixture = ClinicFixture::new().await;
    let uri = format!("/departments/{}/slots?date=13-03-2025", fixture.department.id);

    let (status, body) = send(create_test_app(&fixture), get(&uri)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_past_date_is_unprocessable() {
    let fixture = ClinicFixture::new().await;
    let uri = format!("/departments/{}/slots?date=2025-03-03", fixture.department.id);

    let (status, body) = send(create_test_app(&fixture), get(&uri)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "not_available");
}

#[tokio::test]
async fn test_validate_slot_endpoint() {
    let fixture = ClinicFixture::new().await;
    let dept = fixture.department.id;

    let uri = format!("/departments/{}/slots/validate?date=2025-03-13&time=09:30", dept);
    let (status, body) = send(create_test_app(&fixture), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["slot"]["time"], "09:30");

    let uri = format!("/departments/{}/slots/validate?date=2025-03-18&time=09:30", dept);
    let (status, body) = send(create_test_app(&fixture), get(&uri)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "week is not yet open for booking");
}

#[tokio::test]
async fn test_set_week_then_overview() {
    let fixture = ClinicFixture::new().await;
    let dept = fixture.department.id;

    let (status, body) = send(
        create_test_app(&fixture),
        with_json(
            "PUT",
            &format!("/departments/{}/weeks/2025-03-19", dept),
            json!({ "slot_interval_minutes": 12, "is_open": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["week_start_date"], "2025-03-17");
    assert_eq!(body["slot_interval_minutes"], 10);

    let (status, body) = send(
        create_test_app(&fixture),
        get(&format!("/departments/{}/weeks?weeks=2", dept)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_week_start"], "2025-03-10");
    assert_eq!(body["weeks"][1]["is_open"], true);
    assert_eq!(body["weeks"][1]["slot_interval_minutes"], 10);
}

#[tokio::test]
async fn test_set_week_conflict_is_409() {
    let fixture = ClinicFixture::new().await;
    fixture
        .add_booking_request(date(2025, 3, 12), time(9, 0), BookingRequestStatus::Confirmed)
        .await;

    let (status, body) = send(
        create_test_app(&fixture),
        with_json(
            "PUT",
            &format!("/departments/{}/weeks/2025-03-10", fixture.department.id),
            json!({ "slot_interval_minutes": 30, "is_open": false }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn test_unknown_department_is_bad_request() {
    let fixture = ClinicFixture::new().await;
    let uri = format!("/departments/{}/slots?date=2025-03-13", Uuid::new_v4());

    let (status, _) = send(create_test_app(&fixture), get(&uri)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expire_endpoint_reports_cancelled_requests() {
    let fixture = ClinicFixture::new().await;
    let request = fixture
        .add_booking_request(date(2025, 3, 12), time(15, 0), BookingRequestStatus::Pending)
        .await;

    let (status, body) = send(
        create_test_app(&fixture),
        with_json("POST", "/booking-requests/expire", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled_count"], 1);
    assert_eq!(body["cancelled"][0]["id"], request.id.to_string());
    assert_eq!(body["cancelled"][0]["status"], "cancelled");
}
