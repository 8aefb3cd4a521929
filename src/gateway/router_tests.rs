//! Router tests driven through `oneshot` with stub services

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::auth::{Claims, JwtVerifier};
use super::build_router;
use super::state::AppState;
use crate::handover::types::TrackingEvent;
use crate::handover::{
    CancelOutcome, EffectStatsSnapshot, HandoverError, HandoverOutcome, HandoverRequest,
    HandoverService, HandoverStatus,
};
use crate::shipment::{
    DateRange, DriverVehicleEdit, EditOutcome, OutstandingShipment, OutstandingStage,
    ShipmentError, ShipmentQueries,
};

const SECRET: &str = "router-test-secret";

#[derive(Default)]
struct StubHandover {
    requests: Mutex<Vec<HandoverRequest>>,
    fail_with: Mutex<Option<HandoverError>>,
}

impl StubHandover {
    fn fail_with(&self, err: HandoverError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    fn outcome(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        let outcome = HandoverOutcome {
            status: req.target_status,
            processed: req.shipment_ids.len(),
            shipment_ids: req.shipment_ids.clone(),
            bundle_no: None,
        };
        self.requests.lock().unwrap().push(req);
        Ok(outcome)
    }
}

#[async_trait]
impl HandoverService for StubHandover {
    async fn init(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        self.outcome(req)
    }

    async fn process(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        self.outcome(req)
    }

    async fn cancel_outstanding(
        &self,
        shipment_id: i64,
        current_status: HandoverStatus,
    ) -> Result<CancelOutcome, HandoverError> {
        if current_status.cancellation().is_none() {
            return Err(HandoverError::NotCancellable(current_status));
        }
        Ok(CancelOutcome {
            shipment_id,
            cancelled_status: current_status,
            deleted: current_status == HandoverStatus::DelToDpk,
            restored_status: None,
            restored_actor_id: None,
        })
    }

    fn side_effect_stats(&self) -> EffectStatsSnapshot {
        EffectStatsSnapshot {
            enqueued: 3,
            completed: 2,
            failed: 1,
            dropped: 0,
        }
    }
}

#[derive(Default)]
struct StubShipments {
    ranges: Mutex<Vec<(OutstandingStage, DateRange)>>,
}

#[async_trait]
impl ShipmentQueries for StubShipments {
    async fn outstanding(
        &self,
        stage: OutstandingStage,
        range: DateRange,
    ) -> Result<Vec<OutstandingShipment>, ShipmentError> {
        self.ranges.lock().unwrap().push((stage, range));
        Ok(vec![OutstandingShipment {
            shipment_id: 101,
            document_no: "SJ-101".into(),
            movement_date: NaiveDate::from_ymd_opt(2026, 3, 9),
            customer_name: "Toko Maju".into(),
            status: HandoverStatus::DpkToDriver,
            driver_name: Some("Budi".into()),
            vehicle_name: None,
        }])
    }

    async fn events(&self, shipment_id: i64) -> Result<Vec<TrackingEvent>, ShipmentError> {
        if shipment_id != 101 {
            return Err(ShipmentError::NotTracked(shipment_id));
        }
        Ok(vec![TrackingEvent {
            id: 1,
            tracking_id: Some(11),
            event_type: HandoverStatus::DelToDpk,
            prev_actor_id: None,
            current_actor_id: 5,
            notes: None,
            driver_id: None,
            vehicle_id: None,
            current_customer_id: None,
            created_at: Utc::now(),
            prev_created_at: None,
        }])
    }

    async fn edit_driver_vehicle(
        &self,
        edit: DriverVehicleEdit,
    ) -> Result<EditOutcome, ShipmentError> {
        Ok(EditOutcome {
            shipment_id: edit.shipment_id,
            tracking_id: 11,
            events_updated: 1,
        })
    }
}

struct TestApp {
    router: Router,
    handover: Arc<StubHandover>,
    shipments: Arc<StubShipments>,
}

impl TestApp {
    fn new(auth: bool) -> Self {
        let handover = Arc::new(StubHandover::default());
        let shipments = Arc::new(StubShipments::default());
        let mut state = AppState::new(handover.clone(), shipments.clone());
        if auth {
            state = state.with_jwt(JwtVerifier::new(SECRET));
        }
        Self {
            router: build_router(Arc::new(state), &[]),
            handover,
            shipments,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }
}

fn token(secret: &str) -> String {
    let now = Utc::now().timestamp();
    encode(
        &Header::default(),
        &Claims {
            sub: "5".into(),
            exp: (now + 600) as usize,
            iat: now as usize,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_queue_stats() {
    let app = TestApp::new(true);
    let (status, body) = app.get("/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["database"], "not_configured");
    assert_eq!(body["data"]["side_effects"]["failed"], 1);
}

// ============================================================================
// Handover
// ============================================================================

#[tokio::test]
async fn test_init_parses_body_into_request() {
    let app = TestApp::new(false);
    let (status, body) = app
        .post(
            "/api/v1/handover/init",
            json!({
                "shipment_ids": [101, 102],
                "target_status": "HO: DEL_TO_DPK",
                "user_id": 5,
                "notes": "  "
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], 2);
    assert_eq!(body["data"]["status"], "HO: DEL_TO_DPK");

    let requests = app.handover.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target_status, HandoverStatus::DelToDpk);
    assert_eq!(requests[0].user_id, 5);
    assert_eq!(requests[0].notes, None);
}

#[tokio::test]
async fn test_process_accepts_bare_status_and_driver_fields() {
    let app = TestApp::new(false);
    let (status, _) = app
        .post(
            "/api/v1/handover/process",
            json!({
                "shipment_ids": [],
                "target_status": "driver_checkin",
                "driver_id": 7,
                "vehicle_id": 30,
                "customer_id": 9,
                "user_id": 7
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let requests = app.handover.requests.lock().unwrap();
    assert_eq!(requests[0].target_status, HandoverStatus::DriverCheckin);
    assert_eq!(requests[0].vehicle_id, Some(30));
    assert_eq!(requests[0].customer_id, Some(9));
}

#[tokio::test]
async fn test_bad_bodies_are_rejected_with_400() {
    let app = TestApp::new(false);

    let (status, body) = app
        .post(
            "/api/v1/handover/init",
            json!({"shipment_ids": [1], "target_status": "HO: NOWHERE", "user_id": 5}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);

    let (status, _) = app
        .post(
            "/api/v1/handover/init",
            json!({"shipment_ids": [1], "target_status": "HO: DEL_TO_DPK", "user_id": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Request::post("/api/v1/handover/process")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);
    assert!(app.handover.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_domain_errors_map_to_http_status() {
    let app = TestApp::new(false);
    app.handover.fail_with(HandoverError::NotInitialized(102));
    let (status, body) = app
        .post(
            "/api/v1/handover/process",
            json!({"shipment_ids": [102], "target_status": "RE: DPK_FROM_DEL", "user_id": 6}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4009);
    assert!(body["msg"].as_str().unwrap().contains("102"));

    app.handover
        .fail_with(HandoverError::Database("deadlock detected".into()));
    let (status, body) = app
        .post(
            "/api/v1/handover/process",
            json!({"shipment_ids": [102], "target_status": "RE: DPK_FROM_DEL", "user_id": 6}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["msg"].as_str().unwrap().contains("deadlock"));
}

#[tokio::test]
async fn test_cancel_routes() {
    let app = TestApp::new(false);
    let (status, body) = app
        .post(
            "/api/v1/shipments/outstanding/cancel",
            json!({"shipment_id": 101, "current_status": "HO: DEL_TO_DPK"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, body) = app
        .post(
            "/api/v1/shipments/outstanding/cancel",
            json!({"shipment_id": 101, "current_status": "RE: DPK_FROM_DEL"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 4022);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_protected_routes_require_token_when_enabled() {
    let app = TestApp::new(true);
    let body = json!({"shipment_ids": [101], "target_status": "HO: DEL_TO_DPK", "user_id": 5});

    let (status, resp) = app.post("/api/v1/handover/init", body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["code"], 2001);

    let bad = Request::post("/api/v1/handover/init")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token("wrong")))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, resp) = app.send(bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["code"], 2002);

    let good = Request::post("/api/v1/handover/init")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(SECRET)))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = app.send(good).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Shipments
// ============================================================================

#[tokio::test]
async fn test_outstanding_resolves_stage_and_range() {
    let app = TestApp::new(false);
    let (status, body) = app
        .get("/api/v1/shipments/outstanding?stage=dpk&date_from=2026-03-01&date_to=2026-03-31")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["stage"], "dpk");
    assert_eq!(body["data"]["range"]["to"], "2026-04-01");

    let ranges = app.shipments.ranges.lock().unwrap();
    assert_eq!(ranges[0].0, OutstandingStage::Dpk);
    assert_eq!(ranges[0].1.from, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
}

#[tokio::test]
async fn test_outstanding_rejects_unknown_stage() {
    let app = TestApp::new(false);
    let (status, body) = app.get("/api/v1/shipments/outstanding?stage=warehouse").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);
}

#[tokio::test]
async fn test_events_and_edit() {
    let app = TestApp::new(false);
    let (status, body) = app.get("/api/v1/shipments/101/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["event_type"], "HO: DEL_TO_DPK");

    let (status, body) = app.get("/api/v1/shipments/999/events").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4004);

    let (status, body) = app
        .post(
            "/api/v1/shipments/edit/driver-vehicle",
            json!({"shipment_id": 101, "driver_id": 12, "vehicle_id": 44}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events_updated"], 1);
}
