//! Shipment list and maintenance endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use chrono::Local;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::super::extract::ValidatedJson;
use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::handover::types::TrackingEvent;
use crate::shipment::{
    DateRange, DriverVehicleEdit, EditOutcome, OutstandingShipment, OutstandingStage,
    ShipmentError,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct OutstandingQuery {
    /// `dpk` or `delivery`
    pub stage: String,
    /// `YYYY-MM-DD`, defaults to the first day of the current month
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OutstandingList {
    pub stage: OutstandingStage,
    pub range: DateRange,
    pub count: usize,
    pub shipments: Vec<OutstandingShipment>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditDriverVehicleBody {
    #[validate(range(min = 1))]
    pub shipment_id: i64,
    #[validate(range(min = 1))]
    pub driver_id: i64,
    pub vehicle_id: Option<i64>,
}

/// Shipments stuck at a stage
#[utoipa::path(
    get,
    path = "/api/v1/shipments/outstanding",
    params(OutstandingQuery),
    responses(
        (status = 200, description = "Outstanding shipments", body = OutstandingList),
        (status = 400, description = "Unknown stage")
    ),
    security(("bearer_jwt" = [])),
    tag = "Shipments"
)]
pub async fn list_outstanding(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OutstandingQuery>,
) -> ApiResult<OutstandingList> {
    let stage: OutstandingStage = query.stage.parse().map_err(ShipmentError::InvalidStage)?;
    let range = DateRange::resolve(
        query.date_from.as_deref(),
        query.date_to.as_deref(),
        Local::now().date_naive(),
    );
    let shipments = state.shipments.outstanding(stage, range).await?;
    ok(OutstandingList {
        stage,
        range,
        count: shipments.len(),
        shipments,
    })
}

/// Event timeline of a tracked shipment
#[utoipa::path(
    get,
    path = "/api/v1/shipments/{shipment_id}/events",
    params(("shipment_id" = i64, Path, description = "Shipment id")),
    responses(
        (status = 200, description = "Events, oldest first", body = Vec<TrackingEvent>),
        (status = 404, description = "Shipment not tracked")
    ),
    security(("bearer_jwt" = [])),
    tag = "Shipments"
)]
pub async fn shipment_events(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<i64>,
) -> ApiResult<Vec<TrackingEvent>> {
    ok(state.shipments.events(shipment_id).await?)
}

/// Correct the driver and vehicle of a handed-over shipment
#[utoipa::path(
    post,
    path = "/api/v1/shipments/edit/driver-vehicle",
    request_body = EditDriverVehicleBody,
    responses(
        (status = 200, description = "Record and assignment events updated", body = EditOutcome),
        (status = 400, description = "Malformed body"),
        (status = 404, description = "Shipment not tracked")
    ),
    security(("bearer_jwt" = [])),
    tag = "Shipments"
)]
pub async fn edit_driver_vehicle(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<EditDriverVehicleBody>,
) -> ApiResult<EditOutcome> {
    let edit = DriverVehicleEdit {
        shipment_id: body.shipment_id,
        driver_id: body.driver_id,
        vehicle_id: body.vehicle_id,
    };
    ok(state.shipments.edit_driver_vehicle(edit).await?)
}
