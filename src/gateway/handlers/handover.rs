//! Handover endpoints

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::super::extract::ValidatedJson;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};
use crate::handover::{CancelOutcome, HandoverOutcome, HandoverRequest, HandoverStatus};

/// Body shared by init and process
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct HandoverBody {
    /// May be empty only for check-in and activity-only check-out
    #[serde(default)]
    #[validate(length(max = 500))]
    #[schema(example = json!([101, 102]))]
    pub shipment_ids: Vec<i64>,
    #[validate(length(min = 1))]
    #[schema(example = "HO: DEL_TO_DPK")]
    pub target_status: String,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub customer_id: Option<i64>,
    /// Actor performing the handover
    #[validate(range(min = 1))]
    #[schema(example = 5)]
    pub user_id: i64,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl HandoverBody {
    fn into_request(self) -> Result<HandoverRequest, ApiError> {
        let target_status: HandoverStatus = self
            .target_status
            .parse()
            .map_err(|e: crate::handover::status::UnknownStatus| ApiError::bad_request(e.to_string()))?;
        Ok(HandoverRequest {
            shipment_ids: self.shipment_ids,
            target_status,
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            customer_id: self.customer_id,
            user_id: self.user_id,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelBody {
    #[validate(range(min = 1))]
    pub shipment_id: i64,
    #[validate(length(min = 1))]
    #[schema(example = "HO: DPK_TO_DRIVER")]
    pub current_status: String,
}

/// Start tracking a batch of shipments
#[utoipa::path(
    post,
    path = "/api/v1/handover/init",
    request_body = HandoverBody,
    responses(
        (status = 200, description = "Tracking started", body = HandoverOutcome),
        (status = 400, description = "Empty batch, unknown status or malformed body"),
        (status = 409, description = "Shipment already tracked"),
        (status = 500, description = "Batch rolled back")
    ),
    security(("bearer_jwt" = [])),
    tag = "Handover"
)]
pub async fn init_handover(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<HandoverBody>,
) -> ApiResult<HandoverOutcome> {
    let req = body.into_request()?;
    ok(state.handover.init(req).await?)
}

/// Move a batch to the requested status
#[utoipa::path(
    post,
    path = "/api/v1/handover/process",
    request_body = HandoverBody,
    responses(
        (status = 200, description = "Handover committed", body = HandoverOutcome),
        (status = 400, description = "Missing fields, unknown status or malformed body"),
        (status = 409, description = "Not initialized, no active records or invalid transition"),
        (status = 500, description = "Batch rolled back")
    ),
    security(("bearer_jwt" = [])),
    tag = "Handover"
)]
pub async fn process_handover(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<HandoverBody>,
) -> ApiResult<HandoverOutcome> {
    let req = body.into_request()?;
    ok(state.handover.process(req).await?)
}

/// Undo an outstanding handover
#[utoipa::path(
    post,
    path = "/api/v1/shipments/outstanding/cancel",
    request_body = CancelBody,
    responses(
        (status = 200, description = "Handover cancelled", body = CancelOutcome),
        (status = 400, description = "Unknown status or malformed body"),
        (status = 404, description = "Shipment not tracked"),
        (status = 409, description = "Stored status differs"),
        (status = 422, description = "Status cannot be cancelled")
    ),
    security(("bearer_jwt" = [])),
    tag = "Handover"
)]
pub async fn cancel_outstanding(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CancelBody>,
) -> ApiResult<CancelOutcome> {
    let current_status: HandoverStatus = body
        .current_status
        .parse()
        .map_err(|e: crate::handover::status::UnknownStatus| ApiError::bad_request(e.to_string()))?;
    ok(state
        .handover
        .cancel_outstanding(body.shipment_id, current_status)
        .await?)
}
