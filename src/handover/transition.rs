//! Transition planning
//!
//! Pure functions that validate a handover request and compute the next
//! field values for each resolved record. Nothing here touches storage.

use chrono::{DateTime, Utc};

use super::error::HandoverError;
use super::status::{FieldPolicy, HandoverStatus};
use super::types::{HandoverRequest, TrackingRecord, TrackingUpdate};

/// Remove duplicate ids, keeping the first occurrence order
pub fn dedupe_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Validate an init request before a transaction is opened
pub fn validate_init(req: &HandoverRequest, enforce_prerequisites: bool) -> Result<(), HandoverError> {
    if req.shipment_ids.is_empty() {
        return Err(HandoverError::EmptyBatch);
    }
    if enforce_prerequisites && req.target_status != HandoverStatus::ENTRY {
        return Err(HandoverError::InvalidEntryStatus {
            expected: HandoverStatus::ENTRY,
            requested: req.target_status,
        });
    }
    Ok(())
}

/// Validate a process request before a transaction is opened
pub fn validate_process(req: &HandoverRequest) -> Result<(), HandoverError> {
    let target = req.target_status;
    match target.field_policy() {
        FieldPolicy::CheckIn => {
            if req.driver_id.is_none() {
                return Err(HandoverError::MissingField("driver_id", target));
            }
            if req.customer_id.is_none() {
                return Err(HandoverError::MissingField("customer_id", target));
            }
            // shipment ids are resolved from the driver/customer pair
            return Ok(());
        }
        FieldPolicy::AssignDriver | FieldPolicy::CheckOut => {
            if req.driver_id.is_none() {
                return Err(HandoverError::MissingField("driver_id", target));
            }
        }
        FieldPolicy::CarryForward => {}
    }
    if req.shipment_ids.is_empty() && !req.is_activity_only() {
        return Err(HandoverError::EmptyBatch);
    }
    Ok(())
}

/// Compute the next state of `record` for `req`
///
/// With `enforce_prerequisites`, the record must currently hold the target's
/// predecessor status.
pub fn plan_transition(
    record: &TrackingRecord,
    req: &HandoverRequest,
    enforce_prerequisites: bool,
) -> Result<TrackingUpdate, HandoverError> {
    let target = req.target_status;
    if enforce_prerequisites && !target.can_follow(record.status) {
        return Err(HandoverError::InvalidTransition {
            shipment_id: record.shipment_id,
            current: record.status,
            target,
        });
    }

    let (vehicle_id, driver_id, current_customer_id) = match target.field_policy() {
        FieldPolicy::CarryForward => (record.vehicle_id, record.driver_id, None),
        FieldPolicy::AssignDriver => (req.vehicle_id, req.driver_id, None),
        FieldPolicy::CheckIn => (req.vehicle_id, req.driver_id, req.customer_id),
        FieldPolicy::CheckOut => (
            req.vehicle_id,
            req.driver_id,
            req.customer_id.or(record.current_customer_id),
        ),
    };

    Ok(TrackingUpdate {
        tracking_id: record.id,
        shipment_id: record.shipment_id,
        status: target,
        vehicle_id,
        driver_id,
        current_customer_id,
        prev_actor_id: record.updated_by,
        current_actor_id: req.user_id,
        prev_created_at: record.created_at,
    })
}

/// Bundle document number: `<prefix>-<unix millis>`
pub fn document_number(status: HandoverStatus, at: DateTime<Utc>) -> String {
    format!("{}-{}", status.document_prefix(), at.timestamp_millis())
}
