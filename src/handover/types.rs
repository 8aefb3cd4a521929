//! Handover Core Types
//!
//! Rows of the tracking tables plus the command/outcome types that flow
//! through the engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::status::HandoverStatus;

/// Tenant columns written on every row (`client_id`, `org_id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    pub client_id: i64,
    pub org_id: i64,
}

impl Default for TenantScope {
    fn default() -> Self {
        Self {
            client_id: 1_000_000,
            org_id: 1_000_000,
        }
    }
}

/// Current custody state of one shipment (`tracking_tb`)
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingRecord {
    pub id: i64,
    pub shipment_id: i64,
    pub status: HandoverStatus,
    pub vehicle_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub current_customer_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: i64,
    /// Actor who held the record before `updated_by`
    pub prev_actor_id: Option<i64>,
}

/// Insert payload for a shipment entering tracking
#[derive(Debug, Clone)]
pub struct NewTracking {
    pub shipment_id: i64,
    pub status: HandoverStatus,
    pub actor_id: i64,
}

/// Next-state fields for one record, computed before any write
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingUpdate {
    pub tracking_id: i64,
    pub shipment_id: i64,
    pub status: HandoverStatus,
    pub vehicle_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub current_customer_id: Option<i64>,
    pub prev_actor_id: i64,
    pub current_actor_id: i64,
    pub prev_created_at: DateTime<Utc>,
}

/// Insert payload for the append-only event log
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// `None` for activity-only entries
    pub tracking_id: Option<i64>,
    pub event_type: HandoverStatus,
    pub prev_actor_id: Option<i64>,
    pub current_actor_id: i64,
    pub notes: Option<String>,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub current_customer_id: Option<i64>,
    pub prev_created_at: Option<DateTime<Utc>>,
}

impl NewEvent {
    /// Event that records a computed transition
    pub fn for_transition(update: &TrackingUpdate, notes: Option<String>) -> Self {
        Self {
            tracking_id: Some(update.tracking_id),
            event_type: update.status,
            prev_actor_id: Some(update.prev_actor_id),
            current_actor_id: update.current_actor_id,
            notes,
            driver_id: update.driver_id,
            vehicle_id: update.vehicle_id,
            current_customer_id: update.current_customer_id,
            prev_created_at: Some(update.prev_created_at),
        }
    }
}

/// Stored event row (`tracking_events_tb`)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrackingEvent {
    pub id: i64,
    pub tracking_id: Option<i64>,
    #[schema(value_type = String, example = "HO: DPK_TO_DRIVER")]
    pub event_type: HandoverStatus,
    pub prev_actor_id: Option<i64>,
    pub current_actor_id: i64,
    pub notes: Option<String>,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub current_customer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub prev_created_at: Option<DateTime<Utc>>,
}

/// Bundle header insert payload (`bundles_tb`)
#[derive(Debug, Clone, PartialEq)]
pub struct NewBundle {
    pub document_no: String,
    pub bundle_type: HandoverStatus,
    pub description: Option<String>,
    pub created_by: i64,
}

/// Handover command, decoupled from the HTTP body
#[derive(Debug, Clone, PartialEq)]
pub struct HandoverRequest {
    pub shipment_ids: Vec<i64>,
    pub target_status: HandoverStatus,
    pub vehicle_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub customer_id: Option<i64>,
    /// Acting user (becomes `updated_by` / `current_actor_id`)
    pub user_id: i64,
    pub notes: Option<String>,
}

impl HandoverRequest {
    pub fn new(shipment_ids: Vec<i64>, target_status: HandoverStatus, user_id: i64) -> Self {
        Self {
            shipment_ids,
            target_status,
            vehicle_id: None,
            driver_id: None,
            customer_id: None,
            user_id,
            notes: None,
        }
    }

    pub fn with_driver(mut self, driver_id: i64, vehicle_id: Option<i64>) -> Self {
        self.driver_id = Some(driver_id);
        self.vehicle_id = vehicle_id;
        self
    }

    pub fn with_customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check-out reported without any documents in hand
    pub fn is_activity_only(&self) -> bool {
        self.target_status == HandoverStatus::DriverCheckout && self.shipment_ids.is_empty()
    }
}

/// Result of a committed handover batch
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HandoverOutcome {
    #[schema(value_type = String, example = "RE: DPK_FROM_DEL")]
    pub status: HandoverStatus,
    /// Number of tracking records written
    pub processed: usize,
    /// Shipment ids in processing order
    pub shipment_ids: Vec<i64>,
    /// Bundle document number, for receipt confirmations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_no: Option<String>,
}

/// Display row for notifications and bundle documents
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentDetail {
    pub shipment_id: i64,
    pub document_no: String,
    pub customer_name: String,
    pub driver_name: String,
    pub vehicle_name: String,
    pub movement_date: Option<NaiveDate>,
}

/// "Handed over by / received by" pair of a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct BundleActors {
    pub prev_actor_name: String,
    pub current_actor_name: String,
    pub handover_time: Option<DateTime<Utc>>,
    pub receive_time: Option<DateTime<Utc>>,
}

impl BundleActors {
    /// Placeholder used when the actor lookup fails
    pub fn unknown() -> Self {
        Self {
            prev_actor_name: "N/A".to_string(),
            current_actor_name: "N/A".to_string(),
            handover_time: None,
            receive_time: Some(Utc::now()),
        }
    }
}

/// Driver and customer display names for an activity-only check-out
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityNames {
    pub driver_name: String,
    pub customer_name: String,
}
