//! Outstanding-handover cancellation
//!
//! Undoes a handover the receiving side has not confirmed. The entry status is
//! removed outright; any later handover is rolled back to its predecessor with
//! custody attributed to whoever held the record before it.

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::engine::{HandoverEngine, log_rollback};
use super::error::HandoverError;
use super::status::{CancelAction, HandoverStatus};
use super::store::TrackingStore;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CancelOutcome {
    pub shipment_id: i64,
    #[schema(value_type = String, example = "HO: DPK_TO_DRIVER")]
    pub cancelled_status: HandoverStatus,
    /// True when the record and its events were removed
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "RE: DPK_FROM_DEL")]
    pub restored_status: Option<HandoverStatus>,
    /// Actor the record is attributed to after the rollback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored_actor_id: Option<i64>,
}

impl<S: TrackingStore> HandoverEngine<S> {
    pub async fn cancel_outstanding(
        &self,
        shipment_id: i64,
        current_status: HandoverStatus,
    ) -> Result<CancelOutcome, HandoverError> {
        let action = current_status
            .cancellation()
            .ok_or(HandoverError::NotCancellable(current_status))?;

        let outcome = match self.cancel_in_tx(shipment_id, current_status, action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_rollback("cancel", &e);
                return Err(e);
            }
        };

        info!(
            shipment_id,
            cancelled = %current_status,
            deleted = outcome.deleted,
            restored_actor = outcome.restored_actor_id,
            "Outstanding handover cancelled"
        );
        Ok(outcome)
    }

    async fn cancel_in_tx(
        &self,
        shipment_id: i64,
        current_status: HandoverStatus,
        action: CancelAction,
    ) -> Result<CancelOutcome, HandoverError> {
        let mut tx = self.store.begin().await?;

        let record = self
            .store
            .lock_by_shipment(&mut tx, shipment_id)
            .await?
            .ok_or(HandoverError::TrackingNotFound(shipment_id))?;
        if record.status != current_status {
            return Err(HandoverError::StatusMismatch {
                shipment_id,
                expected: current_status,
                actual: record.status,
            });
        }

        let outcome = match action {
            CancelAction::HardDelete => {
                self.store.hard_delete(&mut tx, record.id).await?;
                self.store
                    .mark_in_tracking(&mut tx, shipment_id, false)
                    .await?;
                CancelOutcome {
                    shipment_id,
                    cancelled_status: current_status,
                    deleted: true,
                    restored_status: None,
                    restored_actor_id: None,
                }
            }
            CancelAction::RevertTo(previous) => {
                let removed = self
                    .store
                    .delete_latest_event_of_type(&mut tx, record.id, current_status)
                    .await?;
                if !removed {
                    warn!(
                        shipment_id,
                        tracking_id = record.id,
                        status = %current_status,
                        "No event for the cancelled status"
                    );
                }

                let holder = self
                    .store
                    .latest_event(&mut tx, record.id)
                    .await?
                    .ok_or(HandoverError::BrokenAttribution(record.id))?;
                self.store
                    .restore_status(&mut tx, record.id, previous, &holder)
                    .await?;
                CancelOutcome {
                    shipment_id,
                    cancelled_status: current_status,
                    deleted: false,
                    restored_status: Some(previous),
                    restored_actor_id: Some(holder.current_actor_id),
                }
            }
        };

        self.store.commit(tx).await?;
        Ok(outcome)
    }
}
