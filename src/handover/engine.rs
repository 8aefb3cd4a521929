//! Handover Engine
//!
//! Batch orchestration of custody transitions. Each batch runs in a single
//! transaction: records are resolved under row locks, every next state is
//! computed before the first write, and any failure rolls the whole batch back.
//! Follow-up work is queued only after the commit succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use super::cancel::CancelOutcome;
use super::effects::{EffectStatsSnapshot, SideEffect, SideEffectQueue};
use super::error::HandoverError;
use super::status::HandoverStatus;
use super::store::TrackingStore;
use super::transition::{dedupe_ids, document_number, plan_transition, validate_init, validate_process};
use super::types::{
    HandoverOutcome, HandoverRequest, NewBundle, NewEvent, NewTracking, TrackingRecord,
    TrackingUpdate,
};
use crate::config::HandoverConfig;

/// Bundle numbers tried per receipt batch
const DOCUMENT_NO_ATTEMPTS: i64 = 5;

/// Entry points used by the HTTP layer
#[async_trait]
pub trait HandoverService: Send + Sync {
    /// Start tracking a batch of shipments
    async fn init(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError>;

    /// Move a batch to `req.target_status`
    async fn process(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError>;

    /// Undo an outstanding handover of one shipment
    async fn cancel_outstanding(
        &self,
        shipment_id: i64,
        current_status: HandoverStatus,
    ) -> Result<CancelOutcome, HandoverError>;

    fn side_effect_stats(&self) -> EffectStatsSnapshot;
}

pub struct HandoverEngine<S: TrackingStore> {
    pub(super) store: Arc<S>,
    effects: SideEffectQueue,
    enforce_prerequisites: bool,
}

/// Log a failed transactional phase at a level matching its cause
pub(super) fn log_rollback(op: &'static str, err: &HandoverError) {
    if err.http_status() >= 500 {
        error!(op, code = err.code(), error = %err, "Handover rolled back");
    } else {
        warn!(op, code = err.code(), error = %err, "Handover rejected");
    }
}

impl<S: TrackingStore> HandoverEngine<S> {
    pub fn new(store: Arc<S>, effects: SideEffectQueue, config: &HandoverConfig) -> Self {
        Self {
            store,
            effects,
            enforce_prerequisites: config.enforce_prerequisites,
        }
    }

    pub fn effects(&self) -> &SideEffectQueue {
        &self.effects
    }

    /// Create one active record plus its entry event per shipment
    pub async fn init(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        validate_init(&req, self.enforce_prerequisites)?;
        let shipment_ids = dedupe_ids(&req.shipment_ids);

        if let Err(e) = self.init_in_tx(&req, &shipment_ids).await {
            log_rollback("init", &e);
            return Err(e);
        }

        info!(
            status = %req.target_status,
            actor = req.user_id,
            count = shipment_ids.len(),
            "Tracking initialized"
        );
        Ok(HandoverOutcome {
            status: req.target_status,
            processed: shipment_ids.len(),
            shipment_ids,
            bundle_no: None,
        })
    }

    async fn init_in_tx(
        &self,
        req: &HandoverRequest,
        shipment_ids: &[i64],
    ) -> Result<(), HandoverError> {
        let mut tx = self.store.begin().await?;

        let existing = self
            .store
            .lock_active_by_shipments(&mut tx, shipment_ids)
            .await?;
        if let Some(id) = shipment_ids
            .iter()
            .find(|id| existing.iter().any(|r| r.shipment_id == **id))
        {
            return Err(HandoverError::AlreadyTracked(*id));
        }

        for &shipment_id in shipment_ids {
            let record = self
                .store
                .insert_tracking(
                    &mut tx,
                    &NewTracking {
                        shipment_id,
                        status: req.target_status,
                        actor_id: req.user_id,
                    },
                )
                .await?;
            let event = NewEvent {
                tracking_id: Some(record.id),
                event_type: req.target_status,
                prev_actor_id: None,
                current_actor_id: req.user_id,
                notes: req.notes.clone(),
                driver_id: None,
                vehicle_id: None,
                current_customer_id: None,
                prev_created_at: None,
            };
            self.store.insert_event(&mut tx, &event).await?;
            self.store.mark_in_tracking(&mut tx, shipment_id, true).await?;
            debug!(shipment_id, tracking_id = record.id, "Tracking record created");
        }

        self.store.commit(tx).await
    }

    /// General transition entry point
    pub async fn process(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        validate_process(&req)?;
        if req.is_activity_only() {
            return self.log_activity_checkout(&req).await;
        }

        let (updates, bundle_no) = match self.process_in_tx(&req).await {
            Ok(done) => done,
            Err(e) => {
                log_rollback("process", &e);
                return Err(e);
            }
        };
        let shipment_ids: Vec<i64> = updates.iter().map(|u| u.shipment_id).collect();

        info!(
            status = %req.target_status,
            actor = req.user_id,
            count = updates.len(),
            bundle_no = bundle_no.as_deref().unwrap_or("-"),
            "Handover committed"
        );

        self.schedule_effects(&req, &shipment_ids, bundle_no.as_deref());

        Ok(HandoverOutcome {
            status: req.target_status,
            processed: updates.len(),
            shipment_ids,
            bundle_no,
        })
    }

    async fn process_in_tx(
        &self,
        req: &HandoverRequest,
    ) -> Result<(Vec<TrackingUpdate>, Option<String>), HandoverError> {
        let mut tx = self.store.begin().await?;

        let records = self.resolve_records(&mut tx, req).await?;
        let updates = records
            .iter()
            .map(|r| plan_transition(r, req, self.enforce_prerequisites))
            .collect::<Result<Vec<_>, _>>()?;

        for update in &updates {
            self.store.apply_transition(&mut tx, update).await?;
            self.store
                .insert_event(&mut tx, &NewEvent::for_transition(update, req.notes.clone()))
                .await?;
        }

        let bundle_no = if req.target_status.creates_bundle() {
            let tracking_ids: Vec<i64> = updates.iter().map(|u| u.tracking_id).collect();
            Some(self.create_bundle(&mut tx, req, &tracking_ids).await?)
        } else {
            None
        };

        self.store.commit(tx).await?;
        Ok((updates, bundle_no))
    }

    /// Insert the receipt bundle, stepping the number forward while it is taken
    async fn create_bundle(
        &self,
        tx: &mut S::Tx,
        req: &HandoverRequest,
        tracking_ids: &[i64],
    ) -> Result<String, HandoverError> {
        let now = Utc::now();
        for attempt in 0..DOCUMENT_NO_ATTEMPTS {
            let document_no =
                document_number(req.target_status, now + TimeDelta::milliseconds(attempt));
            let bundle = NewBundle {
                document_no: document_no.clone(),
                bundle_type: req.target_status,
                description: req.notes.clone(),
                created_by: req.user_id,
            };
            match self.store.create_bundle(tx, &bundle, tracking_ids).await? {
                Some(bundle_id) => {
                    debug!(bundle_id, %document_no, lines = tracking_ids.len(), "Bundle created");
                    return Ok(document_no);
                }
                None => debug!(%document_no, attempt, "Document number taken"),
            }
        }
        Err(HandoverError::System(format!(
            "no free {} document number after {DOCUMENT_NO_ATTEMPTS} attempts",
            req.target_status.document_prefix()
        )))
    }

    /// Records a batch applies to, in processing order
    async fn resolve_records(
        &self,
        tx: &mut S::Tx,
        req: &HandoverRequest,
    ) -> Result<Vec<TrackingRecord>, HandoverError> {
        if req.target_status == HandoverStatus::DriverCheckin {
            let (Some(driver_id), Some(customer_id)) = (req.driver_id, req.customer_id) else {
                return Err(HandoverError::MissingField("driver_id", req.target_status));
            };
            let records = self
                .store
                .lock_active_for_checkin(tx, driver_id, customer_id, HandoverStatus::DpkToDriver)
                .await?;
            if records.is_empty() {
                return Err(HandoverError::NoActiveRecords {
                    driver_id,
                    customer_id,
                });
            }
            return Ok(records);
        }

        let shipment_ids = dedupe_ids(&req.shipment_ids);
        let mut by_shipment: HashMap<i64, TrackingRecord> = self
            .store
            .lock_active_by_shipments(tx, &shipment_ids)
            .await?
            .into_iter()
            .map(|r| (r.shipment_id, r))
            .collect();

        shipment_ids
            .iter()
            .map(|id| {
                by_shipment
                    .remove(id)
                    .ok_or(HandoverError::NotInitialized(*id))
            })
            .collect()
    }

    /// Check-out without documents: one unlinked event, no record changes
    async fn log_activity_checkout(
        &self,
        req: &HandoverRequest,
    ) -> Result<HandoverOutcome, HandoverError> {
        let driver_id = req
            .driver_id
            .ok_or(HandoverError::MissingField("driver_id", req.target_status))?;
        let event = NewEvent {
            tracking_id: None,
            event_type: req.target_status,
            prev_actor_id: None,
            current_actor_id: req.user_id,
            notes: req.notes.clone(),
            driver_id: Some(driver_id),
            vehicle_id: req.vehicle_id,
            current_customer_id: req.customer_id,
            prev_created_at: None,
        };

        let event_id = match self.store.log_activity(&event).await {
            Ok(id) => id,
            Err(e) => {
                log_rollback("activity_checkout", &e);
                return Err(e);
            }
        };
        info!(event_id, driver_id, "Activity-only checkout logged");

        self.effects.enqueue(SideEffect::ActivityCheckout {
            driver_id,
            customer_id: req.customer_id,
            notes: req.notes.clone(),
        });

        Ok(HandoverOutcome {
            status: req.target_status,
            processed: 0,
            shipment_ids: Vec::new(),
            bundle_no: None,
        })
    }

    fn schedule_effects(
        &self,
        req: &HandoverRequest,
        shipment_ids: &[i64],
        bundle_no: Option<&str>,
    ) {
        if let Some(document_no) = bundle_no {
            self.effects.enqueue(SideEffect::RenderBundle {
                document_no: document_no.to_string(),
                status: req.target_status,
                shipment_ids: shipment_ids.to_vec(),
            });
        }
        if req.target_status.notifies_driver_channel() {
            if let Some(driver_id) = req.driver_id {
                self.effects.enqueue(SideEffect::DriverNotice {
                    status: req.target_status,
                    shipment_ids: shipment_ids.to_vec(),
                    driver_id,
                    notes: req.notes.clone(),
                });
            }
        }
    }
}

#[async_trait]
impl<S: TrackingStore> HandoverService for HandoverEngine<S> {
    async fn init(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        HandoverEngine::init(self, req).await
    }

    async fn process(&self, req: HandoverRequest) -> Result<HandoverOutcome, HandoverError> {
        HandoverEngine::process(self, req).await
    }

    async fn cancel_outstanding(
        &self,
        shipment_id: i64,
        current_status: HandoverStatus,
    ) -> Result<CancelOutcome, HandoverError> {
        HandoverEngine::cancel_outstanding(self, shipment_id, current_status).await
    }

    fn side_effect_stats(&self) -> EffectStatsSnapshot {
        self.effects.stats()
    }
}
