//! In-memory tracking store for tests
//!
//! `begin` snapshots the whole state and `commit` swaps it back, so a dropped
//! transaction leaves nothing behind. Faults can be injected per shipment.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::error::HandoverError;
use super::status::HandoverStatus;
use super::store::{DisplayLookup, TrackingStore};
use super::types::{
    ActivityNames, BundleActors, NewBundle, NewEvent, NewTracking, ShipmentDetail, TrackingEvent,
    TrackingRecord, TrackingUpdate,
};

#[derive(Debug, Clone)]
pub struct MemShipment {
    pub document_no: String,
    pub customer_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub in_tracking: bool,
}

#[derive(Debug, Clone)]
pub struct MemBundle {
    pub id: i64,
    pub header: NewBundle,
    /// (line_no, tracking_id)
    pub lines: Vec<(i32, i64)>,
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    next_id: i64,
    pub shipments: BTreeMap<i64, MemShipment>,
    pub tracking: BTreeMap<i64, TrackingRecord>,
    pub events: Vec<TrackingEvent>,
    pub bundles: Vec<MemBundle>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn active_for(&self, shipment_id: i64) -> Option<&TrackingRecord> {
        self.tracking
            .values()
            .find(|r| r.shipment_id == shipment_id && r.is_active)
    }

    fn latest_event_index(&self, tracking_id: i64, event_type: Option<HandoverStatus>) -> Option<usize> {
        self.events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.tracking_id == Some(tracking_id))
            .filter(|(_, e)| event_type.is_none_or(|t| e.event_type == t))
            .max_by_key(|(_, e)| (e.created_at, e.id))
            .map(|(i, _)| i)
    }
}

pub struct MemoryTx {
    state: MemoryState,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    users: Mutex<HashMap<i64, String>>,
    customers: Mutex<HashMap<i64, String>>,
    fail_apply_for: Mutex<Option<i64>>,
    fail_lookup: Mutex<bool>,
    bundle_numbers_taken: Mutex<bool>,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shipment(&self, shipment_id: i64, customer_id: Option<i64>, driver_id: Option<i64>) {
        self.state.lock().unwrap().shipments.insert(
            shipment_id,
            MemShipment {
                document_no: format!("SJ-{shipment_id}"),
                customer_id,
                driver_id,
                in_tracking: false,
            },
        );
    }

    pub fn add_user(&self, user_id: i64, name: &str) {
        self.users.lock().unwrap().insert(user_id, name.to_string());
    }

    pub fn add_customer(&self, customer_id: i64, name: &str) {
        self.customers
            .lock()
            .unwrap()
            .insert(customer_id, name.to_string());
    }

    /// Make `apply_transition` fail for this shipment
    pub fn fail_apply_for(&self, shipment_id: i64) {
        *self.fail_apply_for.lock().unwrap() = Some(shipment_id);
    }

    /// Report every bundle document number as already taken
    pub fn take_all_bundle_numbers(&self) {
        *self.bundle_numbers_taken.lock().unwrap() = true;
    }

    /// Make every `DisplayLookup` call fail
    pub fn fail_lookups(&self) {
        *self.fail_lookup.lock().unwrap() = true;
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn active(&self, shipment_id: i64) -> Option<TrackingRecord> {
        self.state.lock().unwrap().active_for(shipment_id).cloned()
    }

    pub fn events_of(&self, shipment_id: i64) -> Vec<TrackingEvent> {
        let state = self.state.lock().unwrap();
        let Some(record) = state.active_for(shipment_id) else {
            return Vec::new();
        };
        state
            .events
            .iter()
            .filter(|e| e.tracking_id == Some(record.id))
            .cloned()
            .collect()
    }

    fn check_lookup(&self) -> Result<(), HandoverError> {
        if *self.fail_lookup.lock().unwrap() {
            return Err(HandoverError::Database("injected lookup failure".into()));
        }
        Ok(())
    }

    fn user_name(&self, user_id: Option<i64>) -> Option<String> {
        user_id.and_then(|id| self.users.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, HandoverError> {
        Ok(MemoryTx {
            state: self.state.lock().unwrap().clone(),
        })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), HandoverError> {
        *self.state.lock().unwrap() = tx.state;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_tracking(
        &self,
        tx: &mut Self::Tx,
        new: &NewTracking,
    ) -> Result<TrackingRecord, HandoverError> {
        if tx.state.active_for(new.shipment_id).is_some() {
            return Err(HandoverError::AlreadyTracked(new.shipment_id));
        }
        let now = Utc::now();
        let record = TrackingRecord {
            id: tx.state.next_id(),
            shipment_id: new.shipment_id,
            status: new.status,
            vehicle_id: None,
            driver_id: None,
            current_customer_id: None,
            is_active: true,
            created_at: now,
            created_by: new.actor_id,
            updated_at: now,
            updated_by: new.actor_id,
            prev_actor_id: None,
        };
        tx.state.tracking.insert(record.id, record.clone());
        Ok(record)
    }

    async fn mark_in_tracking(
        &self,
        tx: &mut Self::Tx,
        shipment_id: i64,
        in_tracking: bool,
    ) -> Result<(), HandoverError> {
        if let Some(shipment) = tx.state.shipments.get_mut(&shipment_id) {
            shipment.in_tracking = in_tracking;
        }
        Ok(())
    }

    async fn lock_active_by_shipments(
        &self,
        tx: &mut Self::Tx,
        shipment_ids: &[i64],
    ) -> Result<Vec<TrackingRecord>, HandoverError> {
        Ok(tx
            .state
            .tracking
            .values()
            .filter(|r| r.is_active && shipment_ids.contains(&r.shipment_id))
            .cloned()
            .collect())
    }

    async fn lock_active_for_checkin(
        &self,
        tx: &mut Self::Tx,
        driver_id: i64,
        customer_id: i64,
        status: HandoverStatus,
    ) -> Result<Vec<TrackingRecord>, HandoverError> {
        let shipments = &tx.state.shipments;
        let mut found: Vec<TrackingRecord> = tx
            .state
            .tracking
            .values()
            .filter(|r| r.is_active && r.status == status)
            .filter(|r| {
                shipments.get(&r.shipment_id).is_some_and(|s| {
                    (s.driver_id == Some(driver_id) || r.driver_id == Some(driver_id))
                        && s.customer_id == Some(customer_id)
                })
            })
            .cloned()
            .collect();
        found.sort_by_key(|r| r.shipment_id);
        Ok(found)
    }

    async fn lock_by_shipment(
        &self,
        tx: &mut Self::Tx,
        shipment_id: i64,
    ) -> Result<Option<TrackingRecord>, HandoverError> {
        Ok(tx.state.active_for(shipment_id).cloned())
    }

    async fn apply_transition(
        &self,
        tx: &mut Self::Tx,
        update: &TrackingUpdate,
    ) -> Result<(), HandoverError> {
        if *self.fail_apply_for.lock().unwrap() == Some(update.shipment_id) {
            return Err(HandoverError::Database("injected update failure".into()));
        }
        let record = tx
            .state
            .tracking
            .get_mut(&update.tracking_id)
            .ok_or(HandoverError::TrackingNotFound(update.shipment_id))?;
        record.status = update.status;
        record.vehicle_id = update.vehicle_id;
        record.driver_id = update.driver_id;
        record.current_customer_id = update.current_customer_id;
        record.prev_actor_id = Some(update.prev_actor_id);
        record.updated_by = update.current_actor_id;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_event(
        &self,
        tx: &mut Self::Tx,
        event: &NewEvent,
    ) -> Result<Option<i64>, HandoverError> {
        let taken = *self.bundle_numbers_taken.lock().unwrap()
            || tx
                .state
                .bundles
                .iter()
                .any(|b| b.header.document_no == bundle.document_no);
        if taken {
            return Ok(None);
        }
        let id = tx.state.next_id();
        tx.state.events.push(TrackingEvent {
            id,
            tracking_id: event.tracking_id,
            event_type: event.event_type,
            prev_actor_id: event.prev_actor_id,
            current_actor_id: event.current_actor_id,
            notes: event.notes.clone(),
            driver_id: event.driver_id,
            vehicle_id: event.vehicle_id,
            current_customer_id: event.current_customer_id,
            created_at: Utc::now(),
            prev_created_at: event.prev_created_at,
        });
        Ok(id)
    }

    async fn create_bundle(
        &self,
        tx: &mut Self::Tx,
        bundle: &NewBundle,
        tracking_ids: &[i64],
    ) -> Result<i64, HandoverError> {
        let id = tx.state.next_id();
        tx.state.bundles.push(MemBundle {
            id,
            header: bundle.clone(),
            lines: tracking_ids
                .iter()
                .enumerate()
                .map(|(i, t)| ((i as i32 + 1) * 10, *t))
                .collect(),
            attachment: None,
        });
        Ok(Some(id))
    }

    async fn delete_latest_event_of_type(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
        event_type: HandoverStatus,
    ) -> Result<bool, HandoverError> {
        match tx.state.latest_event_index(tracking_id, Some(event_type)) {
            Some(idx) => {
                tx.state.events.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn latest_event(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
    ) -> Result<Option<TrackingEvent>, HandoverError> {
        Ok(tx
            .state
            .latest_event_index(tracking_id, None)
            .map(|idx| tx.state.events[idx].clone()))
    }

    async fn restore_status(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
        status: HandoverStatus,
        holder: &TrackingEvent,
    ) -> Result<(), HandoverError> {
        if let Some(record) = tx.state.tracking.get_mut(&tracking_id) {
            record.status = status;
            record.updated_by = holder.current_actor_id;
            record.updated_at = holder.created_at;
            record.prev_actor_id = holder.prev_actor_id;
            record.driver_id = holder.driver_id;
            record.vehicle_id = holder.vehicle_id;
            record.current_customer_id = holder.current_customer_id;
        }
        Ok(())
    }

    async fn hard_delete(&self, tx: &mut Self::Tx, tracking_id: i64) -> Result<(), HandoverError> {
        tx.state
            .events
            .retain(|e| e.tracking_id != Some(tracking_id));
        tx.state.tracking.remove(&tracking_id);
        Ok(())
    }
}

#[async_trait]
impl DisplayLookup for MemoryStore {
    async fn shipment_details(
        &self,
        shipment_ids: &[i64],
        driver_id: Option<i64>,
    ) -> Result<Vec<ShipmentDetail>, HandoverError> {
        self.check_lookup()?;
        let state = self.snapshot();
        let mut details: Vec<ShipmentDetail> = shipment_ids
            .iter()
            .filter_map(|id| {
                let shipment = state.shipments.get(id)?;
                let record = state.active_for(*id);
                let record_driver = record.and_then(|r| r.driver_id);
                if driver_id.is_some() && record_driver != driver_id {
                    return None;
                }
                Some(ShipmentDetail {
                    shipment_id: *id,
                    document_no: shipment.document_no.clone(),
                    customer_name: shipment
                        .customer_id
                        .and_then(|c| self.customers.lock().unwrap().get(&c).cloned())
                        .unwrap_or_default(),
                    driver_name: self
                        .user_name(record_driver.or(shipment.driver_id))
                        .unwrap_or_default(),
                    vehicle_name: record
                        .and_then(|r| r.vehicle_id)
                        .map(|v| format!("B {v}"))
                        .unwrap_or_default(),
                    movement_date: None,
                })
            })
            .collect();
        details.sort_by(|a, b| a.document_no.cmp(&b.document_no));
        Ok(details)
    }

    async fn bundle_actors(&self, document_no: &str) -> Result<BundleActors, HandoverError> {
        self.check_lookup()?;
        let state = self.snapshot();
        let bundle = state
            .bundles
            .iter()
            .find(|b| b.header.document_no == document_no)
            .ok_or_else(|| HandoverError::System(format!("no actors for bundle {document_no}")))?;
        let event = state
            .events
            .iter()
            .filter(|e| {
                e.event_type == bundle.header.bundle_type
                    && bundle.lines.iter().any(|(_, t)| e.tracking_id == Some(*t))
            })
            .max_by_key(|e| (e.created_at, e.id))
            .ok_or_else(|| HandoverError::System(format!("no actors for bundle {document_no}")))?;
        Ok(BundleActors {
            prev_actor_name: self
                .user_name(event.prev_actor_id)
                .unwrap_or_else(|| "System".to_string()),
            current_actor_name: self
                .user_name(Some(event.current_actor_id))
                .unwrap_or_else(|| "System".to_string()),
            handover_time: event.prev_created_at,
            receive_time: Some(event.created_at),
        })
    }

    async fn activity_names(
        &self,
        driver_id: i64,
        customer_id: Option<i64>,
    ) -> Result<Option<ActivityNames>, HandoverError> {
        self.check_lookup()?;
        let Some(driver_name) = self.user_name(Some(driver_id)) else {
            return Ok(None);
        };
        let customer_name = customer_id
            .and_then(|c| self.customers.lock().unwrap().get(&c).cloned())
            .unwrap_or_else(|| "-".to_string());
        Ok(Some(ActivityNames {
            driver_name,
            customer_name,
        }))
    }

    async fn set_bundle_attachment(
        &self,
        document_no: &str,
        path: &str,
    ) -> Result<(), HandoverError> {
        self.check_lookup()?;
        let mut state = self.state.lock().unwrap();
        if let Some(bundle) = state
            .bundles
            .iter_mut()
            .find(|b| b.header.document_no == document_no)
        {
            bundle.attachment = Some(path.to_string());
        }
        Ok(())
    }
}
