//! Tracking store traits
//!
//! `TrackingStore` is the transactional unit-of-work layer: every inner method
//! takes an open transaction and never begins or commits on its own. Standalone
//! callers use the provided wrappers, which own their transaction.
//!
//! `DisplayLookup` serves the detached side-effect workers. Its reads run
//! outside any handover transaction and only see committed data.

use async_trait::async_trait;

use super::error::HandoverError;
use super::status::HandoverStatus;
use super::types::{
    ActivityNames, BundleActors, NewBundle, NewEvent, NewTracking, ShipmentDetail, TrackingEvent,
    TrackingRecord, TrackingUpdate,
};

#[async_trait]
pub trait TrackingStore: Send + Sync + 'static {
    /// Open transaction. Dropping it without `commit` rolls back.
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, HandoverError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), HandoverError>;

    /// Insert an active record at `new.status`
    async fn insert_tracking(
        &self,
        tx: &mut Self::Tx,
        new: &NewTracking,
    ) -> Result<TrackingRecord, HandoverError>;

    /// Set the shipment's `in_tracking` flag
    async fn mark_in_tracking(
        &self,
        tx: &mut Self::Tx,
        shipment_id: i64,
        in_tracking: bool,
    ) -> Result<(), HandoverError>;

    /// Lock the active records of the given shipments (any order)
    async fn lock_active_by_shipments(
        &self,
        tx: &mut Self::Tx,
        shipment_ids: &[i64],
    ) -> Result<Vec<TrackingRecord>, HandoverError>;

    /// Lock the active records a driver holds for a customer at `status`
    ///
    /// A record matches when its shipment is planned for the driver or the
    /// record itself is assigned to the driver, and the shipment belongs to the
    /// customer. Ordered by shipment id.
    async fn lock_active_for_checkin(
        &self,
        tx: &mut Self::Tx,
        driver_id: i64,
        customer_id: i64,
        status: HandoverStatus,
    ) -> Result<Vec<TrackingRecord>, HandoverError>;

    /// Lock the active record of one shipment
    async fn lock_by_shipment(
        &self,
        tx: &mut Self::Tx,
        shipment_id: i64,
    ) -> Result<Option<TrackingRecord>, HandoverError>;

    /// Write the computed next state onto the record
    async fn apply_transition(
        &self,
        tx: &mut Self::Tx,
        update: &TrackingUpdate,
    ) -> Result<(), HandoverError>;

    /// Append to the event log, returning the event id
    async fn insert_event(&self, tx: &mut Self::Tx, event: &NewEvent)
    -> Result<i64, HandoverError>;

    /// Insert a bundle header and one line per tracking id, returning the bundle id.
    /// `None` when `bundle.document_no` is already taken; nothing is written then.
    async fn create_bundle(
        &self,
        tx: &mut Self::Tx,
        bundle: &NewBundle,
        tracking_ids: &[i64],
    ) -> Result<Option<i64>, HandoverError>;

    /// Delete the most recent event of `event_type`; false when none exists
    async fn delete_latest_event_of_type(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
        event_type: HandoverStatus,
    ) -> Result<bool, HandoverError>;

    async fn latest_event(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
    ) -> Result<Option<TrackingEvent>, HandoverError>;

    /// Roll the record back to `status` with the custody snapshot of `holder`,
    /// the event that produced that status
    async fn restore_status(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
        status: HandoverStatus,
        holder: &TrackingEvent,
    ) -> Result<(), HandoverError>;

    /// Remove the record and all of its events
    async fn hard_delete(&self, tx: &mut Self::Tx, tracking_id: i64) -> Result<(), HandoverError>;

    /// Standalone event write (activity-only entries)
    async fn log_activity(&self, event: &NewEvent) -> Result<i64, HandoverError> {
        let mut tx = self.begin().await?;
        let id = self.insert_event(&mut tx, event).await?;
        self.commit(tx).await?;
        Ok(id)
    }
}

#[async_trait]
pub trait DisplayLookup: Send + Sync {
    /// Display rows for the shipments, optionally restricted to one driver
    async fn shipment_details(
        &self,
        shipment_ids: &[i64],
        driver_id: Option<i64>,
    ) -> Result<Vec<ShipmentDetail>, HandoverError>;

    /// Handed-over-by / received-by names of a bundle
    async fn bundle_actors(&self, document_no: &str) -> Result<BundleActors, HandoverError>;

    /// Driver and customer names; `None` when neither is known
    async fn activity_names(
        &self,
        driver_id: i64,
        customer_id: Option<i64>,
    ) -> Result<Option<ActivityNames>, HandoverError>;

    async fn set_bundle_attachment(
        &self,
        document_no: &str,
        path: &str,
    ) -> Result<(), HandoverError>;
}
