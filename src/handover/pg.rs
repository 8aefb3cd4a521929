//! Tracking Database Layer
//!
//! PostgreSQL implementation of the tracking store. Every record read inside a
//! transition takes a row lock (`FOR UPDATE`).

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::error::HandoverError;
use super::status::HandoverStatus;
use super::store::{DisplayLookup, TrackingStore};
use super::types::{
    ActivityNames, BundleActors, NewBundle, NewEvent, NewTracking, ShipmentDetail, TenantScope,
    TrackingEvent, TrackingRecord, TrackingUpdate,
};
use crate::db::SafeRow;

const TRACKING_COLUMNS: &str = "t.tracking_id, t.shipment_id, t.status, t.vehicle_id, \
     t.driver_id, t.current_customer_id, t.is_active, t.created_at, t.created_by, \
     t.updated_at, t.updated_by, t.prev_actor_id";

pub(crate) const EVENT_COLUMNS: &str = "event_id, tracking_id, event_type, prev_actor_id, \
     current_actor_id, notes, driver_id, vehicle_id, current_customer_id, created_at, \
     prev_created_at";

/// Bundle lines are numbered 10, 20, 30, ...
const LINE_STEP: i32 = 10;

/// Tracking tables on PostgreSQL
#[derive(Clone)]
pub struct PgTrackingStore {
    pool: PgPool,
    tenant: TenantScope,
}

impl PgTrackingStore {
    pub fn new(pool: PgPool, tenant: TenantScope) -> Self {
        Self { pool, tenant }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_status(raw: &str) -> Result<HandoverStatus, HandoverError> {
    raw.parse()
        .map_err(|e: super::status::UnknownStatus| HandoverError::System(e.to_string()))
}

pub(crate) fn row_to_record(row: &PgRow) -> Result<TrackingRecord, HandoverError> {
    let status: String = row.try_get("status")?;
    Ok(TrackingRecord {
        id: row.try_get("tracking_id")?,
        shipment_id: row.try_get("shipment_id")?,
        status: parse_status(&status)?,
        vehicle_id: row.try_get("vehicle_id")?,
        driver_id: row.try_get("driver_id")?,
        current_customer_id: row.try_get("current_customer_id")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
        prev_actor_id: row.try_get("prev_actor_id")?,
    })
}

pub(crate) fn row_to_event(row: &PgRow) -> Result<TrackingEvent, HandoverError> {
    let event_type: String = row.try_get("event_type")?;
    Ok(TrackingEvent {
        id: row.try_get("event_id")?,
        tracking_id: row.try_get("tracking_id")?,
        event_type: parse_status(&event_type)?,
        prev_actor_id: row.try_get("prev_actor_id")?,
        current_actor_id: row.try_get("current_actor_id")?,
        notes: row.try_get("notes")?,
        driver_id: row.try_get("driver_id")?,
        vehicle_id: row.try_get("vehicle_id")?,
        current_customer_id: row.try_get("current_customer_id")?,
        created_at: row.try_get("created_at")?,
        prev_created_at: row.try_get("prev_created_at")?,
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, HandoverError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), HandoverError> {
        tx.commit().await?;
        Ok(())
    }

    async fn insert_tracking(
        &self,
        tx: &mut Self::Tx,
        new: &NewTracking,
    ) -> Result<TrackingRecord, HandoverError> {
        let sql = format!(
            r#"
            INSERT INTO tracking_tb AS t
                (client_id, org_id, shipment_id, status, is_active,
                 created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), $5, NOW(), $5)
            RETURNING {TRACKING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(self.tenant.client_id)
            .bind(self.tenant.org_id)
            .bind(new.shipment_id)
            .bind(new.status.as_str())
            .bind(new.actor_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                // a concurrent Init won the partial unique index
                if is_unique_violation(&e) {
                    HandoverError::AlreadyTracked(new.shipment_id)
                } else {
                    e.into()
                }
            })?;
        row_to_record(&row)
    }

    async fn mark_in_tracking(
        &self,
        tx: &mut Self::Tx,
        shipment_id: i64,
        in_tracking: bool,
    ) -> Result<(), HandoverError> {
        sqlx::query("UPDATE shipments_tb SET in_tracking = $1 WHERE shipment_id = $2")
            .bind(in_tracking)
            .bind(shipment_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn lock_active_by_shipments(
        &self,
        tx: &mut Self::Tx,
        shipment_ids: &[i64],
    ) -> Result<Vec<TrackingRecord>, HandoverError> {
        if shipment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {TRACKING_COLUMNS}
            FROM tracking_tb t
            WHERE t.shipment_id = ANY($1) AND t.is_active
            ORDER BY t.shipment_id
            FOR UPDATE
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(shipment_ids)
            .fetch_all(&mut **tx)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn lock_active_for_checkin(
        &self,
        tx: &mut Self::Tx,
        driver_id: i64,
        customer_id: i64,
        status: HandoverStatus,
    ) -> Result<Vec<TrackingRecord>, HandoverError> {
        let sql = format!(
            r#"
            SELECT {TRACKING_COLUMNS}
            FROM tracking_tb t
            JOIN shipments_tb s ON s.shipment_id = t.shipment_id
            WHERE (s.driver_id = $1 OR t.driver_id = $1)
              AND s.customer_id = $2
              AND t.status = $3
              AND t.is_active
            ORDER BY t.shipment_id
            FOR UPDATE OF t
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(driver_id)
            .bind(customer_id)
            .bind(status.as_str())
            .fetch_all(&mut **tx)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn lock_by_shipment(
        &self,
        tx: &mut Self::Tx,
        shipment_id: i64,
    ) -> Result<Option<TrackingRecord>, HandoverError> {
        let sql = format!(
            r#"
            SELECT {TRACKING_COLUMNS}
            FROM tracking_tb t
            WHERE t.shipment_id = $1 AND t.is_active
            FOR UPDATE
            "#
        );
        let row = sqlx::query(&sql)
            .bind(shipment_id)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn apply_transition(
        &self,
        tx: &mut Self::Tx,
        update: &TrackingUpdate,
    ) -> Result<(), HandoverError> {
        let result = sqlx::query(
            r#"
            UPDATE tracking_tb
            SET status = $2, vehicle_id = $3, driver_id = $4, current_customer_id = $5,
                prev_actor_id = $6, updated_by = $7, updated_at = NOW()
            WHERE tracking_id = $1 AND is_active
            "#,
        )
        .bind(update.tracking_id)
        .bind(update.status.as_str())
        .bind(update.vehicle_id)
        .bind(update.driver_id)
        .bind(update.current_customer_id)
        .bind(update.prev_actor_id)
        .bind(update.current_actor_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HandoverError::TrackingNotFound(update.shipment_id));
        }
        Ok(())
    }

    async fn insert_event(
        &self,
        tx: &mut Self::Tx,
        event: &NewEvent,
    ) -> Result<i64, HandoverError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO tracking_events_tb
                (client_id, org_id, tracking_id, event_type, prev_actor_id, current_actor_id,
                 notes, driver_id, vehicle_id, current_customer_id, created_at, prev_created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), $11)
            RETURNING event_id
            "#,
        )
        .bind(self.tenant.client_id)
        .bind(self.tenant.org_id)
        .bind(event.tracking_id)
        .bind(event.event_type.as_str())
        .bind(event.prev_actor_id)
        .bind(event.current_actor_id)
        .bind(&event.notes)
        .bind(event.driver_id)
        .bind(event.vehicle_id)
        .bind(event.current_customer_id)
        .bind(event.prev_created_at)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn create_bundle(
        &self,
        tx: &mut Self::Tx,
        bundle: &NewBundle,
        tracking_ids: &[i64],
    ) -> Result<Option<i64>, HandoverError> {
        // ON CONFLICT keeps the transaction usable when the number is taken
        let bundle_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO bundles_tb
                (client_id, org_id, document_no, bundle_type, movement_date, description,
                 created_at, created_by, updated_at, updated_by, is_active)
            VALUES ($1, $2, $3, $4, CURRENT_DATE, $5, NOW(), $6, NOW(), $6, TRUE)
            ON CONFLICT (document_no) DO NOTHING
            RETURNING bundle_id
            "#,
        )
        .bind(self.tenant.client_id)
        .bind(self.tenant.org_id)
        .bind(&bundle.document_no)
        .bind(bundle.bundle_type.as_str())
        .bind(&bundle.description)
        .bind(bundle.created_by)
        .fetch_optional(&mut **tx)
        .await?;
        let Some(bundle_id) = bundle_id else {
            return Ok(None);
        };

        for (i, tracking_id) in tracking_ids.iter().enumerate() {
            let line_no = (i as i32 + 1) * LINE_STEP;
            sqlx::query(
                r#"
                INSERT INTO bundle_lines_tb
                    (client_id, org_id, bundle_id, tracking_id, line_no, created_at, created_by)
                VALUES ($1, $2, $3, $4, $5, NOW(), $6)
                "#,
            )
            .bind(self.tenant.client_id)
            .bind(self.tenant.org_id)
            .bind(bundle_id)
            .bind(*tracking_id)
            .bind(line_no)
            .bind(bundle.created_by)
            .execute(&mut **tx)
            .await?;
        }

        Ok(Some(bundle_id))
    }

    async fn delete_latest_event_of_type(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
        event_type: HandoverStatus,
    ) -> Result<bool, HandoverError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tracking_events_tb
            WHERE event_id = (
                SELECT event_id FROM tracking_events_tb
                WHERE tracking_id = $1 AND event_type = $2
                ORDER BY created_at DESC, event_id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(tracking_id)
        .bind(event_type.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn latest_event(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
    ) -> Result<Option<TrackingEvent>, HandoverError> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM tracking_events_tb
            WHERE tracking_id = $1
            ORDER BY created_at DESC, event_id DESC
            LIMIT 1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(tracking_id)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn restore_status(
        &self,
        tx: &mut Self::Tx,
        tracking_id: i64,
        status: HandoverStatus,
        holder: &TrackingEvent,
    ) -> Result<(), HandoverError> {
        sqlx::query(
            r#"
            UPDATE tracking_tb
            SET status = $2, updated_by = $3, updated_at = $4, prev_actor_id = $5,
                driver_id = $6, vehicle_id = $7, current_customer_id = $8
            WHERE tracking_id = $1
            "#,
        )
        .bind(tracking_id)
        .bind(status.as_str())
        .bind(holder.current_actor_id)
        .bind(holder.created_at)
        .bind(holder.prev_actor_id)
        .bind(holder.driver_id)
        .bind(holder.vehicle_id)
        .bind(holder.current_customer_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn hard_delete(&self, tx: &mut Self::Tx, tracking_id: i64) -> Result<(), HandoverError> {
        sqlx::query("DELETE FROM tracking_events_tb WHERE tracking_id = $1")
            .bind(tracking_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM tracking_tb WHERE tracking_id = $1")
            .bind(tracking_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DisplayLookup for PgTrackingStore {
    async fn shipment_details(
        &self,
        shipment_ids: &[i64],
        driver_id: Option<i64>,
    ) -> Result<Vec<ShipmentDetail>, HandoverError> {
        if shipment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT s.shipment_id, s.document_no, s.movement_date,
                   COALESCE(c.name, '') AS customer_name,
                   COALESCE(d.name, '') AS driver_name,
                   COALESCE(v.plate_no, '') AS vehicle_name
            FROM shipments_tb s
            LEFT JOIN tracking_tb t ON t.shipment_id = s.shipment_id AND t.is_active
            LEFT JOIN customers_tb c ON c.customer_id = s.customer_id
            LEFT JOIN users_tb d ON d.user_id = COALESCE(t.driver_id, s.driver_id)
            LEFT JOIN vehicles_tb v ON v.vehicle_id = COALESCE(t.vehicle_id, s.vehicle_id)
            WHERE s.shipment_id = ANY($1)
              AND ($2::BIGINT IS NULL OR t.driver_id = $2)
            ORDER BY s.document_no
            "#,
        )
        .bind(shipment_ids)
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ShipmentDetail {
                    shipment_id: row.try_get_log("shipment_id")?,
                    document_no: row.try_get_log("document_no")?,
                    customer_name: row.try_get_log("customer_name")?,
                    driver_name: row.try_get_log("driver_name")?,
                    vehicle_name: row.try_get_log("vehicle_name")?,
                    movement_date: row.try_get_log("movement_date")?,
                })
            })
            .collect())
    }

    async fn bundle_actors(&self, document_no: &str) -> Result<BundleActors, HandoverError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(pu.name, 'System') AS prev_actor_name,
                   COALESCE(cu.name, 'System') AS current_actor_name,
                   e.prev_created_at AS handover_time,
                   e.created_at AS receive_time
            FROM bundles_tb b
            JOIN bundle_lines_tb l ON l.bundle_id = b.bundle_id
            JOIN tracking_events_tb e
              ON e.tracking_id = l.tracking_id AND e.event_type = b.bundle_type
            LEFT JOIN users_tb pu ON pu.user_id = e.prev_actor_id
            LEFT JOIN users_tb cu ON cu.user_id = e.current_actor_id
            WHERE b.document_no = $1
            ORDER BY e.created_at DESC, e.event_id DESC
            LIMIT 1
            "#,
        )
        .bind(document_no)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| HandoverError::System(format!("no actors for bundle {document_no}")))?;

        Ok(BundleActors {
            prev_actor_name: row.try_get("prev_actor_name")?,
            current_actor_name: row.try_get("current_actor_name")?,
            handover_time: row.try_get("handover_time")?,
            receive_time: row.try_get("receive_time")?,
        })
    }

    async fn activity_names(
        &self,
        driver_id: i64,
        customer_id: Option<i64>,
    ) -> Result<Option<ActivityNames>, HandoverError> {
        let row = sqlx::query(
            r#"
            SELECT d.name AS driver_name, c.name AS customer_name
            FROM users_tb d
            LEFT JOIN customers_tb c ON c.customer_id = $2
            WHERE d.user_id = $1
            "#,
        )
        .bind(driver_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let customer_name: Option<String> = row.try_get("customer_name")?;
        Ok(Some(ActivityNames {
            driver_name: row.try_get("driver_name")?,
            customer_name: customer_name.unwrap_or_else(|| match customer_id {
                Some(id) => format!("ID: {id}"),
                None => "-".to_string(),
            }),
        }))
    }

    async fn set_bundle_attachment(
        &self,
        document_no: &str,
        path: &str,
    ) -> Result<(), HandoverError> {
        sqlx::query(
            "UPDATE bundles_tb SET attachment = $1, updated_at = NOW() WHERE document_no = $2",
        )
        .bind(path)
        .bind(document_no)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
