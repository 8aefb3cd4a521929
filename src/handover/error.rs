//! Handover Error Types

use thiserror::Error;

use super::status::HandoverStatus;

/// Handover error types
///
/// Validation errors are raised before a transaction opens. Precondition
/// errors are raised inside the transaction, before any write, and roll it back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandoverError {
    // === Validation Errors ===
    #[error("shipment_ids must not be empty")]
    EmptyBatch,

    #[error("{0} is required for {1}")]
    MissingField(&'static str, HandoverStatus),

    #[error("Tracking must start at {expected}, got {requested}")]
    InvalidEntryStatus {
        expected: HandoverStatus,
        requested: HandoverStatus,
    },

    // === Precondition Errors ===
    #[error("Shipment {0} has not been initialized for tracking")]
    NotInitialized(i64),

    #[error("Shipment {0} is already tracked")]
    AlreadyTracked(i64),

    #[error("No active records for driver {driver_id} at customer {customer_id}")]
    NoActiveRecords { driver_id: i64, customer_id: i64 },

    #[error("Shipment {shipment_id} is at {current}, cannot move to {target}")]
    InvalidTransition {
        shipment_id: i64,
        current: HandoverStatus,
        target: HandoverStatus,
    },

    #[error("Status {0} cannot be cancelled")]
    NotCancellable(HandoverStatus),

    #[error("Shipment {shipment_id} is at {actual}, not {expected}")]
    StatusMismatch {
        shipment_id: i64,
        expected: HandoverStatus,
        actual: HandoverStatus,
    },

    #[error("Tracking record not found for shipment {0}")]
    TrackingNotFound(i64),

    #[error("No earlier event left to restore attribution for tracking {0}")]
    BrokenAttribution(i64),

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal system error: {0}")]
    System(String),
}

impl HandoverError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            HandoverError::EmptyBatch => "EMPTY_BATCH",
            HandoverError::MissingField(..) => "MISSING_FIELD",
            HandoverError::InvalidEntryStatus { .. } => "INVALID_ENTRY_STATUS",
            HandoverError::NotInitialized(_) => "NOT_INITIALIZED",
            HandoverError::AlreadyTracked(_) => "ALREADY_TRACKED",
            HandoverError::NoActiveRecords { .. } => "NO_ACTIVE_RECORDS",
            HandoverError::InvalidTransition { .. } => "INVALID_TRANSITION",
            HandoverError::NotCancellable(_) => "NOT_CANCELLABLE",
            HandoverError::StatusMismatch { .. } => "STATUS_MISMATCH",
            HandoverError::TrackingNotFound(_) => "TRACKING_NOT_FOUND",
            HandoverError::BrokenAttribution(_) => "BROKEN_ATTRIBUTION",
            HandoverError::Database(_) => "DATABASE_ERROR",
            HandoverError::System(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            HandoverError::EmptyBatch
            | HandoverError::MissingField(..)
            | HandoverError::InvalidEntryStatus { .. } => 400,
            HandoverError::TrackingNotFound(_) => 404,
            HandoverError::NotInitialized(_)
            | HandoverError::AlreadyTracked(_)
            | HandoverError::NoActiveRecords { .. }
            | HandoverError::InvalidTransition { .. }
            | HandoverError::StatusMismatch { .. } => 409,
            HandoverError::NotCancellable(_) => 422,
            HandoverError::BrokenAttribution(_)
            | HandoverError::Database(_)
            | HandoverError::System(_) => 500,
        }
    }
}

impl From<sqlx::Error> for HandoverError {
    fn from(e: sqlx::Error) -> Self {
        HandoverError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(HandoverError::EmptyBatch.code(), "EMPTY_BATCH");
        assert_eq!(HandoverError::NotInitialized(1).code(), "NOT_INITIALIZED");
        assert_eq!(
            HandoverError::NotCancellable(HandoverStatus::DriverCheckin).code(),
            "NOT_CANCELLABLE"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(HandoverError::EmptyBatch.http_status(), 400);
        assert_eq!(HandoverError::AlreadyTracked(3).http_status(), 409);
        assert_eq!(
            HandoverError::NoActiveRecords {
                driver_id: 7,
                customer_id: 9
            }
            .http_status(),
            409
        );
        assert_eq!(
            HandoverError::NotCancellable(HandoverStatus::FatFromMkt).http_status(),
            422
        );
        assert_eq!(HandoverError::Database("x".into()).http_status(), 500);
    }

    #[test]
    fn test_display() {
        let err = HandoverError::InvalidTransition {
            shipment_id: 101,
            current: HandoverStatus::DelToDpk,
            target: HandoverStatus::DpkToDriver,
        };
        assert_eq!(
            err.to_string(),
            "Shipment 101 is at HO: DEL_TO_DPK, cannot move to HO: DPK_TO_DRIVER"
        );
    }
}
