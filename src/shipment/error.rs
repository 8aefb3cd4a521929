use thiserror::Error;

use crate::handover::HandoverError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShipmentError {
    #[error("Unknown outstanding stage: {0}")]
    InvalidStage(String),

    #[error("Shipment {0} has no active tracking record")]
    NotTracked(i64),

    #[error("Database error: {0}")]
    Database(String),
}

impl ShipmentError {
    pub fn code(&self) -> &'static str {
        match self {
            ShipmentError::InvalidStage(_) => "INVALID_STAGE",
            ShipmentError::NotTracked(_) => "TRACKING_NOT_FOUND",
            ShipmentError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ShipmentError::InvalidStage(_) => 400,
            ShipmentError::NotTracked(_) => 404,
            ShipmentError::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for ShipmentError {
    fn from(e: sqlx::Error) -> Self {
        ShipmentError::Database(e.to_string())
    }
}

/// Row decoding shared with the tracking store
impl From<HandoverError> for ShipmentError {
    fn from(e: HandoverError) -> Self {
        ShipmentError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ShipmentError::InvalidStage("x".into()).http_status(), 400);
        assert_eq!(ShipmentError::NotTracked(1).http_status(), 404);
        assert_eq!(ShipmentError::NotTracked(1).code(), "TRACKING_NOT_FOUND");
        assert_eq!(ShipmentError::Database("down".into()).http_status(), 500);
    }
}
