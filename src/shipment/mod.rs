//! Shipment dashboard operations
//!
//! Outstanding lists, the event timeline of a tracked shipment and the
//! driver/vehicle correction. Custody transitions live in `handover`.

pub mod error;
pub mod service;
pub mod types;

pub use error::ShipmentError;
pub use service::{PgShipmentQueries, ShipmentQueries};
pub use types::{
    DateRange, DriverVehicleEdit, EditOutcome, OutstandingShipment, OutstandingStage,
};
