//! HTTP handlers

pub mod handover;
pub mod health;
pub mod shipment;

pub use handover::{CancelBody, HandoverBody, cancel_outstanding, init_handover, process_handover};
pub use health::{HealthResponse, health_check};
pub use shipment::{
    EditDriverVehicleBody, OutstandingList, edit_driver_vehicle, list_outstanding, shipment_events,
};
