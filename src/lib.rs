//! STS Tracking - Shipment Handover Backend
//!
//! Tracks physical custody of shipment documents as they move between the
//! depot, drivers, customers, delivery, marketing and finance.
//!
//! # Modules
//!
//! - [`handover`] - Custody state machine, tracking store, side-effect queue
//! - [`shipment`] - Outstanding lists, event timeline, driver/vehicle edits
//! - [`gateway`] - HTTP API (axum)
//! - [`db`] - PostgreSQL pool and migrations
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod handover;
pub mod logging;
pub mod shipment;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use handover::{
    HandoverEngine, HandoverError, HandoverOutcome, HandoverRequest, HandoverService,
    HandoverStatus, PgTrackingStore, SideEffectQueue,
};
pub use shipment::{PgShipmentQueries, ShipmentQueries};
