//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::{
    CancelBody, EditDriverVehicleBody, HandoverBody, HealthResponse, OutstandingList,
};
use crate::handover::types::TrackingEvent;
use crate::handover::{CancelOutcome, EffectStatsSnapshot, HandoverOutcome};
use crate::shipment::{DateRange, EditOutcome, OutstandingShipment, OutstandingStage};

/// HS256 bearer token security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_jwt",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "STS Tracking API",
        version = "1.0.0",
        description = "Shipment handover tracking: custody transitions, bundle documents and outstanding lists.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::handover::init_handover,
        crate::gateway::handlers::handover::process_handover,
        crate::gateway::handlers::handover::cancel_outstanding,
        crate::gateway::handlers::shipment::list_outstanding,
        crate::gateway::handlers::shipment::shipment_events,
        crate::gateway::handlers::shipment::edit_driver_vehicle,
    ),
    components(
        schemas(
            HealthResponse,
            EffectStatsSnapshot,
            HandoverBody,
            HandoverOutcome,
            CancelBody,
            CancelOutcome,
            OutstandingList,
            OutstandingShipment,
            OutstandingStage,
            DateRange,
            TrackingEvent,
            EditDriverVehicleBody,
            EditOutcome,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Handover", description = "Custody transitions (JWT required when auth is enabled)"),
        (name = "Shipments", description = "Outstanding lists and corrections"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
