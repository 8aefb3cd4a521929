use std::sync::Arc;

use super::auth::JwtVerifier;
use crate::db::Database;
use crate::handover::HandoverService;
use crate::shipment::ShipmentQueries;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub handover: Arc<dyn HandoverService>,
    pub shipments: Arc<dyn ShipmentQueries>,
    /// Present when `auth.enabled`
    pub jwt: Option<Arc<JwtVerifier>>,
    /// Pinged by the health endpoint
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(handover: Arc<dyn HandoverService>, shipments: Arc<dyn ShipmentQueries>) -> Self {
        Self {
            handover,
            shipments,
            jwt: None,
            db: None,
        }
    }

    pub fn with_jwt(mut self, verifier: JwtVerifier) -> Self {
        self.jwt = Some(Arc::new(verifier));
        self
    }

    pub fn with_db(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }
}
