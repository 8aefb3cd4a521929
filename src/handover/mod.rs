//! Handover tracking
//!
//! Custody chain state machine for shipment documents.
//!
//! # Flow
//!
//! ```text
//! request ──► validate ──► BEGIN ──► lock records ──► plan every transition
//!                                         │
//!                   apply + event per record, bundle for receipts
//!                                         │
//!                                      COMMIT ──► side-effect queue
//!                                                  (document, broadcast)
//! ```

pub mod cancel;
pub mod effects;
pub mod engine;
pub mod error;
pub mod notify;
pub mod pdf;
pub mod pg;
pub mod render;
pub mod status;
pub mod store;
pub mod transition;
pub mod types;

#[cfg(test)]
pub mod memory;


pub use cancel::CancelOutcome;
pub use effects::{
    EffectContext, EffectError, EffectStatsSnapshot, EffectWorkers, SideEffect, SideEffectQueue,
};
pub use engine::{HandoverEngine, HandoverService};
pub use error::HandoverError;
pub use notify::{LogNotifier, Notifier, NotifyError, WebhookNotifier};
pub use pg::PgTrackingStore;
pub use render::{DocumentRenderer, PdfRenderer, RenderError};
pub use status::{CancelAction, FieldPolicy, HandoverStatus};
pub use store::{DisplayLookup, TrackingStore};
pub use types::{HandoverOutcome, HandoverRequest, TenantScope};
