//! Post-commit side effects
//!
//! Committed handovers hand their follow-up work (bundle documents, driver
//! broadcasts) to a bounded queue. A dispatcher task feeds jobs to at most
//! `workers` concurrent runs. Enqueueing never waits: a full queue drops the
//! job and counts it. Failures are logged and counted, never retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::error::HandoverError;
use super::notify::{Notifier, NotifyError, activity_checkout_notice, driver_notice};
use super::render::{BundleDocument, DocumentRenderer, RenderError};
use super::status::HandoverStatus;
use super::store::DisplayLookup;
use super::types::BundleActors;
use crate::config::SideEffectConfig;

/// Detached work scheduled after a commit
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Render the bundle document and attach it to the bundle
    RenderBundle {
        document_no: String,
        status: HandoverStatus,
        shipment_ids: Vec<i64>,
    },
    /// Broadcast a check-in / check-out with its document list
    DriverNotice {
        status: HandoverStatus,
        shipment_ids: Vec<i64>,
        driver_id: i64,
        notes: Option<String>,
    },
    /// Broadcast a check-out made without documents
    ActivityCheckout {
        driver_id: i64,
        customer_id: Option<i64>,
        notes: Option<String>,
    },
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::RenderBundle { .. } => "render_bundle",
            SideEffect::DriverNotice { .. } => "driver_notice",
            SideEffect::ActivityCheckout { .. } => "activity_checkout",
        }
    }
}

/// Why a side-effect job was abandoned
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("Tracking store call failed: {0}")]
    Store(#[from] HandoverError),

    #[error("Document render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),
}

impl EffectError {
    pub fn code(&self) -> &'static str {
        match self {
            EffectError::Store(e) => e.code(),
            EffectError::Render(e) => e.code(),
            EffectError::Notify(e) => e.code(),
        }
    }
}

#[derive(Debug, Default)]
struct EffectStats {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Queue counters exposed on the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct EffectStatsSnapshot {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Collaborators the jobs run against
#[derive(Clone)]
pub struct EffectContext {
    pub lookup: Arc<dyn DisplayLookup>,
    pub notifier: Arc<dyn Notifier>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

/// Sending side of the queue, cheap to clone
#[derive(Clone)]
pub struct SideEffectQueue {
    tx: mpsc::Sender<SideEffect>,
    stats: Arc<EffectStats>,
}

/// Owns the dispatcher task; used to drain on shutdown
pub struct EffectWorkers {
    shutdown_tx: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
}

impl SideEffectQueue {
    /// Spawn the dispatcher and return the queue handle
    pub fn start(ctx: EffectContext, config: &SideEffectConfig) -> (Self, EffectWorkers) {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(EffectStats::default());

        let dispatcher = tokio::spawn(dispatch(
            rx,
            shutdown_rx,
            Arc::new(ctx),
            stats.clone(),
            config.workers.max(1),
        ));

        info!(
            workers = config.workers,
            queue_size = config.queue_size,
            "Side-effect queue started"
        );

        (
            Self { tx, stats },
            EffectWorkers {
                shutdown_tx,
                dispatcher,
            },
        )
    }

    /// Schedule `job`; returns false when it was dropped
    pub fn enqueue(&self, job: SideEffect) -> bool {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                debug!(kind, "Side effect enqueued");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind, "Side-effect queue full - job dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind, "Side-effect queue closed - job dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> EffectStatsSnapshot {
        EffectStatsSnapshot {
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

impl EffectWorkers {
    /// Stop accepting jobs, run what is queued, give up after `grace`
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(grace, self.dispatcher).await {
            Ok(Ok(())) => info!("Side-effect queue drained"),
            Ok(Err(e)) => error!(error = %e, "Side-effect dispatcher panicked"),
            Err(_) => warn!(
                grace_ms = grace.as_millis() as u64,
                "Side-effect queue not drained before shutdown deadline"
            ),
        }
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<SideEffect>,
    mut shutdown_rx: watch::Receiver<bool>,
    ctx: Arc<EffectContext>,
    stats: Arc<EffectStats>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();
    let mut closing = false;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed(), if !closing => {
                closing = true;
                if changed.is_ok() {
                    debug!("Side-effect queue closing");
                }
                // buffered jobs still drain; recv yields None afterwards
                rx.close();
            }
            job = rx.recv() => {
                let Some(job) = job else { break };
                let Ok(permit) = permits.clone().acquire_owned().await else { break };
                let ctx = ctx.clone();
                let stats = stats.clone();
                running.spawn(async move {
                    let kind = job.kind();
                    match run_job(&ctx, job).await {
                        Ok(()) => {
                            stats.completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            error!(kind, code = e.code(), error = %e, "Side effect failed");
                        }
                    }
                    drop(permit);
                });
            }
            Some(_) = running.join_next(), if !running.is_empty() => {}
        }
    }

    while running.join_next().await.is_some() {}
}

/// Run one job; `Err` carries the reason it was abandoned
pub async fn run_job(ctx: &EffectContext, job: SideEffect) -> Result<(), EffectError> {
    match job {
        SideEffect::RenderBundle {
            document_no,
            status,
            shipment_ids,
        } => render_bundle(ctx, document_no, status, &shipment_ids).await,
        SideEffect::DriverNotice {
            status,
            shipment_ids,
            driver_id,
            notes,
        } => {
            let details = ctx
                .lookup
                .shipment_details(&shipment_ids, Some(driver_id))
                .await?;
            let now = Local::now().format("%d-%m-%Y %H:%M").to_string();
            let Some(message) = driver_notice(status, &details, &now, notes.as_deref()) else {
                debug!(driver_id, "No shipment details - driver notice skipped");
                return Ok(());
            };
            ctx.notifier.send(&message).await?;
            info!(
                driver_id,
                %status,
                count = details.len(),
                notifier = ctx.notifier.name(),
                "Driver notice sent"
            );
            Ok(())
        }
        SideEffect::ActivityCheckout {
            driver_id,
            customer_id,
            notes,
        } => {
            let names = match ctx.lookup.activity_names(driver_id, customer_id).await {
                Ok(names) => names,
                Err(e) => {
                    warn!(driver_id, error = %e, "Activity name lookup failed - using ids");
                    None
                }
            };
            let now = Local::now().format("%d-%m-%Y %H:%M").to_string();
            let message = activity_checkout_notice(
                names.as_ref(),
                driver_id,
                customer_id,
                Some(&now),
                notes.as_deref(),
            );
            ctx.notifier.send(&message).await?;
            info!(driver_id, notifier = ctx.notifier.name(), "Activity checkout notice sent");
            Ok(())
        }
    }
}

async fn render_bundle(
    ctx: &EffectContext,
    document_no: String,
    status: HandoverStatus,
    shipment_ids: &[i64],
) -> Result<(), EffectError> {
    let details = ctx.lookup.shipment_details(shipment_ids, None).await?;
    if details.is_empty() {
        warn!(%document_no, "No shipment details - bundle document skipped");
        return Ok(());
    }

    let actors = match ctx.lookup.bundle_actors(&document_no).await {
        Ok(actors) => actors,
        Err(e) => {
            warn!(%document_no, error = %e, "Bundle actor lookup failed - using placeholders");
            BundleActors::unknown()
        }
    };

    let doc = BundleDocument {
        document_no: document_no.clone(),
        status,
        details,
        actors,
    };
    let path = ctx.renderer.render(&doc).await?;
    let path = path.to_string_lossy();

    ctx.lookup.set_bundle_attachment(&document_no, &path).await?;
    info!(%document_no, %path, "Bundle document attached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handover::memory::MemoryStore;
    use crate::handover::notify::mock::RecordingNotifier;
    use crate::handover::render::mock::RecordingRenderer;

    struct Harness {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        renderer: Arc<RecordingRenderer>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                notifier: Arc::new(RecordingNotifier::new()),
                renderer: Arc::new(RecordingRenderer::new()),
            }
        }

        fn ctx(&self) -> EffectContext {
            EffectContext {
                lookup: self.store.clone(),
                notifier: self.notifier.clone(),
                renderer: self.renderer.clone(),
            }
        }
    }

    fn config(workers: usize, queue_size: usize) -> SideEffectConfig {
        SideEffectConfig {
            workers,
            queue_size,
            shutdown_grace_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn test_activity_checkout_falls_back_when_lookup_fails() {
        let h = Harness::new();
        h.store.fail_lookups();

        let job = SideEffect::ActivityCheckout {
            driver_id: 7,
            customer_id: Some(9),
            notes: None,
        };
        run_job(&h.ctx(), job).await.unwrap();

        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("ID: 7"));
        assert!(messages[0].contains("ID: 9"));
    }

    #[tokio::test]
    async fn test_driver_notice_without_details_is_noop() {
        let h = Harness::new();
        let job = SideEffect::DriverNotice {
            status: HandoverStatus::DriverCheckin,
            shipment_ids: vec![1, 2],
            driver_id: 7,
            notes: None,
        };
        run_job(&h.ctx(), job).await.unwrap();
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_render_without_details_is_noop() {
        let h = Harness::new();
        let job = SideEffect::RenderBundle {
            document_no: "HOPT-1".into(),
            status: HandoverStatus::DpkFromDel,
            shipment_ids: vec![404],
        };
        run_job(&h.ctx(), job).await.unwrap();
        assert!(h.renderer.rendered().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_is_reported() {
        let h = Harness::new();
        h.notifier.set_fail(true);
        let job = SideEffect::ActivityCheckout {
            driver_id: 7,
            customer_id: None,
            notes: None,
        };
        let err = run_job(&h.ctx(), job).await.unwrap_err();
        assert!(matches!(err, EffectError::Notify(NotifyError::Transport(_))));
        assert_eq!(err.code(), "NOTIFY_TRANSPORT");
    }

    #[tokio::test]
    async fn test_render_failure_is_reported() {
        let h = Harness::new();
        h.store.add_shipment(101, Some(9), Some(7));
        h.renderer.set_fail(true);
        let job = SideEffect::RenderBundle {
            document_no: "HOPT-1".into(),
            status: HandoverStatus::DpkFromDel,
            shipment_ids: vec![101],
        };
        let err = run_job(&h.ctx(), job).await.unwrap_err();
        assert!(matches!(err, EffectError::Render(RenderError::Io(_))));
        assert_eq!(err.code(), "RENDER_IO");
    }

    #[tokio::test]
    async fn test_queue_drains_on_shutdown() {
        let h = Harness::new();
        let (queue, workers) = SideEffectQueue::start(h.ctx(), &config(2, 8));

        for driver_id in 0..3 {
            assert!(queue.enqueue(SideEffect::ActivityCheckout {
                driver_id,
                customer_id: None,
                notes: None,
            }));
        }
        workers.shutdown(Duration::from_secs(5)).await;

        assert_eq!(h.notifier.messages().len(), 3);
        let stats = queue.stats();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 0);

        // closed queue rejects new work
        assert!(!queue.enqueue(SideEffect::ActivityCheckout {
            driver_id: 1,
            customer_id: None,
            notes: None,
        }));
        assert_eq!(queue.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_failed_jobs_are_counted() {
        let h = Harness::new();
        h.notifier.set_fail(true);
        let (queue, workers) = SideEffectQueue::start(h.ctx(), &config(1, 4));
        queue.enqueue(SideEffect::ActivityCheckout {
            driver_id: 7,
            customer_id: None,
            notes: None,
        });
        workers.shutdown(Duration::from_secs(5)).await;
        assert_eq!(queue.stats().failed, 1);
        assert_eq!(queue.stats().completed, 0);
    }
}
