use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use sts_tracking::config::AppConfig;
use sts_tracking::db::Database;
use sts_tracking::gateway::auth::JwtVerifier;
use sts_tracking::gateway::state::AppState;
use sts_tracking::handover::{
    DocumentRenderer, EffectContext, HandoverEngine, LogNotifier, Notifier, PdfRenderer,
    PgTrackingStore, SideEffectQueue, WebhookNotifier,
};
use sts_tracking::shipment::PgShipmentQueries;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }
    let _log_guard = sts_tracking::logging::init_logging(&config);

    tracing::info!(env = %env, version = env!("GIT_HASH"), "Starting STS tracking service");

    let database_url = config
        .postgres_url
        .clone()
        .context("postgres_url is not configured (set DATABASE_URL)")?;
    let db = Arc::new(
        Database::connect(&database_url, &config.db_pool)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    db.migrate().await.context("Failed to apply migrations")?;

    let tenant = config.handover.tenant;
    let store = Arc::new(PgTrackingStore::new(db.pool().clone(), tenant));

    let notifier: Arc<dyn Notifier> = if config.notification.enabled {
        tracing::info!(endpoint = %config.notification.endpoint, "Webhook notifications enabled");
        Arc::new(WebhookNotifier::new(&config.notification)?)
    } else {
        tracing::warn!("Notifications disabled - messages are only logged");
        Arc::new(LogNotifier)
    };
    let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfRenderer::new(&config.documents));

    let (effects, workers) = SideEffectQueue::start(
        EffectContext {
            lookup: store.clone(),
            notifier,
            renderer,
        },
        &config.side_effects,
    );
    let engine = Arc::new(HandoverEngine::new(store, effects, &config.handover));
    let shipments = Arc::new(PgShipmentQueries::new(db.pool().clone(), tenant));

    let mut state = AppState::new(engine, shipments).with_db(db);
    if config.auth.enabled {
        state = state.with_jwt(JwtVerifier::new(&config.auth.jwt_secret));
    } else {
        tracing::warn!("JWT auth disabled - protected routes are open");
    }

    let served = sts_tracking::gateway::run_server(&config.gateway, state, shutdown_signal()).await;

    // committed handovers still get their documents and notices
    workers
        .shutdown(Duration::from_millis(config.side_effects.shutdown_grace_ms))
        .await;

    served
}
