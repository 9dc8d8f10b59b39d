use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use marketplace_api as api;
use api::{
    clock::SystemClock,
    config::RepositoryBackend,
    events::EventSender,
    handlers::{health::init_start_time, AppServices, Repositories},
    services::notifications::NotificationService,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config_logged().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);
    init_start_time();

    let (db, repositories) = match cfg.repository_backend() {
        RepositoryBackend::Database => {
            let pool = api::db::establish_connection_from_app_config(&cfg)
                .await
                .context("failed to connect to the database")?;
            if cfg.auto_migrate {
                api::db::run_migrations(&pool).await.map_err(|e| {
                    error!("Failed running migrations: {}", e);
                    e
                })?;
            }
            let pool = Arc::new(pool);
            (Some(pool.clone()), Repositories::sea_orm(pool))
        }
        RepositoryBackend::InMemory => {
            warn!("Using in-memory repositories; data is lost on shutdown");
            (None, Repositories::in_memory())
        }
    };

    // Init events
    let (event_sender, event_rx) = EventSender::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(event_sender);

    // The processor writes notifications without emitting events back into its own queue
    let processor_notifications = Arc::new(NotificationService::new(
        repositories.notifications.clone(),
        None,
    ));
    tokio::spawn(api::events::process_events(event_rx, processor_notifications));

    let services = AppServices::from_config(
        &cfg,
        &repositories,
        event_sender,
        Arc::new(SystemClock),
    );

    let bind_address = cfg.bind_address();
    let state = AppState {
        config: Arc::new(cfg),
        services,
        db,
    };
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!("marketplace-api listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("marketplace-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
    info!("shutdown signal received");
}
