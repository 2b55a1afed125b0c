use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::models::SweepSchedule;
use appointment_cell::services::{
    AppointmentLifecycleService, AppointmentNotifier, AppointmentStore, LifecycleSweeper,
    SupabaseAppointmentStore,
};
use doctor_cell::services::availability::AvailabilityService;
use notification_cell::{FcmPushClient, NotificationGateway, PushProvider, SupabaseInbox};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduler");

    // Load configuration
    let config = AppConfig::from_env();

    let supabase = Arc::new(SupabaseClient::new(&config).context("building Supabase client")?);
    let store: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::new(
        supabase.clone(),
        config.io_timeout(),
    ));

    // Push is optional; without it every notification lands in the in-app inbox.
    let push: Option<Arc<dyn PushProvider>> = match FcmPushClient::new(&config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Push delivery disabled: {}", e);
            None
        }
    };
    let gateway = Arc::new(NotificationGateway::new(
        push,
        Arc::new(SupabaseInbox::new(supabase.clone())),
        config.io_timeout(),
    ));

    let notifier = Arc::new(AppointmentNotifier::new(store.clone(), gateway));
    let lifecycle = Arc::new(AppointmentLifecycleService::new(store.clone(), notifier));
    let sweeper = Arc::new(
        LifecycleSweeper::new(
            store,
            lifecycle.clone(),
            SweepSchedule::from_config(&config),
            config.sweep_interval(),
            config.sweep_max_concurrency,
        )
        .context("refusing to start with an invalid sweep schedule")?,
    );
    let availability = Arc::new(AvailabilityService::new(supabase));

    let runner = sweeper.clone();
    let sweep_task = tokio::spawn(async move { runner.start().await });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(lifecycle, sweeper.clone(), availability)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.context("binding listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweeper))
        .await
        .context("serving HTTP")?;

    if let Err(e) = sweep_task.await {
        error!("Sweeper task ended abnormally: {}", e);
    }

    info!("Clinic scheduler stopped");
    Ok(())
}

async fn shutdown_signal(sweeper: Arc<LifecycleSweeper>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    sweeper.shutdown().await;
}
