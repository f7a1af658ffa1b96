use std::sync::Arc;

use farewheel::api::create_router;
use farewheel::clock::{SharedClock, SystemClock};
use farewheel::config::AppConfig;
use farewheel::db::{self, MemoryStore, PgStore};
use farewheel::provider::{HttpOfferProvider, OfferProvider};
use farewheel::services::notifier::{LogNotifier, Notifier, WebhookNotifier};
use farewheel::services::scheduler::Scheduler;
use farewheel::{AppState, Components};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = farewheel::metrics::init_metrics()?;

    let clock: SharedClock = Arc::new(SystemClock);
    let provider: Arc<dyn OfferProvider> = Arc::new(HttpOfferProvider::new(
        &config.provider_url,
        config.provider_token.clone(),
        config.cache.provider_timeout,
    )?);

    let notifier: Arc<dyn Notifier> = match &config.notifier_webhook_url {
        Some(url) => {
            tracing::info!("Alert notifications go to webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            tracing::warn!("NOTIFIER_WEBHOOK_URL not set, alert notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let components = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected");
            Components::build(Arc::new(PgStore::new(pool)), provider, notifier, clock.clone(), &config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running on the in-memory store");
            Components::build(Arc::new(MemoryStore::new()), provider, notifier, clock.clone(), &config)
        }
    };

    let scheduler = Scheduler::new(clock);
    let state = AppState::start(config, components, &scheduler, metrics_handle);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");

    let shutdown = scheduler.shutdown_token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("farewheel=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
