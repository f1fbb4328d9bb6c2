use axum::routing::get;
use axum::Router;
use sagapay::broker::{run_consumer, EventBus};
use sagapay::config::AppConfig;
use sagapay::domain::envelope::topics;
use sagapay::http::handlers::ops;
use sagapay::metrics::Metrics;
use sagapay::provider::simulator::SimulatedProvider;
use sagapay::repo::outbox_repo::OutboxRepo;
use sagapay::repo::provider_attempts_repo::ProviderAttemptsRepo;
use sagapay::service::outbox_publisher::OutboxPublisher;
use sagapay::service::provider_adapter::{ProviderAdapterService, SERVICE_NAME};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let consumer_name = std::env::var("CONSUMER_NAME").unwrap_or_else(|_| "provider-1".to_string());
    let simulated_latency_ms = std::env::var("PROVIDER_LATENCY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(50);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations/provider").run(&pool).await?;

    let bus = EventBus::new(&cfg.broker_url, cfg.broker_publish_timeout_ms)?;
    let metrics = Metrics::new(SERVICE_NAME)?;

    let service = ProviderAdapterService {
        pool: pool.clone(),
        attempts_repo: ProviderAttemptsRepo { pool: pool.clone() },
        metrics: metrics.clone(),
        provider: Arc::new(SimulatedProvider {
            latency: Duration::from_millis(simulated_latency_ms),
        }),
        max_attempts: cfg.provider_max_attempts,
    };

    let publisher = OutboxPublisher {
        outbox_repo: OutboxRepo { pool },
        bus: bus.clone(),
        metrics: metrics.clone(),
        batch_size: cfg.outbox_batch_size,
        reclaim_seconds: cfg.outbox_reclaim_seconds,
        max_attempts: cfg.outbox_max_attempts,
    };
    tokio::spawn(publisher.run());

    let svc = service.clone();
    tokio::spawn(run_consumer(
        bus,
        topics::PROVIDER_AUTHORIZE_REQUESTED.to_string(),
        "provider-authorize-requested".to_string(),
        consumer_name,
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_authorize_request(event).await }
        },
    ));

    let app = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics)
        .route("/health", get(ops::health));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("provider adapter listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
