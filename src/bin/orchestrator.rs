use axum::routing::{get, post};
use axum::Router;
use sagapay::broker::{run_consumer, EventBus};
use sagapay::cache::CacheStore;
use sagapay::config::AppConfig;
use sagapay::domain::envelope::topics;
use sagapay::http::handlers::{ops, payments};
use sagapay::http::middleware::api_key::require_api_key;
use sagapay::metrics::Metrics;
use sagapay::repo::outbox_repo::OutboxRepo;
use sagapay::repo::payments_repo::PaymentsRepo;
use sagapay::repo::timeline_repo::TimelineRepo;
use sagapay::service::orchestrator::{OrchestratorService, SERVICE_NAME};
use sagapay::service::outbox_publisher::OutboxPublisher;
use sagapay::OrchestratorState;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let consumer_name =
        std::env::var("CONSUMER_NAME").unwrap_or_else(|_| "orchestrator-1".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations/orchestrator").run(&pool).await?;

    let cache = CacheStore::new(&cfg.cache_url)?;
    let bus = EventBus::new(&cfg.broker_url, cfg.broker_publish_timeout_ms)?;
    let metrics = Metrics::new(SERVICE_NAME)?;

    let outbox_repo = OutboxRepo { pool: pool.clone() };
    let service = OrchestratorService {
        pool: pool.clone(),
        payments_repo: PaymentsRepo { pool: pool.clone() },
        timeline_repo: TimelineRepo { pool: pool.clone() },
        cache: cache.clone(),
        metrics: metrics.clone(),
        idempotency_ttl_seconds: cfg.idempotency_ttl_seconds,
    };

    let publisher = OutboxPublisher {
        outbox_repo,
        bus: bus.clone(),
        metrics: metrics.clone(),
        batch_size: cfg.outbox_batch_size,
        reclaim_seconds: cfg.outbox_reclaim_seconds,
        max_attempts: cfg.outbox_max_attempts,
    };
    tokio::spawn(publisher.run());

    let svc = service.clone();
    tokio::spawn(run_consumer(
        bus.clone(),
        topics::RISK_APPROVED.to_string(),
        "orchestrator-risk-approved".to_string(),
        consumer_name.clone(),
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_risk_approved(event).await }
        },
    ));
    let svc = service.clone();
    tokio::spawn(run_consumer(
        bus.clone(),
        topics::RISK_DENIED.to_string(),
        "orchestrator-risk-denied".to_string(),
        consumer_name.clone(),
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_risk_denied(event).await }
        },
    ));
    let svc = service.clone();
    tokio::spawn(run_consumer(
        bus.clone(),
        topics::PAYMENTS_AUTHORIZED.to_string(),
        "orchestrator-authorized".to_string(),
        consumer_name.clone(),
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_authorized(event).await }
        },
    ));
    let svc = service.clone();
    tokio::spawn(run_consumer(
        bus.clone(),
        topics::PAYMENTS_FAILED.to_string(),
        "orchestrator-failed".to_string(),
        consumer_name.clone(),
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_provider_failed(event).await }
        },
    ));
    let svc = service.clone();
    tokio::spawn(run_consumer(
        bus.clone(),
        topics::PAYMENTS_SETTLED.to_string(),
        "orchestrator-settled".to_string(),
        consumer_name,
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_settled(event).await }
        },
    ));

    let state = OrchestratorState {
        service,
        cache,
        bus,
        rate_limit_per_minute: cfg.rate_limit_per_minute,
    };

    let guarded = Router::new()
        .route("/payments", post(payments::create_payment))
        .route_layer(axum::middleware::from_fn_with_state(
            cfg.api_key.clone(),
            require_api_key,
        ))
        .with_state(state.clone());
    let open = Router::new()
        .route("/payments/:payment_id", get(payments::get_payment))
        .route("/ops/readiness", get(ops::readiness))
        .with_state(state);
    let metrics_router = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics);
    let app = guarded
        .merge(open)
        .merge(metrics_router)
        .route("/health", get(ops::health));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("orchestrator listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
