use axum::routing::{get, post};
use axum::Router;
use sagapay::broker::{run_consumer, EventBus};
use sagapay::cache::CacheStore;
use sagapay::config::AppConfig;
use sagapay::domain::envelope::topics;
use sagapay::domain::risk::RiskThresholds;
use sagapay::http::handlers::{ops, reviews};
use sagapay::http::middleware::api_key::require_api_key;
use sagapay::metrics::Metrics;
use sagapay::repo::outbox_repo::OutboxRepo;
use sagapay::repo::risk_reviews_repo::RiskReviewsRepo;
use sagapay::service::outbox_publisher::OutboxPublisher;
use sagapay::service::risk::{RiskService, SERVICE_NAME};
use sagapay::RiskState;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let consumer_name = std::env::var("CONSUMER_NAME").unwrap_or_else(|_| "risk-1".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations/risk").run(&pool).await?;

    let cache = CacheStore::new(&cfg.cache_url)?;
    let bus = EventBus::new(&cfg.broker_url, cfg.broker_publish_timeout_ms)?;
    let metrics = Metrics::new(SERVICE_NAME)?;

    let service = RiskService {
        pool: pool.clone(),
        reviews_repo: RiskReviewsRepo { pool: pool.clone() },
        cache,
        metrics: metrics.clone(),
        thresholds: RiskThresholds {
            velocity_per_hour: cfg.risk_velocity_per_hour,
            deny_frequency_per_minute: cfg.risk_deny_frequency_threshold,
            review_amount_cents: cfg.risk_review_amount_cents,
            failed_attempts: cfg.risk_failed_attempts_threshold,
        },
        http: reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?,
        orchestrator_url: cfg.orchestrator_url.clone(),
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
        topics::PAYMENTS_REQUESTED.to_string(),
        "risk-payments-requested".to_string(),
        consumer_name,
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_payment_requested(event).await }
        },
    ));

    let state = RiskState { service };
    let guarded = Router::new()
        .route("/ops/reviews", get(reviews::list_reviews))
        .route("/ops/reviews/:payment_id/approve", post(reviews::approve_review))
        .route("/ops/reviews/:payment_id/deny", post(reviews::deny_review))
        .route_layer(axum::middleware::from_fn_with_state(
            cfg.api_key.clone(),
            require_api_key,
        ))
        .with_state(state);
    let metrics_router = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics);
    let app = guarded
        .merge(metrics_router)
        .route("/health", get(ops::health));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("risk service listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
