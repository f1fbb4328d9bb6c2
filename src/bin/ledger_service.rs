use axum::routing::get;
use axum::Router;
use sagapay::broker::{run_consumer, EventBus};
use sagapay::config::AppConfig;
use sagapay::domain::envelope::topics;
use sagapay::http::handlers::{ops, reconciliation};
use sagapay::metrics::Metrics;
use sagapay::repo::ledger_repo::LedgerRepo;
use sagapay::repo::outbox_repo::OutboxRepo;
use sagapay::service::ledger::{LedgerService, SERVICE_NAME};
use sagapay::service::outbox_publisher::OutboxPublisher;
use sagapay::LedgerState;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let consumer_name = std::env::var("CONSUMER_NAME").unwrap_or_else(|_| "ledger-1".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations/ledger").run(&pool).await?;

    let bus = EventBus::new(&cfg.broker_url, cfg.broker_publish_timeout_ms)?;
    let metrics = Metrics::new(SERVICE_NAME)?;

    let service = LedgerService {
        pool: pool.clone(),
        ledger_repo: LedgerRepo { pool: pool.clone() },
        metrics: metrics.clone(),
        debit_account: cfg.ledger_debit_account.clone(),
        credit_account: cfg.ledger_credit_account.clone(),
    };
    service.ensure_accounts().await?;

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
        topics::PAYMENTS_CAPTURED.to_string(),
        "ledger-captured".to_string(),
        consumer_name,
        metrics.clone(),
        move |event| {
            let svc = svc.clone();
            async move { svc.handle_captured(event).await }
        },
    ));

    let state = LedgerState { service };
    let app = Router::new()
        .route("/reconciliation", get(reconciliation::reconcile_all))
        .route(
            "/reconciliation/:transaction_id",
            get(reconciliation::reconcile_transaction),
        )
        .with_state(state)
        .merge(
            Router::new()
                .route("/metrics", get(ops::metrics))
                .with_state(metrics),
        )
        .route("/health", get(ops::health));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("ledger service listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
