use axum::routing::get;
use axum::Router;
use sagapay::broker::{run_consumer, EventBus};
use sagapay::config::AppConfig;
use sagapay::domain::envelope::topics;
use sagapay::http::handlers::ops;
use sagapay::metrics::Metrics;
use sagapay::repo::notification_repo::NotificationRepo;
use sagapay::service::notification::{NotificationService, SERVICE_NAME};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let consumer_name =
        std::env::var("CONSUMER_NAME").unwrap_or_else(|_| "notification-1".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations/notification").run(&pool).await?;

    let bus = EventBus::new(&cfg.broker_url, cfg.broker_publish_timeout_ms)?;
    let metrics = Metrics::new(SERVICE_NAME)?;

    let service = NotificationService {
        pool: pool.clone(),
        repo: NotificationRepo { pool },
        metrics: metrics.clone(),
    };

    for topic in [
        topics::PAYMENTS_SETTLED,
        topics::PAYMENTS_FAILED,
        topics::PAYMENTS_REVERSED,
    ] {
        let svc = service.clone();
        tokio::spawn(run_consumer(
            bus.clone(),
            topic.to_string(),
            format!("notification-{topic}"),
            consumer_name.clone(),
            metrics.clone(),
            move |event| {
                let svc = svc.clone();
                async move { svc.handle_terminal(event).await }
            },
        ));
    }

    let app = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics)
        .route("/health", get(ops::health));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("notification sink listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
