use clap::Parser;
use redis::streams::StreamRangeReply;
use sagapay::broker::EventBus;
use sagapay::config::AppConfig;
use sagapay::domain::envelope::{dlq_topic, replay_target, topics, EventEnvelope};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Replay one dead-lettered envelope back to its original topic. The
/// original event_id is preserved, so consumer inboxes still deduplicate if
/// the event had in fact been processed.
#[derive(Parser)]
#[command(name = "dlq-replay")]
struct Args {
    /// DLQ stream to scan
    #[arg(long, default_value_t = dlq_topic(topics::PROVIDER_AUTHORIZE_REQUESTED))]
    dlq_topic: String,

    /// DLQ envelope event_id to replay
    #[arg(long)]
    event_id: Option<Uuid>,

    /// Aggregate (payment) id to replay
    #[arg(long)]
    aggregate_id: Option<Uuid>,

    /// Match and report without publishing
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of DLQ entries to scan
    #[arg(long, default_value_t = 1_000)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.event_id.is_none() && args.aggregate_id.is_none() {
        anyhow::bail!("provide --event-id or --aggregate-id");
    }

    let cfg = AppConfig::from_env();
    let bus = EventBus::new(&cfg.broker_url, cfg.broker_publish_timeout_ms)?;
    let mut conn = bus.client.get_multiplexed_async_connection().await?;

    let reply: StreamRangeReply = redis::cmd("XRANGE")
        .arg(&args.dlq_topic)
        .arg("-")
        .arg("+")
        .arg("COUNT")
        .arg(args.limit)
        .query_async(&mut conn)
        .await?;

    for entry in reply.ids {
        let Some(raw) = entry
            .map
            .get("event")
            .and_then(|v| redis::from_redis_value::<String>(v).ok())
        else {
            continue;
        };
        let Ok(envelope) = serde_json::from_str::<EventEnvelope>(&raw) else {
            continue;
        };

        if args.event_id.is_some_and(|id| id != envelope.event_id) {
            continue;
        }
        if args.aggregate_id.is_some_and(|id| id != envelope.aggregate_id) {
            continue;
        }

        let Some((replay_topic, original)) = replay_target(&envelope) else {
            eprintln!(
                "matched DLQ event {} is not replayable (missing replay_topic/failed_event)",
                envelope.event_id
            );
            std::process::exit(2);
        };

        println!(
            "matched DLQ event_id={} aggregate_id={} -> replay_topic={}",
            envelope.event_id, envelope.aggregate_id, replay_topic
        );
        if args.dry_run {
            println!("dry run only; no publish performed");
            return Ok(());
        }

        bus.publish(&replay_topic, &original).await?;
        println!("replayed original event_id={}", original.event_id);
        return Ok(());
    }

    eprintln!("no matching DLQ event found in the first {} entries", args.limit);
    std::process::exit(1);
}
