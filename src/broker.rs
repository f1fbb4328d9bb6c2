use crate::domain::envelope::{dlq_topic, EventEnvelope};
use crate::error::SagaError;
use crate::metrics::Metrics;
use anyhow::Result;
use redis::streams::StreamReadReply;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TRANSIENT_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct EventBus {
    pub client: redis::Client,
    pub publish_timeout: Duration,
}

impl EventBus {
    pub fn new(broker_url: &str, publish_timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(broker_url)?,
            publish_timeout: Duration::from_millis(publish_timeout_ms),
        })
    }

    pub async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(event)?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(topic)
            .arg("MAXLEN")
            .arg("~")
            .arg(1_000_000)
            .arg("*")
            .arg("event")
            .arg(payload);
        let added: redis::RedisResult<String> =
            match tokio::time::timeout(self.publish_timeout, cmd.query_async(&mut conn)).await {
                Ok(res) => res,
                Err(_) => return Err(anyhow::anyhow!("publish to {topic} timed out")),
            };
        added?;
        Ok(())
    }

    /// Publish an already-encoded entry. Used to dead-letter payloads that
    /// failed envelope decoding, where re-serialization is impossible.
    pub async fn publish_raw(&self, topic: &str, raw: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let added: redis::RedisResult<String> = redis::cmd("XADD")
            .arg(topic)
            .arg("MAXLEN")
            .arg("~")
            .arg(1_000_000)
            .arg("*")
            .arg("event")
            .arg(raw)
            .query_async(&mut conn)
            .await;
        added?;
        Ok(())
    }

    pub async fn ensure_group(&self, topic: &str, group: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        // BUSYGROUP on re-create is expected.
        let _: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(topic)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        Ok(())
    }
}

/// Consume one topic forever. Each entry is decoded, handed to the handler,
/// and acked. Transient handler errors retry in-loop with backoff; anything
/// still failing is logged and acked with the inbox left unmarked, so the
/// event stays replayable through the DLQ tooling.
pub async fn run_consumer<H, Fut>(
    bus: EventBus,
    topic: String,
    group: String,
    consumer_name: String,
    metrics: Arc<Metrics>,
    handler: H,
) where
    H: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SagaError>> + Send,
{
    loop {
        if let Err(err) = consume_batches(&bus, &topic, &group, &consumer_name, &metrics, &handler).await
        {
            tracing::error!(topic = %topic, group = %group, "consumer loop error: {err}");
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

async fn consume_batches<H, Fut>(
    bus: &EventBus,
    topic: &str,
    group: &str,
    consumer_name: &str,
    metrics: &Arc<Metrics>,
    handler: &H,
) -> Result<()>
where
    H: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SagaError>> + Send,
{
    bus.ensure_group(topic, group).await?;
    let mut conn = bus.client.get_multiplexed_async_connection().await?;

    loop {
        let reply: StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(50)
            .arg("BLOCK")
            .arg(2_000)
            .arg("STREAMS")
            .arg(topic)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        for stream in reply.keys {
            for entry in stream.ids {
                let raw = entry
                    .map
                    .get("event")
                    .and_then(|v| redis::from_redis_value::<String>(v).ok());

                if let Some(raw_json) = raw {
                    match serde_json::from_str::<EventEnvelope>(&raw_json) {
                        Ok(event) => dispatch(topic, metrics, handler, event).await,
                        Err(err) => {
                            tracing::warn!(topic = %topic, stream_id = %entry.id, "undecodable event: {err}");
                            let dlq = dlq_topic(topic);
                            if let Err(err) = bus.publish_raw(&dlq, &raw_json).await {
                                tracing::error!(topic = %dlq, "dead-letter publish failed: {err}");
                            } else {
                                metrics.dlq_published(&dlq, "MALFORMED");
                            }
                        }
                    }
                } else {
                    tracing::warn!(topic = %topic, stream_id = %entry.id, "stream entry missing event field");
                }

                let _: i64 = redis::cmd("XACK")
                    .arg(topic)
                    .arg(group)
                    .arg(&entry.id)
                    .query_async(&mut conn)
                    .await
                    .unwrap_or(0);
            }
        }
    }
}

async fn dispatch<H, Fut>(topic: &str, metrics: &Arc<Metrics>, handler: &H, event: EventEnvelope)
where
    H: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SagaError>> + Send,
{
    let event_id = event.event_id;
    let aggregate_id = event.aggregate_id;
    let mut attempt = 0_u32;
    loop {
        match handler(event.clone()).await {
            Ok(()) => return,
            Err(SagaError::Transient(reason)) if attempt < TRANSIENT_RETRIES => {
                attempt += 1;
                metrics.retries_total.with_label_values(&["consumer"]).inc();
                tracing::warn!(
                    topic = %topic,
                    event_id = %event_id,
                    attempt,
                    "transient handler failure, retrying: {reason}"
                );
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            Err(SagaError::Invariant(reason)) => {
                metrics.invariant_violations_total.inc();
                tracing::error!(
                    topic = %topic,
                    event_id = %event_id,
                    payment_id = %aggregate_id,
                    "invariant violation, event left for inspection: {reason}"
                );
                return;
            }
            Err(err) => {
                tracing::error!(
                    topic = %topic,
                    event_id = %event_id,
                    payment_id = %aggregate_id,
                    "handler error: {err}"
                );
                return;
            }
        }
    }
}
