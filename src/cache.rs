use crate::domain::risk::CounterSnapshot;
use anyhow::Result;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use uuid::Uuid;

#[derive(Clone)]
pub struct CacheStore {
    pub client: redis::Client,
}

pub fn idempotency_key(customer_id: &str, idempotency_key: &str) -> String {
    format!("payment:{customer_id}:{idempotency_key}")
}

pub fn refill_tokens(tokens: f64, updated_at: f64, now: f64, capacity: f64) -> f64 {
    let refill_per_sec = capacity / 60.0;
    let elapsed = (now - updated_at).max(0.0);
    (tokens + elapsed * refill_per_sec).min(capacity)
}

impl CacheStore {
    pub fn new(cache_url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(cache_url)?,
        })
    }

    pub async fn idempotency_get(
        &self,
        customer_id: &str,
        key: &str,
    ) -> Result<Option<Uuid>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(idempotency_key(customer_id, key)).await?;
        Ok(raw.and_then(|s| Uuid::parse_str(&s).ok()))
    }

    pub async fn idempotency_put(
        &self,
        customer_id: &str,
        key: &str,
        payment_id: Uuid,
        ttl_seconds: u64,
    ) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn
            .set_ex(
                idempotency_key(customer_id, key),
                payment_id.to_string(),
                ttl_seconds,
            )
            .await?;
        Ok(())
    }

    /// Bump both velocity windows for this customer and return the counter
    /// snapshot the risk rules evaluate against. Counters are approximate;
    /// concurrent increments are fine.
    pub async fn bump_velocity(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CounterSnapshot> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let minute_key = format!("velocity:{}:{}", customer_id, now.format("%Y%m%d%H%M"));
        let hour_key = format!("velocity:{}:{}", customer_id, now.format("%Y%m%d%H"));

        let minute_count: i64 = conn.incr(&minute_key, 1).await?;
        let _: bool = conn.expire(&minute_key, 120).await?;
        let hour_count: i64 = conn.incr(&hour_key, 1).await?;
        let _: bool = conn.expire(&hour_key, 7_200).await?;

        let failure_count: i64 = conn
            .get::<_, Option<i64>>(format!("risk:failures:{customer_id}"))
            .await?
            .unwrap_or(0);

        Ok(CounterSnapshot {
            minute_count,
            hour_count,
            failure_count,
        })
    }

    pub async fn record_failure(&self, customer_id: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("risk:failures:{customer_id}");
        let _: i64 = conn.incr(&key, 1).await?;
        let _: bool = conn.expire(&key, 3_600).await?;
        Ok(())
    }

    /// Per-customer token bucket; capacity and refill rate both derive from
    /// the per-minute limit. Returns false when the bucket is empty.
    pub async fn take_token(&self, customer_id: &str, per_minute: i64) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("tokenbucket:{customer_id}");
        let now = Utc::now().timestamp_millis() as f64 / 1_000.0;
        let capacity = per_minute as f64;

        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&key)
            .arg("tokens")
            .arg("updated_at")
            .query_async(&mut conn)
            .await?;
        let tokens = values
            .first()
            .and_then(|v| v.as_deref())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(capacity);
        let updated_at = values
            .get(1)
            .and_then(|v| v.as_deref())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(now);

        let mut tokens = refill_tokens(tokens, updated_at, now, capacity);
        let allowed = tokens >= 1.0;
        if allowed {
            tokens -= 1.0;
        }

        let _: () = redis::cmd("HSET")
            .arg(&key)
            .arg("tokens")
            .arg(tokens)
            .arg("updated_at")
            .arg(now)
            .query_async(&mut conn)
            .await?;
        let _: bool = conn.expire(&key, 120).await?;
        Ok(allowed)
    }
}
