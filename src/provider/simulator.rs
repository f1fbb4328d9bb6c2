use crate::provider::{AuthorizeRequest, CardProvider, ProviderOutcome};
use rand::Rng;
use std::time::Duration;

/// Stand-in for the external card processor. Customer-id prefixes force a
/// deterministic outcome so end-to-end scenarios can steer the saga;
/// everything else draws from the weighted distribution.
pub struct SimulatedProvider {
    pub latency: Duration,
}

pub fn forced_outcome(customer_id: &str) -> Option<ProviderOutcome> {
    let lowered = customer_id.to_lowercase();
    if lowered.starts_with("force-timeout") {
        Some(ProviderOutcome::Timeout)
    } else if lowered.starts_with("force-decline") {
        Some(ProviderOutcome::Decline)
    } else {
        None
    }
}

#[async_trait::async_trait]
impl CardProvider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn authorize(&self, request: &AuthorizeRequest) -> ProviderOutcome {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(forced) = forced_outcome(&request.customer_id) {
            return forced;
        }

        let roll: f64 = rand::thread_rng().gen();
        if roll < 0.70 {
            ProviderOutcome::Success
        } else if roll < 0.90 {
            ProviderOutcome::Timeout
        } else {
            ProviderOutcome::Decline
        }
    }
}
