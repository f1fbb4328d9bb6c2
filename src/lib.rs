pub mod broker;
pub mod cache;
pub mod config;
pub mod domain {
    pub mod envelope;
    pub mod ledger;
    pub mod payment;
    pub mod risk;
    pub mod state_machine;
}
pub mod error;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod payments;
        pub mod reconciliation;
        pub mod reviews;
    }
    pub mod middleware {
        pub mod api_key;
    }
}
pub mod metrics;
pub mod provider;
pub mod repo {
    pub mod inbox_repo;
    pub mod ledger_repo;
    pub mod notification_repo;
    pub mod outbox_repo;
    pub mod payment_attempts_repo;
    pub mod payments_repo;
    pub mod provider_attempts_repo;
    pub mod risk_reviews_repo;
    pub mod timeline_repo;
}
pub mod service {
    pub mod ledger;
    pub mod notification;
    pub mod orchestrator;
    pub mod outbox_publisher;
    pub mod provider_adapter;
    pub mod risk;
}

#[derive(Clone)]
pub struct OrchestratorState {
    pub service: service::orchestrator::OrchestratorService,
    pub cache: cache::CacheStore,
    pub bus: broker::EventBus,
    pub rate_limit_per_minute: i64,
}

#[derive(Clone)]
pub struct RiskState {
    pub service: service::risk::RiskService,
}

#[derive(Clone)]
pub struct LedgerState {
    pub service: service::ledger::LedgerService,
}
