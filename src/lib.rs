pub mod config;
pub mod domain {
    pub mod client;
    pub mod gateway;
    pub mod transaction;
    pub mod wallet;
}
pub mod error;
pub mod http {
    pub mod handlers {
        pub mod admin;
        pub mod payments;
        pub mod webhooks;
    }
    pub mod middleware {
        pub mod admin_auth;
    }
}
pub mod providers;
pub mod repo {
    pub mod assignments_repo;
    pub mod clients_repo;
    pub mod gateways_repo;
    pub mod notifications_repo;
    pub mod transactions_repo;
    pub mod wallets_repo;
    pub mod webhook_events_repo;
}
pub mod rotation;
pub mod service {
    pub mod forwarder;
    pub mod ledger;
    pub mod payment_service;
    pub mod retry;
    pub mod sweeps;
    pub mod webhook_service;
}
pub mod vault;

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub webhook_service: service::webhook_service::WebhookService,
    pub clients_repo: repo::clients_repo::ClientsRepo,
    pub assignments_repo: repo::assignments_repo::AssignmentsRepo,
    pub ledger: service::ledger::CommissionLedger,
}
