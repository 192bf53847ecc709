pub mod clock;
pub mod codegen;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod qr;
pub mod rate_limit;
pub mod router;
pub mod state;
pub mod store;
pub mod worker;
