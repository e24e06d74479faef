//! Campaign operations core for KOL marketing: typed rows, derived
//! aggregates and filters, an optimistic reducer, and two store backends.

pub mod aggregate;
pub mod audit;
pub mod batch;
pub mod config;
pub mod db;
pub mod filter;
pub mod format;
pub mod model;
pub mod mutation;
pub mod report;
pub mod rest;
pub mod state;
pub mod store;

/// Shared `tracing` setup for every binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
