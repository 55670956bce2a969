//! Offline request router for the Nawiri POS web client.
//!
//! Intercepts GET requests, classifies them against an ordered route table,
//! and serves each via network-first, cache-first, or
//! stale-while-revalidate with age-based invalidation, falling back to
//! offline substitutes when the network is unreachable. Also handles the
//! worker lifecycle (versioned store sweep on activation), background
//! replay of queued writes, push notifications, and control messages from
//! pages.
//!
//! The browser host is abstracted behind traits — storage backend, network
//! fetcher, client hub, notification sink — so the whole router runs and
//! tests without a browser.

pub mod cache;
pub mod clients;
pub mod config;
pub mod event;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod net;
pub mod push;
pub mod router;
pub mod routes;
pub mod strategy;
pub mod sync;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use event::WorkerHandle;
pub use router::RouteOutcome;
pub use worker::OfflineWorker;
