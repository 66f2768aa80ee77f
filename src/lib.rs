//! Gatehouse: a configuration-driven, multi-listener reverse HTTP proxy.
//!
//! See `proxy` for the core (route ingestion, handler construction, request
//! dispatch, listener lifecycle, shutdown); `config`, `telemetry`, `signal`,
//! `readiness`, `api` and `store` make up the ambient stack around it.

pub mod api;
pub mod config;
pub mod error;
pub mod proxy;
pub mod readiness;
pub mod signal;
pub mod store;
pub mod telemetry;
