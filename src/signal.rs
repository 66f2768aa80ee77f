//! Host-signal shutdown trigger.
//!
//! Grounded directly on the teacher's `crates/core/src/signal.rs`: a
//! `tokio::sync::watch` channel flipped to `true` the first time SIGINT or
//! SIGTERM arrives, cloneable so every listener-independent consumer (here,
//! just the shutdown controller) can await it without owning the signal
//! handles itself.

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Spawns a task that waits for SIGINT or SIGTERM and flips the returned
/// watch channel to `true` on the first one received.
pub fn trigger_on_termination() -> tokio::sync::watch::Receiver<bool> {
	let (tx, rx) = tokio::sync::watch::channel(false);

	tokio::spawn(async move {
		let mut sigterm = match signal(SignalKind::terminate()) {
			Ok(s) => s,
			Err(e) => {
				tracing::error!(error = %e, "failed to install SIGTERM handler");
				return;
			},
		};
		let mut sigint = match signal(SignalKind::interrupt()) {
			Ok(s) => s,
			Err(e) => {
				tracing::error!(error = %e, "failed to install SIGINT handler");
				return;
			},
		};

		tokio::select! {
			_ = sigterm.recv() => info!("received SIGTERM"),
			_ = sigint.recv() => info!("received SIGINT"),
		}
		let _ = tx.send(true);
	});

	rx
}
