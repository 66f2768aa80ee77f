//! Minimal readiness surface (§10.4).
//!
//! Scaled down from the teacher's `management/readiness_server.rs`, which
//! tracks a registry of per-component readiness flags; this system has
//! exactly one data-plane component, so a single `AtomicBool` suffices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::routing::get;
use axum::Router;
use http::{Response, StatusCode};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
	pub fn new() -> Readiness {
		Readiness(Arc::new(AtomicBool::new(false)))
	}

	pub fn mark_ready(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	fn is_ready(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Serve `GET /healthz` on `addr` until the process exits. Returns `200
/// ready` once `mark_ready` has been called, `503` beforehand.
pub async fn serve(addr: &str, readiness: Readiness) -> anyhow::Result<()> {
	let app = Router::new().route(
		"/healthz",
		get(move || {
			let readiness = readiness.clone();
			async move {
				if readiness.is_ready() {
					Response::builder().status(StatusCode::OK).body(Body::from("ready")).unwrap()
				} else {
					Response::builder()
						.status(StatusCode::SERVICE_UNAVAILABLE)
						.body(Body::from("not ready"))
						.unwrap()
				}
			}
		}),
	);

	let listener = TcpListener::bind(addr).await?;
	info!(addr, "readiness server listening");
	axum::serve(listener, app).await?;
	Ok(())
}
