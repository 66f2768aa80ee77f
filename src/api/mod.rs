//! Process-wide API handler registry (§4.3 API backend, §5, §6).
//!
//! Populated once before any listener starts and never mutated afterward.
//! `ApiRegistryBuilder::finish` seals the handler map behind an `Arc`, so the
//! resulting `ApiRegistry` is frozen and cheap to clone into every handler
//! that needs to `lookup` by name — no lock on the request path. The process
//! builds exactly one of these in `main`; modeled as an owned, sealed value
//! rather than a lazily-populated global so construction stays testable
//! (each test gets its own registry instance) while still matching the
//! init-once, never-mutated lifecycle the design calls for. Grounded on the
//! teacher's init-once patterns for process-wide singletons (e.g. the
//! metrics registry under `crates/agentgateway/src/telemetry`).

pub mod handlers;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use http::{Request, Response};

use crate::error::{ProxyError, Result};

pub type ApiFn = Arc<dyn Fn(Request<Body>) -> Pin<Box<dyn Future<Output = Response<Body>> + Send>> + Send + Sync>;

/// A builder collecting `(name, handler)` pairs before the registry is
/// sealed. `finish` freezes it into an `ApiRegistry`.
#[derive(Default)]
pub struct ApiRegistryBuilder {
	handlers: HashMap<String, ApiFn>,
}

impl ApiRegistryBuilder {
	pub fn new() -> ApiRegistryBuilder {
		ApiRegistryBuilder::default()
	}

	/// Register a handler under `name`. Fails with `ErrAPIDuplicate` if the
	/// name was already registered in this builder.
	pub fn register<F, Fut>(&mut self, name: &str, handler: F) -> Result<()>
	where
		F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Response<Body>> + Send + 'static,
	{
		if self.handlers.contains_key(name) {
			return Err(ProxyError::APIDuplicate(name.to_string()));
		}
		self.handlers
			.insert(name.to_string(), Arc::new(move |req| Box::pin(handler(req))));
		Ok(())
	}

	/// Seal the registry. Never mutated again once an `ApiRegistry` exists.
	pub fn finish(self) -> ApiRegistry {
		ApiRegistry {
			handlers: Arc::new(self.handlers),
		}
	}
}

/// A sealed, immutable handler table. Cheap to clone (`Arc` internally);
/// `lookup` reads the frozen map with no locking.
#[derive(Clone)]
pub struct ApiRegistry {
	handlers: Arc<HashMap<String, ApiFn>>,
}

impl ApiRegistry {
	pub fn lookup(&self, name: &str) -> Result<ApiFn> {
		self.handlers
			.get(name)
			.cloned()
			.ok_or_else(|| ProxyError::UnknownAPI(name.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_duplicate_registration_in_builder() {
		let mut builder = ApiRegistryBuilder::new();
		builder
			.register("health", |_req| async { Response::new(Body::empty()) })
			.unwrap();
		let err = builder.register("health", |_req| async { Response::new(Body::empty()) });
		assert!(matches!(err, Err(ProxyError::APIDuplicate(_))));
	}
}
