//! Handler factories (§4.3): static, reverse-proxy and api-registry backends,
//! unified behind a single `Handler::serve`.
//!
//! Grounded on the teacher's `ui.rs` (tower_http `ServeDir`/`ServeFile`
//! wrapped in a tower `Service` and driven with `.oneshot`) and `client/mod.rs`
//! (a per-target HTTP client holding its own pool policy).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http::{HeaderValue, Request, Response, StatusCode};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info};

use crate::api::ApiRegistry;
use crate::error::{ProxyError, Result};
use crate::proxy::route::{RouteDescriptor, RouteType};

const SYSTEM_NAME: &str = "gatehouse";
const UPSTREAM_IDLE_PER_HOST: usize = 10;
const UPSTREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// A ready-to-serve backend for one (port, host) pair. Built once during
/// ingestion, immutable thereafter, safe to share across requests.
#[derive(Clone)]
pub enum Handler {
	Static(StaticHandler),
	Proxy(Arc<ProxyHandler>),
	Api(Arc<ApiHandler>),
}

impl Handler {
	pub async fn serve(&self, req: Request<Body>) -> Response<Body> {
		match self {
			Handler::Static(h) => h.serve(req).await,
			Handler::Proxy(h) => h.serve(req).await,
			Handler::Api(h) => h.serve(req).await,
		}
	}

	/// Build the handler for one route. Synchronous, no network I/O.
	pub fn build(route: &RouteDescriptor, api_registry: &ApiRegistry) -> Result<Handler> {
		match route.route_type {
			RouteType::Static => Ok(Handler::Static(StaticHandler::build(route)?)),
			RouteType::Proxy => Ok(Handler::Proxy(Arc::new(ProxyHandler::build(route)?))),
			RouteType::Api => Ok(Handler::Api(Arc::new(ApiHandler::build(route, api_registry)?))),
		}
	}
}

/// Serves a single rooted directory, or always serves a single fixed file
/// regardless of the request path. Both are backed by `tower_http`'s
/// directory-scoped services, which reject `..` traversal and symlink escape
/// at the I/O layer (the "rooted filesystem" of §4.3/§9).
#[derive(Clone)]
pub enum StaticHandler {
	Dir(ServeDir),
	File(ServeFile),
}

impl StaticHandler {
	fn build(route: &RouteDescriptor) -> Result<StaticHandler> {
		let target = Path::new(&route.target);
		let meta = std::fs::metadata(target).map_err(|e| ProxyError::Io {
			path: target.to_path_buf(),
			source: e,
		})?;
		if meta.is_dir() {
			info!(folder = %route.target, "static folder handler created");
			Ok(StaticHandler::Dir(ServeDir::new(target)))
		} else if meta.is_file() {
			info!(file = %route.target, "static file handler created");
			Ok(StaticHandler::File(ServeFile::new(target)))
		} else {
			Err(ProxyError::UnsupportedStatic(target.to_path_buf()))
		}
	}

	async fn serve(&self, req: Request<Body>) -> Response<Body> {
		debug!(path = %req.uri().path(), "serving static content");
		let result = match self {
			StaticHandler::Dir(svc) => svc.clone().oneshot(req).await,
			StaticHandler::File(svc) => svc.clone().oneshot(req).await,
		};
		match result {
			Ok(resp) => resp.map(Body::new),
			Err(infallible) => match infallible {},
		}
	}
}

/// A single-upstream reverse proxy. One `reqwest::Client` per route, scoped
/// to that route's one upstream host, which makes the per-host idle-conn cap
/// the operative pool limit (see SPEC_FULL.md §4.3 on the dropped
/// cross-host total cap).
pub struct ProxyHandler {
	client: reqwest::Client,
	target: http::Uri,
	insecure: bool,
}

impl ProxyHandler {
	fn build(route: &RouteDescriptor) -> Result<ProxyHandler> {
		let normalized = normalize_target(&route.target);
		let target: http::Uri = normalized.parse().map_err(|e| ProxyError::BadTarget {
			target: normalized.clone(),
			source: anyhow::Error::new(e),
		})?;
		let insecure = target.scheme_str() == Some("https");

		let mut builder = reqwest::Client::builder()
			.pool_max_idle_per_host(UPSTREAM_IDLE_PER_HOST)
			.pool_idle_timeout(UPSTREAM_IDLE_TIMEOUT)
			.tcp_keepalive(Some(UPSTREAM_IDLE_TIMEOUT));
		if insecure {
			// Deliberately weak default for internal upstreams; see §9.
			builder = builder.danger_accept_invalid_certs(true);
		}
		let client = builder.build().map_err(|e| ProxyError::BadTarget {
			target: normalized.clone(),
			source: anyhow::Error::new(e),
		})?;

		Ok(ProxyHandler {
			client,
			target,
			insecure,
		})
	}

	async fn serve(&self, req: Request<Body>) -> Response<Body> {
		let original_host = req
			.headers()
			.get(http::header::HOST)
			.and_then(|h| h.to_str().ok())
			.unwrap_or_default()
			.to_string();
		let target_host = self.target.authority().map(|a| a.to_string()).unwrap_or_default();

		let mut url = format!(
			"{}://{}",
			self.target.scheme_str().unwrap_or("http"),
			target_host
		);
		if let Some(pq) = req.uri().path_and_query() {
			url.push_str(pq.as_str());
		}

		let (parts, body) = req.into_parts();
		let body_bytes = match http_body_util::BodyExt::collect(body).await {
			Ok(collected) => collected.to_bytes(),
			Err(e) => {
				error!(target = %url, error = %e, "failed reading request body");
				return bad_gateway();
			},
		};

		let mut upstream_req = self.client.request(parts.method.clone(), url.as_str());
		for (name, value) in parts.headers.iter() {
			upstream_req = upstream_req.header(name, value);
		}
		upstream_req = upstream_req
			.header("X-Forwarded-Host", HeaderValue::from_str(&original_host).unwrap_or(HeaderValue::from_static("")))
			.header("X-Origin-Host", HeaderValue::from_str(&target_host).unwrap_or(HeaderValue::from_static("")))
			.header("X-Proxy", HeaderValue::from_static(SYSTEM_NAME))
			.body(body_bytes);

		match upstream_req.send().await {
			Ok(upstream_resp) => {
				let status = upstream_resp.status();
				let mut resp = Response::builder().status(status);
				for (name, value) in upstream_resp.headers().iter() {
					resp = resp.header(name, value);
				}
				let bytes = upstream_resp.bytes().await.unwrap_or_default();
				resp.body(Body::from(bytes)).unwrap_or_else(|_| bad_gateway())
			},
			Err(e) => {
				error!(target = %url, path = %parts.uri.path(), error = %e, "proxy error");
				bad_gateway()
			},
		}
	}
}

fn bad_gateway() -> Response<Body> {
	Response::builder()
		.status(StatusCode::BAD_GATEWAY)
		.body(Body::from("Bad Gateway"))
		.expect("static response is valid")
}

fn normalize_target(target: &str) -> String {
	if target.starts_with("http://") || target.starts_with("https://") {
		target.to_string()
	} else {
		format!("http://{target}")
	}
}

/// Looks up `target` as a handler name in the process-wide API registry and
/// wraps it with a per-invocation debug log line.
pub struct ApiHandler {
	name: String,
	inner: crate::api::ApiFn,
}

impl ApiHandler {
	fn build(route: &RouteDescriptor, registry: &ApiRegistry) -> Result<ApiHandler> {
		let inner = registry.lookup(&route.target)?;
		info!(function = %route.target, "api handler created");
		Ok(ApiHandler {
			name: route.target.clone(),
			inner,
		})
	}

	async fn serve(&self, req: Request<Body>) -> Response<Body> {
		debug!(function = %self.name, path = %req.uri().path(), "api handler called");
		(self.inner)(req).await
	}
}
