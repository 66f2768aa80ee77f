//! Shared request router (§4.5): host+port demultiplexing to a cached handler.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use http::{Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::proxy::handler::Handler;

/// One handler table per port, frozen after startup. Cheap to clone (`Arc`
/// wrapped internally by callers); lookups never take a lock.
pub struct PortTable {
	pub tls: bool,
	pub hosts: HashMap<String, Handler>,
}

/// The single request entry point shared by every listener. Built once,
/// handed to every server as an `Arc`.
#[derive(Clone)]
pub struct Router {
	ports: Arc<HashMap<String, PortTable>>,
}

impl Router {
	pub fn new(ports: HashMap<String, PortTable>) -> Router {
		Router { ports: Arc::new(ports) }
	}

	/// Dispatch one request. `connection_is_tls` supplies the default port
	/// (443 vs 80) used when the request's `Host` header carries no port.
	pub async fn route(&self, req: Request<Body>, connection_is_tls: bool) -> Response<Body> {
		let host_header = req
			.headers()
			.get(http::header::HOST)
			.and_then(|h| h.to_str().ok())
			.unwrap_or_default()
			.to_string();

		let (host, port) = split_host_port(&host_header, connection_is_tls);
		let host = host.to_lowercase();

		let Some(table) = self.ports.get(&port) else {
			warn!(port = %port, host = %host, "no listener group bound to port");
			return status(StatusCode::SERVICE_UNAVAILABLE);
		};

		let Some(handler) = table.hosts.get(&host) else {
			debug!(port = %port, host = %host, "host not configured on this port");
			return status(StatusCode::NOT_FOUND);
		};

		handler.serve(req).await
	}
}

/// Split a `Host` header value into (host, port), defaulting the port to 443
/// or 80 per §4.5 when the header carries no explicit port.
fn split_host_port(host_header: &str, connection_is_tls: bool) -> (&str, String) {
	match host_header.rfind(':') {
		Some(idx) => (&host_header[..idx], host_header[idx + 1..].to_string()),
		None => {
			let default_port = if connection_is_tls { "443" } else { "80" };
			(host_header, default_port.to_string())
		},
	}
}

fn status(code: StatusCode) -> Response<Body> {
	Response::builder()
		.status(code)
		.body(Body::empty())
		.expect("static response is valid")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_port_is_used_verbatim() {
		assert_eq!(split_host_port("example.com:9000", false), ("example.com", "9000".to_string()));
	}

	#[test]
	fn missing_port_infers_443_over_tls() {
		assert_eq!(split_host_port("example.com", true), ("example.com", "443".to_string()));
	}

	#[test]
	fn missing_port_infers_80_plaintext() {
		assert_eq!(split_host_port("example.com", false), ("example.com", "80".to_string()));
	}
}
