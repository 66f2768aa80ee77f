//! Route ingestor (§4.4): validates and groups routes by port.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ProxyError, Result};
use crate::proxy::route::{parse_authority, RouteDescriptor};

/// Everything the listener lifecycle needs for one port: whether it's TLS,
/// its cert/key (if so), and the routes bound to it keyed by lowercased host.
pub struct ListenerGroup {
	pub port: String,
	pub tls: bool,
	pub cert: Option<std::path::PathBuf>,
	pub key: Option<std::path::PathBuf>,
	pub routes: HashMap<String, RouteDescriptor>,
}

impl ListenerGroup {
	fn new(port: String, route: &RouteDescriptor) -> ListenerGroup {
		ListenerGroup {
			port,
			tls: route.tls,
			cert: route.cert.clone(),
			key: route.key.clone(),
			routes: HashMap::new(),
		}
	}
}

/// Reject duplicate authorities (case-insensitive) up front. Called both by
/// `ingest` and, standalone, against the raw config route list before it
/// reaches the store — the store's `url` column is `UNIQUE`, so without this
/// earlier check an exact-duplicate authority in config would surface as a
/// SQL constraint violation (`ErrStore`) during reconciliation instead of
/// the ingestion taxonomy's `ErrDuplicateRoute` (spec §4.4 step 1, §7).
pub fn check_no_duplicate_authorities(descriptors: &[RouteDescriptor]) -> Result<()> {
	let mut seen_authorities = std::collections::HashSet::new();
	for route in descriptors {
		if !seen_authorities.insert(route.url.to_lowercase()) {
			return Err(ProxyError::DuplicateRoute(route.url.clone()));
		}
	}
	Ok(())
}

/// Validate, dedupe and group routes by port. Order-preserving in the sense
/// that the first route to claim a port decides that port's TLS/cert/key.
pub fn ingest(descriptors: &[RouteDescriptor]) -> Result<HashMap<String, ListenerGroup>> {
	check_no_duplicate_authorities(descriptors)?;
	let mut groups: HashMap<String, ListenerGroup> = HashMap::new();

	for route in descriptors {
		let (host, port) = parse_authority(&route.url)?;
		let host = host.to_lowercase();

		if route.tls {
			let cert = route.cert.as_deref();
			let key = route.key.as_deref();
			match (cert, key) {
				(Some(c), Some(k)) => check_cert_files_exist(&route.url, c, k)?,
				_ => {
					return Err(ProxyError::MissingCert {
						url: route.url.clone(),
						detail: "tls routes require both cert and key".to_string(),
					});
				},
			}
		}

		match groups.get_mut(port) {
			Some(group) => {
				if group.tls != route.tls {
					return Err(ProxyError::TlsConflict { port: port.to_string() });
				}
				group.routes.insert(host, route.clone());
			},
			None => {
				let mut group = ListenerGroup::new(port.to_string(), route);
				group.routes.insert(host, route.clone());
				groups.insert(port.to_string(), group);
			},
		}
	}

	Ok(groups)
}

fn check_cert_files_exist(url: &str, cert: &Path, key: &Path) -> Result<()> {
	std::fs::metadata(cert).map_err(|e| ProxyError::MissingCert {
		url: url.to_string(),
		detail: format!("cert {}: {e}", cert.display()),
	})?;
	std::fs::metadata(key).map_err(|e| ProxyError::MissingCert {
		url: url.to_string(),
		detail: format!("key {}: {e}", key.display()),
	})?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::proxy::route::RouteType;

	fn route(url: &str, tls: bool) -> RouteDescriptor {
		RouteDescriptor {
			url: url.to_string(),
			target: "127.0.0.1:1".to_string(),
			route_type: RouteType::Proxy,
			tls,
			cert: None,
			key: None,
		}
	}

	#[test]
	fn rejects_duplicate_authority() {
		let routes = vec![route("a.example:9000", false), route("a.example:9000", false)];
		assert!(matches!(ingest(&routes), Err(ProxyError::DuplicateRoute(_))));
	}

	#[test]
	fn groups_by_port_and_lowercases_host() {
		let routes = vec![route("A.Example:9000", false), route("b.example:9000", false)];
		let groups = ingest(&routes).unwrap();
		let group = groups.get("9000").unwrap();
		assert!(group.routes.contains_key("a.example"));
		assert!(group.routes.contains_key("b.example"));
	}

	#[test]
	fn rejects_tls_mismatch_on_shared_port() {
		let routes = vec![route("a.example:9003", true), route("b.example:9003", false)];
		let err = ingest(&routes).unwrap_err();
		assert!(matches!(err, ProxyError::MissingCert { .. } | ProxyError::TlsConflict { .. }));
	}

	#[test]
	fn rejects_tls_without_cert_and_key() {
		let routes = vec![route("a.example:9010", true)];
		assert!(matches!(ingest(&routes), Err(ProxyError::MissingCert { .. })));
	}

	#[test]
	fn standalone_duplicate_check_catches_exact_duplicates_before_any_store_write() {
		let routes = vec![route("a.example:9000", false), route("a.example:9000", false)];
		assert!(matches!(
			check_no_duplicate_authorities(&routes),
			Err(ProxyError::DuplicateRoute(_))
		));
	}

	#[test]
	fn standalone_duplicate_check_is_case_insensitive() {
		let routes = vec![route("A.Example:9000", false), route("a.example:9000", false)];
		assert!(matches!(
			check_no_duplicate_authorities(&routes),
			Err(ProxyError::DuplicateRoute(_))
		));
	}
}
