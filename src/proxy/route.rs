//! Route descriptors and the authority (`host:port`) parser.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// The kind of backend a route dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
	Proxy,
	Static,
	Api,
}

impl Default for RouteType {
	fn default() -> Self {
		RouteType::Proxy
	}
}

impl RouteType {
	/// `type ∈ {proxy, static, api}`, empty string treated as `proxy`
	/// (SPEC_FULL.md §3). Unrecognized strings also fall through to `Proxy`
	/// rather than erroring, matching the store round-trip's leniency.
	pub fn from_str_lossy(s: &str) -> RouteType {
		match s {
			"static" => RouteType::Static,
			"api" => RouteType::Api,
			_ => RouteType::Proxy,
		}
	}
}

/// Custom rather than derived so an explicit `type = ""` in config also maps
/// to `Proxy`, not just an omitted key (`#[serde(default)]` alone only
/// covers the latter). See SPEC_FULL.md §3.
impl<'de> Deserialize<'de> for RouteType {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Ok(RouteType::from_str_lossy(&s))
	}
}

/// A single configured route, as it flows from config through the store and
/// into the ingestor. `url` is the authority the route answers on; `target`'s
/// meaning depends on `route_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
	pub url: String,
	pub target: String,
	#[serde(rename = "type", default)]
	pub route_type: RouteType,
	#[serde(default)]
	pub tls: bool,
	#[serde(default)]
	pub cert: Option<PathBuf>,
	#[serde(default)]
	pub key: Option<PathBuf>,
}

/// Split a raw authority at its *last* colon, so IPv6-literal hosts (which a
/// caller may bracket) don't confuse the split. Fails if there is no colon at
/// all, i.e. no port was given.
pub fn parse_authority(raw: &str) -> Result<(&str, &str)> {
	match raw.rfind(':') {
		Some(idx) => Ok((&raw[..idx], &raw[idx + 1..])),
		None => Err(ProxyError::NoPort(raw.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_at_last_colon() {
		assert_eq!(parse_authority("example.com:8080").unwrap(), ("example.com", "8080"));
	}

	#[test]
	fn no_port_is_an_error() {
		assert!(matches!(parse_authority("example.com"), Err(ProxyError::NoPort(_))));
	}

	#[test]
	fn ipv6_literal_splits_at_last_colon() {
		// Bracket handling isn't required, but the last-colon split must not
		// be fooled by the inner colons of an IPv6 address.
		let (host, port) = parse_authority("[::1]:9000").unwrap();
		assert_eq!(host, "[::1]");
		assert_eq!(port, "9000");
	}

	#[test]
	fn explicit_empty_type_deserializes_as_proxy() {
		let route: RouteDescriptor = toml::from_str(
			r#"
			url = "a.example:9000"
			target = "127.0.0.1:9000"
			type = ""
			"#,
		)
		.unwrap();
		assert_eq!(route.route_type, RouteType::Proxy);
	}

	#[test]
	fn omitted_type_defaults_to_proxy() {
		let route: RouteDescriptor = toml::from_str(
			r#"
			url = "a.example:9000"
			target = "127.0.0.1:9000"
			"#,
		)
		.unwrap();
		assert_eq!(route.route_type, RouteType::Proxy);
	}
}
