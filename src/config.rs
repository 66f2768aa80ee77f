//! TOML configuration loading (§10.2).
//!
//! Grounded on the teacher's `agentgateway/src/config.rs` overlay-parsing
//! idiom (decode-then-apply-defaults) and on `original_source/config.go`
//! for the exact document shape (`[web]`, `[admin]`, `[database]`,
//! `[[routes]]`).

use std::path::Path;

use serde::Deserialize;

use crate::error::{ProxyError, Result};
use crate::proxy::route::{RouteDescriptor, RouteType};

const DEFAULT_WEB_URL: &str = "localhost:8080";
const DEFAULT_ADMIN_URL: &str = "localhost:8081";
const DEFAULT_DATABASE_PATH: &str = "./gatehouse.db";

#[derive(Debug, Deserialize)]
struct RawConfig {
	#[serde(default)]
	web: ShortcutSection,
	#[serde(default)]
	admin: ShortcutSection,
	#[serde(default)]
	database: Option<String>,
	#[serde(default)]
	routes: Vec<RouteDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
struct ShortcutSection {
	#[serde(default)]
	enabled: bool,
	url: Option<String>,
	target: Option<String>,
	#[serde(default)]
	tls: bool,
	#[serde(default)]
	cert: Option<std::path::PathBuf>,
	#[serde(default)]
	key: Option<std::path::PathBuf>,
}

/// Fully resolved configuration: defaults applied, web/admin shortcuts
/// expanded into the route list.
#[derive(Debug, Clone)]
pub struct Config {
	pub database: String,
	pub routes: Vec<RouteDescriptor>,
}

impl Config {
	pub fn load(path: &Path) -> Result<Config> {
		let text = std::fs::read_to_string(path)
			.map_err(|e| ProxyError::BadConfig(format!("reading {}: {e}", path.display())))?;
		Self::parse(&text)
	}

	pub fn parse(text: &str) -> Result<Config> {
		let raw: RawConfig = toml::from_str(text).map_err(|e| ProxyError::BadConfig(e.to_string()))?;

		let mut routes = raw.routes;

		if raw.web.enabled {
			routes.push(shortcut_route(&raw.web, DEFAULT_WEB_URL)?);
		}
		if raw.admin.enabled {
			routes.push(shortcut_route(&raw.admin, DEFAULT_ADMIN_URL)?);
		}

		Ok(Config {
			database: raw.database.unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
			routes,
		})
	}
}

fn shortcut_route(section: &ShortcutSection, default_url: &str) -> Result<RouteDescriptor> {
	let target = section
		.target
		.clone()
		.ok_or_else(|| ProxyError::BadConfig("enabled shortcut section is missing target".to_string()))?;
	Ok(RouteDescriptor {
		url: section.url.clone().unwrap_or_else(|| default_url.to_string()),
		target,
		route_type: RouteType::Proxy,
		tls: section.tls,
		cert: section.cert.clone(),
		key: section.key.clone(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn applies_defaults_with_no_sections() {
		let cfg = Config::parse("").unwrap();
		assert_eq!(cfg.database, DEFAULT_DATABASE_PATH);
		assert!(cfg.routes.is_empty());
	}

	#[test]
	fn expands_web_shortcut_into_a_route() {
		let cfg = Config::parse(
			r#"
			[web]
			enabled = true
			target = "127.0.0.1:3000"
			"#,
		)
		.unwrap();
		assert_eq!(cfg.routes.len(), 1);
		assert_eq!(cfg.routes[0].url, DEFAULT_WEB_URL);
		assert_eq!(cfg.routes[0].target, "127.0.0.1:3000");
	}

	#[test]
	fn rejects_malformed_toml() {
		assert!(matches!(Config::parse("not = [valid"), Err(ProxyError::BadConfig(_))));
	}

	#[test]
	fn parses_explicit_routes() {
		let cfg = Config::parse(
			r#"
			database = "test.db"

			[[routes]]
			url = "a.example:9000"
			target = "./public"
			type = "static"
			"#,
		)
		.unwrap();
		assert_eq!(cfg.database, "test.db");
		assert_eq!(cfg.routes.len(), 1);
		assert_eq!(cfg.routes[0].route_type, RouteType::Static);
	}
}
