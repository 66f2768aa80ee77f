//! Config→store reconciliation (§4.7) and the read-back used at startup.

use sqlx::Row;
use tracing::info;

use crate::error::{ProxyError, Result};
use crate::proxy::route::{RouteDescriptor, RouteType};
use crate::store::Storage;

const SOURCE_CONFIG: &str = "config";

impl Storage {
	/// Delete every `source='config'` row and reinsert the given routes in
	/// one transaction, rolling back on any failure. Rows from other
	/// sources (e.g. a future admin interface) are left untouched.
	pub async fn sync_config_routes(&self, routes: &[RouteDescriptor]) -> Result<()> {
		let mut tx = self.pool().begin().await.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;

		sqlx::query("DELETE FROM proxy_routes WHERE source = ?")
			.bind(SOURCE_CONFIG)
			.execute(&mut *tx)
			.await
			.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;

		for route in routes {
			sqlx::query(
				r#"
				INSERT INTO proxy_routes (url, target, type, tls, cert, key, enabled, source)
				VALUES (?, ?, ?, ?, ?, ?, 1, ?)
				"#,
			)
			.bind(&route.url)
			.bind(&route.target)
			.bind(route_type_str(route.route_type))
			.bind(route.tls)
			.bind(route.cert.as_ref().map(|p| p.to_string_lossy().to_string()))
			.bind(route.key.as_ref().map(|p| p.to_string_lossy().to_string()))
			.bind(SOURCE_CONFIG)
			.execute(&mut *tx)
			.await
			.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;
		}

		tx.commit().await.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;
		info!(routes = routes.len(), "config routes reconciled into store");
		Ok(())
	}

	/// Read back every enabled route, ordered by url, for use as the
	/// proxy's input set (§4.7 step 5).
	pub async fn active_routes(&self) -> Result<Vec<RouteDescriptor>> {
		let rows = sqlx::query(
			r#"
			SELECT url, target, type, tls, cert, key
			FROM proxy_routes
			WHERE enabled = 1
			ORDER BY url
			"#,
		)
		.fetch_all(self.pool())
		.await
		.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;

		rows.into_iter()
			.map(|row| {
				let type_str: String = row.try_get("type").map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;
				let cert: Option<String> = row.try_get("cert").map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;
				let key: Option<String> = row.try_get("key").map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;
				Ok(RouteDescriptor {
					url: row.try_get("url").map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?,
					target: row.try_get("target").map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?,
					route_type: RouteType::from_str_lossy(&type_str),
					tls: row.try_get("tls").map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?,
					cert: cert.map(std::path::PathBuf::from),
					key: key.map(std::path::PathBuf::from),
				})
			})
			.collect()
	}
}

fn route_type_str(t: RouteType) -> &'static str {
	match t {
		RouteType::Proxy => "proxy",
		RouteType::Static => "static",
		RouteType::Api => "api",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn reconciles_and_reads_back_routes() {
		let storage = Storage::open(":memory:").await.unwrap();
		let routes = vec![RouteDescriptor {
			url: "a.example:9000".to_string(),
			target: "./public".to_string(),
			route_type: RouteType::Static,
			tls: false,
			cert: None,
			key: None,
		}];

		storage.sync_config_routes(&routes).await.unwrap();
		let active = storage.active_routes().await.unwrap();
		assert_eq!(active.len(), 1);
		assert_eq!(active[0].url, "a.example:9000");

		// Idempotent: reconciling the same set twice leaves the store
		// identical (§8 "idempotent reconciliation" law).
		storage.sync_config_routes(&routes).await.unwrap();
		let active_again = storage.active_routes().await.unwrap();
		assert_eq!(active_again, active);
	}

	/// Callers (`main::run`) must reject exact-duplicate authorities with
	/// `check_no_duplicate_authorities` before reaching this method, since
	/// the `url` column is `UNIQUE` and would otherwise surface the conflict
	/// as `ErrStore` rather than `ErrDuplicateRoute`.
	#[tokio::test]
	async fn exact_duplicate_authorities_fail_the_unique_constraint() {
		let storage = Storage::open(":memory:").await.unwrap();
		let routes = vec![
			RouteDescriptor {
				url: "a.example:9000".to_string(),
				target: "./public".to_string(),
				route_type: RouteType::Static,
				tls: false,
				cert: None,
				key: None,
			},
			RouteDescriptor {
				url: "a.example:9000".to_string(),
				target: "./other".to_string(),
				route_type: RouteType::Static,
				tls: false,
				cert: None,
				key: None,
			},
		];

		assert!(crate::proxy::ingest::check_no_duplicate_authorities(&routes).is_err());
		assert!(storage.sync_config_routes(&routes).await.is_err());
	}
}
