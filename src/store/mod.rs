//! Persistent route storage (§4.7, §6 schema): a single-writer SQLite table
//! that reconciles config-sourced routes on every startup.
//!
//! Grounded on the teacher's `store/` module organization (a thin façade
//! around a pool, schema applied via inline SQL rather than a migrations
//! crate) and on `original_source/storage/storage.go` for the exact
//! reconcile-by-delete-then-reinsert transaction semantics.

pub mod routes;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{ProxyError, Result};

/// Owns the single writer connection to the route table. `max_connections`
/// is pinned to 1 (§5: "pool size 1") to serialize every write against the
/// config-reconciliation transaction.
#[derive(Clone)]
pub struct Storage {
	pool: SqlitePool,
}

impl Storage {
	pub async fn open(database_path: &str) -> Result<Storage> {
		let url = if database_path == ":memory:" {
			"sqlite::memory:".to_string()
		} else {
			format!("sqlite://{database_path}")
		};
		let options = SqliteConnectOptions::from_str(&url)
			.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?
			.create_if_missing(true);

		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.build(options)
			.await
			.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;

		let storage = Storage { pool };
		storage.migrate().await?;
		info!(path = %database_path, "route store opened");
		Ok(storage)
	}

	async fn migrate(&self) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS proxy_routes (
				id         INTEGER PRIMARY KEY AUTOINCREMENT,
				url        TEXT NOT NULL UNIQUE,
				target     TEXT NOT NULL,
				type       TEXT NOT NULL DEFAULT 'proxy',
				tls        BOOLEAN NOT NULL DEFAULT 0,
				cert       TEXT,
				key        TEXT,
				enabled    BOOLEAN NOT NULL DEFAULT 1,
				source     TEXT NOT NULL,
				created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
				updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
			)
			"#,
		)
		.execute(&self.pool)
		.await
		.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;

		sqlx::query("CREATE INDEX IF NOT EXISTS idx_proxy_routes_url ON proxy_routes(url)")
			.execute(&self.pool)
			.await
			.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;
		sqlx::query("CREATE INDEX IF NOT EXISTS idx_proxy_routes_enabled ON proxy_routes(enabled)")
			.execute(&self.pool)
			.await
			.map_err(|e| ProxyError::Store(anyhow::Error::new(e)))?;

		Ok(())
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}
