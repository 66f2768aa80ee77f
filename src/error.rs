//! Error taxonomy for the proxy core.
//!
//! Every variant here maps to one of the `Err*` kinds in the design doc's
//! error-handling table. Request-time errors (`Upstream`) never propagate out
//! of a handler; they are turned into a response and logged. Everything else
//! is fatal at startup and bubbles to `main`.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
	#[error("invalid config: {0}")]
	BadConfig(String),

	#[error("no port defined in authority {0:?}")]
	NoPort(String),

	#[error("duplicate route configuration: {0}")]
	DuplicateRoute(String),

	#[error("port {port} cannot listen on tls=true and tls=false at the same time")]
	TlsConflict { port: String },

	#[error("tls route {url} is missing cert/key files: {detail}")]
	MissingCert { url: String, detail: String },

	#[error("load tls certificate {cert:?} / key {key:?}: {source}")]
	TlsLoad {
		cert: PathBuf,
		key: PathBuf,
		#[source]
		source: anyhow::Error,
	},

	#[error("invalid proxy target {target:?}: {source}")]
	BadTarget {
		target: String,
		#[source]
		source: anyhow::Error,
	},

	#[error("unsupported static file type at {0:?}")]
	UnsupportedStatic(PathBuf),

	#[error("api handler not found: {0}")]
	UnknownAPI(String),

	#[error("api handler already registered: {0}")]
	APIDuplicate(String),

	#[error("route store error: {0}")]
	Store(#[source] anyhow::Error),

	#[error("io error at {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

pub type Result<T> = std::result::Result<T, ProxyError>;
