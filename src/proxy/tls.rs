//! Server TLS profile construction (§4.2).
//!
//! Grounded on `transport/tls.rs` in the teacher repository, which builds a
//! `rustls::ServerConfig` from a restricted `CryptoProvider` rather than the
//! flat cipher-suite list Go's `crypto/tls` exposes. We reconstruct the same
//! intent (curve order, explicit TLS 1.2 suites, TLS 1.2 minimum) on top of
//! that API.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rustls::ServerConfig;
use rustls::crypto::CryptoProvider;
use rustls::crypto::aws_lc_rs::{cipher_suite, kx_group};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::ResolvesServerCertUsingSni;
use rustls::sign::CertifiedKey;
use tracing::warn;

use crate::error::ProxyError;

const EXPIRY_WARN_THRESHOLD: Duration = Duration::from_secs(7 * 24 * 3600);

/// Load a cert/key pair and build a hardened `rustls::ServerConfig`.
///
/// Warns (but does not fail) when the leaf certificate expires within 7 days.
pub fn build_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>, ProxyError> {
	let certs = load_certs(cert_path)?;
	let key = load_key(key_path)?;

	if let Some(leaf) = certs.first() {
		warn_if_expiring_soon(leaf, cert_path);
	}

	let provider = Arc::new(CryptoProvider {
		cipher_suites: vec![
			cipher_suite::TLS13_AES_256_GCM_SHA384,
			cipher_suite::TLS13_AES_128_GCM_SHA256,
			cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
			cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
			cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
			cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
			cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
			cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
		],
		// Go's `PreferServerCipherSuites` has no direct rustls knob: rustls
		// always walks the provider's suite list in order and stops at the
		// first mutually-supported entry, i.e. this ordering *is* the server
		// preference (see SPEC_FULL.md §4.2 / DESIGN.md).
		kx_groups: vec![kx_group::X25519, kx_group::SECP256R1, kx_group::X25519MLKEM768],
		..rustls::crypto::aws_lc_rs::default_provider()
	});

	let signing_key = provider
		.key_provider
		.load_private_key(key)
		.map_err(|e| ProxyError::TlsLoad {
			cert: cert_path.to_path_buf(),
			key: key_path.to_path_buf(),
			source: anyhow::Error::new(e),
		})?;
	let certified_key = CertifiedKey::new(certs, signing_key);
	let mut resolver = ResolvesServerCertUsingSni::new();
	resolver
		.add("", certified_key)
		.map_err(|e| ProxyError::TlsLoad {
			cert: cert_path.to_path_buf(),
			key: key_path.to_path_buf(),
			source: anyhow::Error::new(e),
		})?;

	let mut cfg = ServerConfig::builder_with_provider(provider)
		.with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
		.map_err(|e| ProxyError::TlsLoad {
			cert: cert_path.to_path_buf(),
			key: key_path.to_path_buf(),
			source: anyhow::Error::new(e),
		})?
		.with_no_client_auth()
		.with_cert_resolver(Arc::new(resolver));
	cfg.alpn_protocols = vec![b"http/1.1".to_vec()];
	Ok(Arc::new(cfg))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ProxyError> {
	let bytes = std::fs::read(path).map_err(|e| ProxyError::TlsLoad {
		cert: path.to_path_buf(),
		key: path.to_path_buf(),
		source: anyhow::Error::new(e),
	})?;
	rustls_pemfile::certs(&mut bytes.as_slice())
		.collect::<Result<Vec<_>, _>>()
		.map_err(|e| ProxyError::TlsLoad {
			cert: path.to_path_buf(),
			key: path.to_path_buf(),
			source: anyhow::Error::new(e),
		})
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ProxyError> {
	let bytes = std::fs::read(path).map_err(|e| ProxyError::TlsLoad {
		cert: path.to_path_buf(),
		key: path.to_path_buf(),
		source: anyhow::Error::new(e),
	})?;
	rustls_pemfile::private_key(&mut bytes.as_slice())
		.map_err(|e| ProxyError::TlsLoad {
			cert: path.to_path_buf(),
			key: path.to_path_buf(),
			source: anyhow::Error::new(e),
		})?
		.ok_or_else(|| ProxyError::TlsLoad {
			cert: path.to_path_buf(),
			key: path.to_path_buf(),
			source: anyhow::anyhow!("no private key found in {}", path.display()),
		})
}

fn warn_if_expiring_soon(leaf: &CertificateDer<'_>, cert_path: &Path) {
	let Ok((_, parsed)) = x509_parser::parse_x509_certificate(leaf.as_ref()) else {
		return;
	};
	let not_after: SystemTime = match parsed.validity().not_after.timestamp().try_into() {
		Ok(secs) => SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
		Err(_) => return,
	};
	let Ok(remaining) = not_after.duration_since(SystemTime::now()) else {
		warn!(cert = %cert_path.display(), "certificate has already expired");
		return;
	};
	if remaining < EXPIRY_WARN_THRESHOLD {
		warn!(
			cert = %cert_path.display(),
			days_remaining = remaining.as_secs() / 86400,
			"certificate expires soon"
		);
	}
}
