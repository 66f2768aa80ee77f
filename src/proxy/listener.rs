//! Listener lifecycle (§4.6): one accept loop per `ListenerGroup`, each
//! driven by the shared `Router`, each independently stoppable.
//!
//! Grounded on the teacher's `app.rs` (one task per bound port, a shared
//! error channel sized to the listener count) and `transport/tls.rs` for the
//! TLS-terminating variant, hand-rolled with `hyper_util`'s connection
//! builder since the shared dispatch unit here is our own `Router`, not an
//! axum `Router`.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request as HyperRequest;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use crate::error::{ProxyError, Result};
use crate::proxy::ingest::ListenerGroup;
use crate::proxy::router::Router;
use crate::proxy::tls::build_server_config;

/// A running listener: carries the means to ask its accept loop to stop and
/// to wait for its in-flight connections to drain.
pub struct ListenerHandle {
	pub port: String,
	shutdown_tx: watch::Sender<bool>,
	active: Arc<AtomicUsize>,
	drained: Arc<Notify>,
	join: tokio::task::JoinHandle<()>,
}

impl ListenerHandle {
	/// Stop accepting new connections and wait up to `deadline` for
	/// in-flight ones to finish. Returns `true` if fully drained in time.
	pub async fn shutdown(self, deadline: Duration) -> bool {
		let _ = self.shutdown_tx.send(true);
		let drained = self.drained.clone();
		let active = self.active.clone();
		let wait = async {
			while active.load(Ordering::SeqCst) > 0 {
				drained.notified().await;
			}
		};
		let result = tokio::time::timeout(deadline, wait).await.is_ok();
		let _ = self.join.await;
		result
	}
}

/// Start one accept-loop task per group. Returns the handles plus an error
/// channel sized to the listener count, so a failing listener never blocks
/// another from reporting (§4.6).
pub struct StartedListeners {
	pub handles: Vec<ListenerHandle>,
	pub errors: tokio::sync::mpsc::Receiver<anyhow::Error>,
	/// Fires once every accept loop has returned, whether due to a requested
	/// shutdown or an unexpected exit (§4.8's "done" signal).
	pub all_done: Arc<Notify>,
	pub workers_remaining: Arc<AtomicUsize>,
}

pub fn start_listeners(
	groups: std::collections::HashMap<String, ListenerGroup>,
	handlers_by_port: std::collections::HashMap<String, crate::proxy::router::PortTable>,
) -> Result<StartedListeners> {
	let n = groups.len().max(1);
	let (err_tx, err_rx) = tokio::sync::mpsc::channel(n);
	let workers_remaining = Arc::new(AtomicUsize::new(groups.len()));
	let all_done = Arc::new(Notify::new());

	let mut handles = Vec::with_capacity(groups.len());
	let router = Router::new(handlers_by_port);

	for (port, group) in groups {
		let tls_config = if group.tls {
			let cert = group.cert.as_deref().expect("tls group always has a cert path");
			let key = group.key.as_deref().expect("tls group always has a key path");
			Some(build_server_config(cert, key)?)
		} else {
			None
		};

		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let active = Arc::new(AtomicUsize::new(0));
		let drained = Arc::new(Notify::new());
		let router = router.clone();
		let err_tx = err_tx.clone();
		let port_for_task = port.clone();
		let active_task = active.clone();
		let drained_task = drained.clone();
		let workers_remaining = workers_remaining.clone();
		let all_done = all_done.clone();

		let join = tokio::spawn(async move {
			if let Err(e) = accept_loop(
				port_for_task.clone(),
				group.tls,
				tls_config,
				router,
				shutdown_rx,
				active_task,
				drained_task,
			)
			.await
			{
				error!(port = %port_for_task, error = %e, "listener accept loop failed");
				let _ = err_tx.send(e).await;
			}
			if workers_remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
				all_done.notify_waiters();
			}
		});

		handles.push(ListenerHandle {
			port,
			shutdown_tx,
			active,
			drained,
			join,
		});
	}

	Ok(StartedListeners {
		handles,
		errors: err_rx,
		all_done,
		workers_remaining,
	})
}

async fn accept_loop(
	port: String,
	is_tls: bool,
	tls_config: Option<Arc<rustls::ServerConfig>>,
	router: Router,
	mut shutdown_rx: watch::Receiver<bool>,
	active: Arc<AtomicUsize>,
	drained: Arc<Notify>,
) -> std::result::Result<(), anyhow::Error> {
	let listener = TcpListener::bind(("0.0.0.0", port.parse::<u16>()?)).await?;
	info!(port = %port, tls = is_tls, "listener bound");

	let acceptor = tls_config.map(TlsAcceptor::from);

	loop {
		tokio::select! {
			biased;
			_ = shutdown_rx.changed() => {
				if *shutdown_rx.borrow() {
					info!(port = %port, "listener stopping accept loop");
					break;
				}
			}
			accepted = listener.accept() => {
				let (stream, _peer) = accepted?;
				let router = router.clone();
				let acceptor = acceptor.clone();
				let active = active.clone();
				let drained = drained.clone();

				active.fetch_add(1, Ordering::SeqCst);
				tokio::spawn(async move {
					if let Some(acceptor) = acceptor {
						match acceptor.accept(stream).await {
							Ok(tls_stream) => serve_connection(tls_stream, router, true).await,
							Err(e) => warn!(error = %e, "tls handshake failed"),
						}
					} else {
						serve_connection(stream, router, false).await;
					}
					if active.fetch_sub(1, Ordering::SeqCst) == 1 {
						drained.notify_waiters();
					}
				});
			}
		}
	}

	Ok(())
}

async fn serve_connection<S>(stream: S, router: Router, is_tls: bool)
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
	let io = TokioIo::new(stream);
	let service = hyper::service::service_fn(move |req: HyperRequest<Incoming>| {
		let router = router.clone();
		async move {
			let (parts, body) = req.into_parts();
			let body = axum::body::Body::new(body.map_err(axum::Error::new));
			let req = HyperRequest::from_parts(parts, body);
			let resp = router.route(req, is_tls).await;
			Ok::<_, Infallible>(resp)
		}
	});

	if let Err(e) = ConnBuilder::new(TokioExecutor::new())
		.serve_connection_with_upgrades(io, service)
		.await
	{
		warn!(error = %e, "connection error");
	}
}

/// Give every group its frozen handler table, keyed by port, ready for the
/// router (§4.3/§4.4 boundary: ingestion produces groups, construction fills
/// handlers, this module only consumes the result).
pub fn build_port_tables(
	groups: &std::collections::HashMap<String, ListenerGroup>,
	handlers: std::collections::HashMap<String, std::collections::HashMap<String, crate::proxy::handler::Handler>>,
) -> Result<std::collections::HashMap<String, crate::proxy::router::PortTable>> {
	let mut tables = std::collections::HashMap::new();
	for (port, group) in groups {
		let hosts = handlers.get(port).cloned().ok_or_else(|| {
			ProxyError::BadConfig(format!("no handlers built for port {port}"))
		})?;
		tables.insert(
			port.clone(),
			crate::proxy::router::PortTable {
				tls: group.tls,
				hosts,
			},
		);
	}
	Ok(tables)
}
