//! Shutdown controller (§4.8): merges signal, listener-error and
//! worker-completion sources into one ordered teardown.
//!
//! Grounded on the teacher's `core/src/drain.rs` (a watch-channel-driven
//! graceful/immediate mode) and `core/src/signal.rs` (the SIGINT/SIGTERM
//! trigger that feeds it).

use std::time::Duration;

use tracing::{error, info, warn};

use crate::proxy::listener::StartedListeners;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);
const OUTER_WAIT: Duration = Duration::from_secs(6);

/// Run until one of: the host signals termination, a listener reports a
/// fatal error, or every listener worker has exited on its own. Returns the
/// triggering error, if any, so the caller can choose a non-zero exit code.
pub async fn run(
	started: StartedListeners,
	mut signal_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
	let StartedListeners {
		handles,
		mut errors,
		all_done,
		workers_remaining,
	} = started;

	if workers_remaining.load(std::sync::atomic::Ordering::SeqCst) == 0 {
		info!("no listeners were started");
		return Ok(());
	}

	let done = all_done.notified();
	tokio::pin!(done);

	let triggering_error = tokio::select! {
		biased;
		_ = signal_rx.changed() => {
			info!("shutdown requested by signal");
			None
		}
		Some(e) = errors.recv() => {
			error!(error = %e, "listener error triggered shutdown");
			Some(e)
		}
		_ = &mut done => {
			info!("all listener workers exited on their own; nothing to shut down");
			return Ok(());
		}
	};

	info!(deadline_secs = SHUTDOWN_DEADLINE.as_secs(), "shutting down listeners");
	let shutdowns = handles.into_iter().map(|h| h.shutdown(SHUTDOWN_DEADLINE));
	let results = futures_join_all(shutdowns).await;
	if results.iter().any(|drained| !*drained) {
		warn!("one or more listeners did not drain within the shutdown deadline");
	}

	// Every `h.shutdown(..)` above already awaited its own worker's
	// `JoinHandle`, so by this point `workers_remaining` may well already be
	// zero — re-checking the counter before (and between) waits on
	// `all_done` avoids registering a `Notified` after its `notify_waiters()`
	// has already fired, which would otherwise never wake (mirrors the
	// counter-then-notify pattern `ListenerHandle::shutdown` uses above).
	let outer_wait = async {
		while workers_remaining.load(std::sync::atomic::Ordering::SeqCst) > 0 {
			all_done.notified().await;
		}
	};
	match tokio::time::timeout(OUTER_WAIT, outer_wait).await {
		Ok(_) => info!("shutdown complete"),
		Err(_) => warn!("shutdown timeout"),
	}

	match triggering_error {
		Some(e) => Err(e),
		None => Ok(()),
	}
}

/// `futures::future::join_all` without pulling in the `futures` crate for
/// one call site; awaits a fixed set of same-typed futures concurrently.
async fn futures_join_all<F: std::future::Future<Output = bool>>(futs: impl Iterator<Item = F>) -> Vec<bool> {
	let mut set = tokio::task::JoinSet::new();
	for fut in futs {
		set.spawn(fut);
	}
	let mut out = Vec::new();
	while let Some(res) = set.join_next().await {
		out.push(res.unwrap_or(false));
	}
	out
}
