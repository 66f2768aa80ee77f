//! The proxy core: ingest routes, build handlers, run listeners, coordinate
//! shutdown. This module is the single entry point `main` drives.

pub mod handler;
pub mod ingest;
pub mod listener;
pub mod route;
pub mod router;
pub mod shutdown;
pub mod tls;

use std::collections::HashMap;

use tracing::info;

use crate::api::ApiRegistry;
use crate::error::Result;
use crate::proxy::handler::Handler;
use crate::proxy::ingest::{ingest, ListenerGroup};
use crate::proxy::route::RouteDescriptor;

/// Build every `ListenerGroup` and its frozen handler table from a flat list
/// of routes. Fails fast on any ingestion or handler-construction error
/// (§4.4); nothing is started yet.
pub fn build(
	routes: &[RouteDescriptor],
	api_registry: &ApiRegistry,
) -> Result<(HashMap<String, ListenerGroup>, HashMap<String, HashMap<String, Handler>>)> {
	let groups = ingest(routes)?;

	let mut handlers: HashMap<String, HashMap<String, Handler>> = HashMap::new();
	for (port, group) in &groups {
		let mut host_handlers = HashMap::new();
		for (host, route) in &group.routes {
			let handler = Handler::build(route, api_registry)?;
			host_handlers.insert(host.clone(), handler);
		}
		handlers.insert(port.clone(), host_handlers);
	}

	info!(listener_groups = groups.len(), "proxy core built");
	Ok((groups, handlers))
}

/// Start every listener and run the shutdown controller to completion. This
/// future resolves once the process should exit.
pub async fn run(
	groups: HashMap<String, ListenerGroup>,
	handlers: HashMap<String, HashMap<String, Handler>>,
	signal_rx: tokio::sync::watch::Receiver<bool>,
	on_started: impl FnOnce(),
) -> anyhow::Result<()> {
	let tables = listener::build_port_tables(&groups, handlers)?;
	let started = listener::start_listeners(groups, tables)?;
	on_started();
	shutdown::run(started, signal_rx).await
}
