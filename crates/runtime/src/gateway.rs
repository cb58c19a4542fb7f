//! Top-level wiring of the server registry and the dispatcher.

use std::sync::Arc;

use ssap_protocol::Codec;

use crate::caller::{CallerHandle, InboundRequest, Reply};
use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::registry::{DiscoveryEvent, ServerRegistry};

/// Client gateway: routes caller requests to known servers.
pub struct Gateway {
	ctx: Arc<GatewayContext>,
	servers: ServerRegistry,
	dispatcher: Dispatcher,
}

impl Gateway {
	/// Builds the registry and spawns the worker pool on the current runtime.
	pub fn new(ctx: Arc<GatewayContext>) -> Self {
		let servers = ServerRegistry::new(Arc::clone(&ctx));
		let dispatcher = Dispatcher::new(&ctx);
		tracing::info!(
			target: "ssap.gateway",
			workers = dispatcher.worker_count(),
			buffer = ctx.config.receive_buffer_size,
			"gateway started"
		);
		Self {
			ctx,
			servers,
			dispatcher,
		}
	}

	/// Gateway over plain TCP.
	pub fn with_tcp(config: GatewayConfig, codec: Arc<dyn Codec>) -> Result<Self> {
		Ok(Self::new(GatewayContext::with_tcp(config, codec)?))
	}

	pub fn context(&self) -> &Arc<GatewayContext> {
		&self.ctx
	}

	pub fn servers(&self) -> &ServerRegistry {
		&self.servers
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Announces the configured fixed-address servers. Returns how many.
	pub fn announce_configured(&self) -> usize {
		let servers = &self.ctx.config.servers;
		for info in servers {
			self.handle_discovery(DiscoveryEvent::Added(info.clone()));
		}
		servers.len()
	}

	pub fn handle_discovery(&self, event: DiscoveryEvent) {
		tracing::debug!(target: "ssap.gateway", ?event, "discovery event");
		self.servers.handle_discovery(event);
	}

	/// Routes one caller request to its server's worker queue.
	///
	/// An unknown server or a closed queue gets the operation's failure reply
	/// right away and the error is returned.
	pub fn handle_request(&self, request: &InboundRequest, caller: &CallerHandle) -> Result<()> {
		let submitted = self
			.servers
			.find(&request.server_id)
			.and_then(|server| self.dispatcher.submit(&server, caller, request));

		if let Err(err) = &submitted {
			tracing::warn!(
				target: "ssap.gateway",
				server = %request.server_id,
				access = %request.access_id,
				error = %err,
				"request rejected"
			);
			if let Some(reply) = Reply::failure(&request.operation, &request.access_id) {
				caller.send(reply);
			}
		}
		submitted
	}

	/// Closes the queue and waits for the workers.
	pub async fn shutdown(&self) {
		self.dispatcher.shutdown().await;
		tracing::info!(target: "ssap.gateway", "gateway stopped");
	}
}
