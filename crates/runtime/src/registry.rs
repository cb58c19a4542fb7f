//! Registry of known servers, fed by discovery.
//!
//! The lock covers only the lookup or mutation. A handle returned by
//! [`ServerRegistry::find`] is already cloned, so callers use it outside the
//! lock for as long as they like.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::GatewayContext;
use crate::error::{Error, Result};
use crate::server::{Server, ServerHandle, ServerInfo};

/// Server lifecycle events from a discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
	Added(ServerInfo),
	Removed { identity: String },
	/// The server was announced but is unusable; handled like removal.
	Invalid { identity: String },
}

pub struct ServerRegistry {
	ctx: Arc<GatewayContext>,
	servers: Mutex<Vec<ServerHandle>>,
}

impl ServerRegistry {
	pub fn new(ctx: Arc<GatewayContext>) -> Self {
		Self {
			ctx,
			servers: Mutex::new(Vec::new()),
		}
	}

	/// Adds a server, or returns the existing handle for the same identity.
	pub fn add(&self, info: ServerInfo) -> ServerHandle {
		let mut servers = self.servers.lock();
		if let Some(existing) = servers.iter().find(|s| s.is(&info.identity)) {
			return Arc::clone(existing);
		}
		let identity = info.identity.clone();
		let handle = Server::new(info, Arc::clone(&self.ctx));
		servers.push(Arc::clone(&handle));
		tracing::info!(target: "ssap.registry", %identity, count = servers.len(), "server added");
		handle
	}

	/// Unlinks a server and drops the registry's reference.
	///
	/// In-flight tasks keep their own references; the server is destroyed
	/// when the last of them finishes.
	pub fn remove(&self, identity: &str) -> bool {
		let removed = {
			let mut servers = self.servers.lock();
			let Some(pos) = servers.iter().position(|s| s.is(identity)) else {
				return false;
			};
			servers.remove(pos)
		};
		tracing::info!(
			target: "ssap.registry",
			%identity,
			holders = Arc::strong_count(&removed) - 1,
			"server removed"
		);
		true
	}

	pub fn find(&self, identity: &str) -> Result<ServerHandle> {
		self.servers
			.lock()
			.iter()
			.find(|s| s.is(identity))
			.cloned()
			.ok_or_else(|| Error::ServerNotFound(identity.to_owned()))
	}

	pub fn len(&self) -> usize {
		self.servers.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.servers.lock().is_empty()
	}

	/// Identities in insertion order.
	pub fn identities(&self) -> Vec<String> {
		self.servers
			.lock()
			.iter()
			.map(|s| s.identity().to_owned())
			.collect()
	}

	pub fn handle_discovery(&self, event: DiscoveryEvent) {
		match event {
			DiscoveryEvent::Added(info) => {
				self.add(info);
			}
			DiscoveryEvent::Removed { identity } => {
				self.remove(&identity);
			}
			DiscoveryEvent::Invalid { identity } => {
				tracing::warn!(target: "ssap.registry", %identity, "server reported invalid");
				self.remove(&identity);
			}
		}
	}
}
