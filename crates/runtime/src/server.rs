//! Reference-counted handle to one remote server.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::GatewayContext;
use crate::session::SessionClient;
use crate::transport::ServerAddress;

/// What discovery knows about a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
	/// Opaque server identity; doubles as the smart space id in messages.
	pub identity: String,
	/// Friendly name for logs.
	#[serde(default)]
	pub name: String,
	pub address: ServerAddress,
}

impl ServerInfo {
	pub fn new(identity: impl Into<String>, address: ServerAddress) -> Self {
		Self {
			identity: identity.into(),
			name: String::new(),
			address,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}
}

/// One remote server and its session client, created and destroyed together.
pub struct Server {
	info: ServerInfo,
	client: SessionClient,
}

/// Shared ownership of a [`Server`]. Cloning is the reference increment,
/// dropping the decrement; the last drop destroys the server.
pub type ServerHandle = Arc<Server>;

impl Server {
	pub fn new(info: ServerInfo, ctx: Arc<GatewayContext>) -> ServerHandle {
		let client = SessionClient::new(info.identity.clone(), info.address.clone(), ctx);
		tracing::debug!(target: "ssap.registry", identity = %info.identity, address = %info.address, "server handle created");
		Arc::new(Self { info, client })
	}

	pub fn identity(&self) -> &str {
		&self.info.identity
	}

	pub fn name(&self) -> &str {
		&self.info.name
	}

	pub fn address(&self) -> &ServerAddress {
		&self.info.address
	}

	pub fn info(&self) -> &ServerInfo {
		&self.info
	}

	pub fn client(&self) -> &SessionClient {
		&self.client
	}

	/// ASCII case-insensitive identity match.
	pub fn is(&self, identity: &str) -> bool {
		self.info.identity.eq_ignore_ascii_case(identity)
	}
}

impl Drop for Server {
	fn drop(&mut self) {
		let live = self.client.subscriptions().len();
		if live > 0 {
			tracing::warn!(target: "ssap.registry", identity = %self.info.identity, live, "server destroyed with live subscriptions");
		}
		tracing::debug!(target: "ssap.registry", identity = %self.info.identity, "server handle destroyed");
	}
}
