//! Gateway configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::server::ServerInfo;

/// Worker count of the task pool.
pub const DEFAULT_WORKERS: usize = 10;

/// Capacity of one receive buffer (bytes per socket read).
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 8192;

const MIN_RECEIVE_BUFFER_SIZE: usize = 64;

/// Settings shared by every component through the gateway context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// Fixed worker count. Every live subscription occupies one worker.
	pub workers: usize,
	/// Bytes read from a socket per receive call.
	pub receive_buffer_size: usize,
	/// Disable Nagle on exchange sockets.
	pub tcp_nodelay: bool,
	/// Servers announced at startup without discovery.
	pub servers: Vec<ServerInfo>,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			workers: DEFAULT_WORKERS,
			receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
			tcp_nodelay: true,
			servers: Vec::new(),
		}
	}
}

impl GatewayConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a JSON file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)?;
		let config = Self::from_json_str(&text)?;
		tracing::debug!(
			target: "ssap.gateway",
			path = %path.display(),
			workers = config.workers,
			servers = config.servers.len(),
			"loaded gateway config"
		);
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.workers == 0 {
			return Err(Error::Config("workers must be at least 1".into()));
		}
		if self.receive_buffer_size < MIN_RECEIVE_BUFFER_SIZE {
			return Err(Error::Config(format!(
				"receive_buffer_size must be at least {MIN_RECEIVE_BUFFER_SIZE} bytes"
			)));
		}

		let mut seen = HashSet::new();
		for server in &self.servers {
			if server.identity.is_empty() {
				return Err(Error::Config("server identity must not be empty".into()));
			}
			if !seen.insert(server.identity.to_ascii_lowercase()) {
				return Err(Error::Config(format!(
					"duplicate server identity: {}",
					server.identity
				)));
			}
		}
		Ok(())
	}
}
