use std::sync::Arc;

use ssap_protocol::Codec;

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::transport::{Connector, TcpConnector};

/// Everything the registry, sessions and dispatcher share. Built once and
/// passed down explicitly.
pub struct GatewayContext {
	pub config: GatewayConfig,
	pub codec: Arc<dyn Codec>,
	pub connector: Arc<dyn Connector>,
}

impl GatewayContext {
	/// Rejects a configuration that fails [`GatewayConfig::validate`].
	pub fn new(
		config: GatewayConfig,
		codec: Arc<dyn Codec>,
		connector: Arc<dyn Connector>,
	) -> Result<Arc<Self>> {
		config.validate()?;
		Ok(Arc::new(Self {
			config,
			codec,
			connector,
		}))
	}

	/// Context that reaches servers over plain TCP.
	pub fn with_tcp(config: GatewayConfig, codec: Arc<dyn Codec>) -> Result<Arc<Self>> {
		let connector = Arc::new(TcpConnector::new(config.tcp_nodelay));
		Self::new(config, codec, connector)
	}
}
