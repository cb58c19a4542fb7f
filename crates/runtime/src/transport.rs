//! Byte-stream seam between sessions and the network.
//!
//! Sessions never touch `TcpStream` directly; they ask a [`Connector`] for a
//! [`BoxedSocket`]. Production uses [`TcpConnector`], tests plug in scripted
//! in-memory peers.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Network location of a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddress {
	pub host: String,
	pub port: u16,
}

impl ServerAddress {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
		}
	}
}

impl fmt::Display for ServerAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

/// A connected, bidirectional byte stream.
pub trait SocketStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SocketStream for T {}

pub type BoxedSocket = Box<dyn SocketStream>;

/// Future returned by [`Connector::connect`].
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = io::Result<BoxedSocket>> + Send + 'a>>;

/// Opens one socket per call. Every exchange gets a fresh connection.
pub trait Connector: Send + Sync {
	fn connect<'a>(&'a self, address: &'a ServerAddress) -> ConnectFuture<'a>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
	nodelay: bool,
}

impl TcpConnector {
	pub fn new(nodelay: bool) -> Self {
		Self { nodelay }
	}
}

impl Default for TcpConnector {
	fn default() -> Self {
		Self::new(true)
	}
}

impl Connector for TcpConnector {
	fn connect<'a>(&'a self, address: &'a ServerAddress) -> ConnectFuture<'a> {
		Box::pin(async move {
			let stream = TcpStream::connect((address.host.as_str(), address.port)).await?;
			if self.nodelay {
				stream.set_nodelay(true)?;
			}
			tracing::trace!(target: "ssap.session", %address, "tcp connected");
			Ok(Box::new(stream) as BoxedSocket)
		})
	}
}
