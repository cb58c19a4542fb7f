//! SSAP client gateway runtime.
//!
//! Bridges asynchronous caller requests to SSAP exchanges with remote SIBs:
//! one fresh socket per exchange, long-lived sockets for subscriptions, and a
//! fixed worker pool between the two sides.

pub mod caller;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod registry;
pub mod server;
pub mod session;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod testing;

pub use caller::{CallHandle, CallerHandle, InboundRequest, Reply, ReplyStatus};
pub use config::GatewayConfig;
pub use context::GatewayContext;
pub use dispatcher::{Dispatcher, Task};
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use registry::{DiscoveryEvent, ServerRegistry};
pub use server::{Server, ServerHandle, ServerInfo};
pub use session::{RecvBuffer, Session, SessionClient};
pub use ssap_protocol as protocol;
pub use subscription::{SharedSession, SubscriptionEvent, SubscriptionRegistry};
pub use transport::{BoxedSocket, Connector, ServerAddress, TcpConnector};
