//! Per-server session client.
//!
//! Every public operation runs exactly one exchange on a fresh socket:
//! connect, write the whole request, half-close, read one message. One-shot
//! exchanges close the socket afterwards; a successful subscribe keeps it and
//! parks it in the [`SubscriptionRegistry`].

mod recv_buffer;

use std::io;
use std::sync::Arc;

pub use recv_buffer::RecvBuffer;
use ssap_protocol::{Message, MessageName, MessageStatus, MessageType, Operation, Request};
use tokio::io::AsyncWriteExt;

use crate::context::GatewayContext;
use crate::error::{Error, Result};
use crate::subscription::SubscriptionRegistry;
use crate::transport::{BoxedSocket, ServerAddress};

/// One open socket plus its receive state.
pub struct Session {
	stream: Option<BoxedSocket>,
	buffer: RecvBuffer,
}

impl Session {
	pub fn new(stream: BoxedSocket, buffer_size: usize) -> Self {
		Self {
			stream: Some(stream),
			buffer: RecvBuffer::new(buffer_size),
		}
	}

	fn stream(&mut self) -> io::Result<&mut BoxedSocket> {
		self.stream
			.as_mut()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session closed"))
	}

	/// Writes all of `bytes`; any write failure is fatal for the exchange.
	pub async fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
		let stream = self.stream().map_err(Error::SendFailed)?;
		stream.write_all(bytes).await.map_err(Error::SendFailed)?;
		stream.flush().await.map_err(Error::SendFailed)
	}

	/// Half-closes the send direction.
	pub async fn finish_output(&mut self) -> Result<()> {
		let stream = self.stream().map_err(Error::SendFailed)?;
		stream.shutdown().await.map_err(Error::SendFailed)
	}

	/// Reads the next whole message.
	pub async fn receive(&mut self, codec: &dyn ssap_protocol::Codec) -> Result<Message> {
		let Some(stream) = self.stream.as_mut() else {
			return Err(Error::ReceiveFailed(io::Error::new(
				io::ErrorKind::NotConnected,
				"session closed",
			)));
		};
		self.buffer.receive(stream, codec).await
	}

	/// Drops the socket. Idempotent.
	pub fn close(&mut self) {
		if self.stream.take().is_some() {
			tracing::trace!(target: "ssap.session", "socket closed");
		}
	}

	pub fn is_open(&self) -> bool {
		self.stream.is_some()
	}
}

/// Client side of one server: address, identity and live subscriptions.
pub struct SessionClient {
	space_id: String,
	address: ServerAddress,
	ctx: Arc<GatewayContext>,
	pub(crate) subscriptions: SubscriptionRegistry,
}

impl SessionClient {
	pub fn new(space_id: impl Into<String>, address: ServerAddress, ctx: Arc<GatewayContext>) -> Self {
		Self {
			space_id: space_id.into(),
			address,
			ctx,
			subscriptions: SubscriptionRegistry::new(),
		}
	}

	/// Identity of the server, checked against every response.
	pub fn space_id(&self) -> &str {
		&self.space_id
	}

	pub fn address(&self) -> &ServerAddress {
		&self.address
	}

	pub fn subscriptions(&self) -> &SubscriptionRegistry {
		&self.subscriptions
	}

	pub(crate) fn context(&self) -> &GatewayContext {
		&self.ctx
	}

	/// Connects a fresh socket. No pooling.
	pub async fn open(&self) -> Result<Session> {
		let stream = self
			.ctx
			.connector
			.connect(&self.address)
			.await
			.map_err(|source| Error::ConnectFailed {
				address: self.address.to_string(),
				source,
			})?;
		tracing::debug!(target: "ssap.session", space = %self.space_id, address = %self.address, "socket opened");
		Ok(Session::new(stream, self.ctx.config.receive_buffer_size))
	}

	async fn round_trip(&self, session: &mut Session, request: &[u8]) -> Result<Message> {
		session.send_all(request).await?;
		session.finish_output().await?;
		session.receive(self.ctx.codec.as_ref()).await
	}

	/// One-shot exchange; the socket is closed whatever the outcome.
	pub async fn exchange(&self, request: &[u8]) -> Result<Message> {
		let mut session = self.open().await?;
		let result = self.round_trip(&mut session, request).await;
		session.close();
		result
	}

	/// Like [`exchange`](Self::exchange) but hands back the open socket on success.
	pub async fn subscribe_exchange(&self, request: &[u8]) -> Result<(Message, Session)> {
		let mut session = self.open().await?;
		match self.round_trip(&mut session, request).await {
			Ok(message) => Ok((message, session)),
			Err(err) => {
				session.close();
				Err(err)
			}
		}
	}

	/// Writes the request and closes; no response is read.
	pub async fn fire_and_forget(&self, request: &[u8]) -> Result<()> {
		let mut session = self.open().await?;
		let result = session.send_all(request).await;
		session.close();
		result
	}

	/// Checks that `message` answers a request from `node_id` with the given name and type.
	pub fn validate(
		&self,
		node_id: &str,
		name: MessageName,
		message_type: MessageType,
		message: &Message,
	) -> Result<()> {
		let matches = message.node_id.eq_ignore_ascii_case(node_id)
			&& message.space_id.eq_ignore_ascii_case(&self.space_id)
			&& message.is(name, message_type);
		if matches {
			return Ok(());
		}

		let err = Error::ProtocolMismatch {
			expected_name: name,
			expected_type: message_type,
			expected_node: node_id.to_owned(),
			expected_space: self.space_id.clone(),
			got_name: message.name,
			got_type: message.message_type,
			got_node: message.node_id.clone(),
			got_space: message.space_id.clone(),
		};
		tracing::warn!(target: "ssap.session", error = %err, "response rejected");
		Err(err)
	}

	fn build(&self, node_id: &str, transaction_id: u32, operation: &Operation) -> Result<Vec<u8>> {
		let request = Request {
			space_id: &self.space_id,
			node_id,
			transaction_id,
			operation,
		};
		Ok(self.ctx.codec.build_request(&request)?)
	}

	/// Runs a one-shot operation and returns the validated, OK confirmation.
	///
	/// A matching confirmation with a non-OK status becomes
	/// [`Error::ApplicationError`].
	pub async fn request(
		&self,
		node_id: &str,
		transaction_id: u32,
		operation: &Operation,
	) -> Result<Message> {
		let name = operation.name();
		let bytes = self.build(node_id, transaction_id, operation)?;
		let message = self.exchange(&bytes).await?;
		self.validate(node_id, name, MessageType::Confirm, &message)?;
		ensure_ok(name, message)
	}

	/// Runs the subscribe exchange and registers the open session.
	///
	/// Returns the confirmation; its subscription id keys the registry entry.
	/// On any failure the socket is closed and nothing is registered.
	pub async fn subscribe(
		&self,
		node_id: &str,
		transaction_id: u32,
		operation: &Operation,
	) -> Result<Message> {
		let name = operation.name();
		let bytes = self.build(node_id, transaction_id, operation)?;
		let (message, mut session) = self.subscribe_exchange(&bytes).await?;

		let checked = self
			.validate(node_id, name, MessageType::Confirm, &message)
			.and_then(|()| ensure_ok(name, message));
		let message = match checked {
			Ok(message) => message,
			Err(err) => {
				session.close();
				return Err(err);
			}
		};
		let Some(sub_id) = message.subscription_id.clone() else {
			session.close();
			return Err(Error::ParseFailed(
				"subscribe confirmation carries no subscription id".into(),
			));
		};

		if !self.subscriptions.register(&sub_id, session) {
			return Err(Error::SubscriptionExists(sub_id));
		}
		tracing::debug!(target: "ssap.subscription", space = %self.space_id, sub = %sub_id, "subscribed");
		Ok(message)
	}

	/// Sends an unsubscribe without waiting for an answer.
	///
	/// The confirmation arrives on the subscription's own socket and is
	/// handled by its long-poll loop, which also removes the registry entry.
	pub async fn unsubscribe(
		&self,
		node_id: &str,
		transaction_id: u32,
		subscription_id: &str,
	) -> Result<()> {
		let operation = Operation::Unsubscribe {
			subscription_id: subscription_id.to_owned(),
		};
		let bytes = self.build(node_id, transaction_id, &operation)?;
		self.fire_and_forget(&bytes).await
	}
}

fn ensure_ok(name: MessageName, message: Message) -> Result<Message> {
	if message.is_ok() {
		return Ok(message);
	}
	let status = message
		.status
		.unwrap_or_else(|| MessageStatus::Failure("missing status".into()));
	tracing::debug!(target: "ssap.session", %name, %status, "server refused request");
	Err(Error::ApplicationError { name, status })
}
