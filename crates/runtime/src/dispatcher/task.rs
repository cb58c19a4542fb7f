use std::sync::Arc;

use ssap_protocol::Operation;

use crate::caller::{CallerHandle, InboundRequest, Reply};
use crate::server::ServerHandle;

/// One queued operation. Owns its references and payload copies until it is
/// dropped, which happens exactly once when the worker is done with it.
pub struct Task {
	pub server: ServerHandle,
	pub caller: CallerHandle,
	pub node_id: String,
	pub access_id: String,
	pub transaction_id: u32,
	pub operation: Operation,
}

impl Task {
	/// Takes a reference on both handles and copies the request payload.
	pub fn new(server: &ServerHandle, caller: &CallerHandle, request: &InboundRequest) -> Self {
		Self {
			server: Arc::clone(server),
			caller: Arc::clone(caller),
			node_id: request.node_id.clone(),
			access_id: request.access_id.clone(),
			transaction_id: request.transaction_id,
			operation: request.operation.clone(),
		}
	}

	pub fn reply(&self, reply: Reply) {
		self.caller.send(reply);
	}

	/// Sends the operation's failure reply, if it has one.
	pub fn reply_failure(&self) {
		if let Some(reply) = Reply::failure(&self.operation, &self.access_id) {
			self.reply(reply);
		}
	}
}

impl Drop for Task {
	fn drop(&mut self) {
		tracing::trace!(
			target: "ssap.dispatch",
			access = %self.access_id,
			op = %self.operation.name(),
			"task released"
		);
	}
}
