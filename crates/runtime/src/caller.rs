//! Caller-facing channel: inbound requests and outbound replies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ssap_protocol::Operation;
use tokio::sync::mpsc;

/// Diagnostic for transport or protocol failures of insert/update/remove.
pub const CONNECTION_FAILURE: &str = "connection failure, or bad response from sib";
/// Diagnostic for a non-OK status on insert/update/remove.
pub const SIB_REPORTED_ERROR: &str = "sib:reported error";
/// Query failure payload.
pub const INVALID_RESULTS: &str = "InvalidResults";
/// Subscription id reported when subscribe fails.
pub const INVALID_SUBSCRIPTION_ID: &str = "sib:InvalidSubscriptionID";
/// Initial results reported when subscribe fails.
pub const SIB_INVALID_RESULTS: &str = "sib:InvalidResults";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
	Ok,
	OperationFailed,
}

impl ReplyStatus {
	pub fn is_ok(self) -> bool {
		self == ReplyStatus::Ok
	}
}

/// One outbound call on the caller-facing channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
	JoinComplete {
		access_id: String,
		status: ReplyStatus,
	},
	InsertResponse {
		access_id: String,
		status: ReplyStatus,
		payload: String,
	},
	UpdateResponse {
		access_id: String,
		status: ReplyStatus,
		payload: String,
	},
	RemoveResponse {
		access_id: String,
		status: ReplyStatus,
		payload: String,
	},
	QueryResponse {
		access_id: String,
		status: ReplyStatus,
		payload: String,
	},
	SubscribeResponse {
		access_id: String,
		status: ReplyStatus,
		subscription_id: String,
		results: String,
	},
	SubscriptionIndication {
		access_id: String,
		sequence: u32,
		subscription_id: String,
		added: String,
		removed: String,
	},
	UnsubscribeComplete {
		access_id: String,
		status: ReplyStatus,
		subscription_id: String,
	},
}

impl Reply {
	/// The reply an operation gets when it fails before or during its exchange.
	///
	/// `None` for leave, which has no upstream reply.
	pub fn failure(operation: &Operation, access_id: &str) -> Option<Reply> {
		let access_id = access_id.to_owned();
		let status = ReplyStatus::OperationFailed;
		let payload = CONNECTION_FAILURE.to_owned();
		let reply = match operation {
			Operation::Join => Reply::JoinComplete { access_id, status },
			Operation::Leave => return None,
			Operation::Insert { .. } => Reply::InsertResponse {
				access_id,
				status,
				payload,
			},
			Operation::Update { .. } => Reply::UpdateResponse {
				access_id,
				status,
				payload,
			},
			Operation::Remove { .. } => Reply::RemoveResponse {
				access_id,
				status,
				payload,
			},
			Operation::Query { .. } => Reply::QueryResponse {
				access_id,
				status,
				payload: INVALID_RESULTS.to_owned(),
			},
			Operation::Subscribe { .. } => Reply::SubscribeResponse {
				access_id,
				status,
				subscription_id: INVALID_SUBSCRIPTION_ID.to_owned(),
				results: SIB_INVALID_RESULTS.to_owned(),
			},
			Operation::Unsubscribe { subscription_id } => Reply::UnsubscribeComplete {
				access_id,
				status,
				subscription_id: subscription_id.clone(),
			},
		};
		Some(reply)
	}

	pub fn access_id(&self) -> &str {
		match self {
			Reply::JoinComplete { access_id, .. }
			| Reply::InsertResponse { access_id, .. }
			| Reply::UpdateResponse { access_id, .. }
			| Reply::RemoveResponse { access_id, .. }
			| Reply::QueryResponse { access_id, .. }
			| Reply::SubscribeResponse { access_id, .. }
			| Reply::SubscriptionIndication { access_id, .. }
			| Reply::UnsubscribeComplete { access_id, .. } => access_id,
		}
	}
}

/// Opaque per-call handle on the caller-facing channel.
pub trait CallHandle: Send + Sync {
	fn send(&self, reply: Reply);
}

/// Shared ownership of a caller handle, symmetric with
/// [`ServerHandle`](crate::server::ServerHandle).
pub type CallerHandle = Arc<dyn CallHandle>;

impl CallHandle for mpsc::UnboundedSender<Reply> {
	fn send(&self, reply: Reply) {
		if let Err(err) = mpsc::UnboundedSender::send(self, reply) {
			tracing::debug!(target: "ssap.dispatch", access = %err.0.access_id(), "caller went away, reply dropped");
		}
	}
}

/// One operation request arriving from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
	/// Identity of the target server.
	pub server_id: String,
	/// Requesting node.
	pub node_id: String,
	/// Caller's correlation id, echoed in every reply.
	pub access_id: String,
	/// Message number for the request.
	pub transaction_id: u32,
	pub operation: Operation,
}
