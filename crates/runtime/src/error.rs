//! Error types for the SSAP gateway runtime.

use ssap_protocol::{CodecError, MessageName, MessageStatus, MessageType};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gateway runtime.
///
/// The first group is the per-exchange taxonomy: all of them are local,
/// non-retried failures of the one exchange in progress.
#[derive(Debug, Error)]
pub enum Error {
	/// Socket could not be opened or connected.
	#[error("Failed to connect to {address}: {source}")]
	ConnectFailed {
		address: String,
		#[source]
		source: std::io::Error,
	},

	/// Writing the request failed.
	#[error("Failed to send request: {0}")]
	SendFailed(#[source] std::io::Error),

	/// Reading the response failed.
	#[error("Failed to receive response: {0}")]
	ReceiveFailed(#[source] std::io::Error),

	/// The peer closed the socket before a whole message arrived.
	#[error("Connection closed by peer")]
	PeerClosed,

	/// The received bytes were rejected by the codec.
	#[error("Failed to parse response: {0}")]
	ParseFailed(String),

	/// Well-formed response that does not answer the outstanding request.
	#[error(
		"Unexpected {got_name} {got_type} for node '{got_node}' from '{got_space}' \
		 (expected {expected_name} {expected_type} for '{expected_node}' from '{expected_space}')"
	)]
	ProtocolMismatch {
		expected_name: MessageName,
		expected_type: MessageType,
		expected_node: String,
		expected_space: String,
		got_name: MessageName,
		got_type: MessageType,
		got_node: String,
		got_space: String,
	},

	/// Message on a subscription socket that belongs to another subscription.
	#[error("Message for subscription '{got}' on the socket of '{expected}'")]
	SubscriptionMismatch { expected: String, got: String },

	/// Matching response whose status is not OK.
	#[error("Server reported {name} failure: {status}")]
	ApplicationError {
		name: MessageName,
		status: MessageStatus,
	},

	/// The codec could not build the request.
	#[error(transparent)]
	Codec(#[from] CodecError),

	/// No server with this identity is registered.
	#[error("Server not found: {0}")]
	ServerNotFound(String),

	/// A live subscription already uses this id.
	#[error("Subscription already registered: {0}")]
	SubscriptionExists(String),

	/// No live subscription uses this id.
	#[error("Subscription not found: {0}")]
	SubscriptionNotFound(String),

	/// The task queue no longer accepts work.
	#[error("Dispatcher is shut down")]
	DispatcherClosed,

	/// Invalid gateway configuration.
	#[error("Invalid configuration: {0}")]
	Config(String),

	/// I/O error outside an exchange (config files).
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON error (config files).
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true for failures of the socket or the byte stream.
	pub fn is_transport(&self) -> bool {
		matches!(
			self,
			Error::ConnectFailed { .. }
				| Error::SendFailed(_)
				| Error::ReceiveFailed(_)
				| Error::PeerClosed
				| Error::ParseFailed(_)
		)
	}

	/// Returns true when the exchange round-tripped but the server refused it.
	pub fn is_application(&self) -> bool {
		matches!(self, Error::ApplicationError { .. })
	}

	/// Returns true for identity-mismatch protocol errors.
	pub fn is_protocol_mismatch(&self) -> bool {
		matches!(
			self,
			Error::ProtocolMismatch { .. } | Error::SubscriptionMismatch { .. }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_and_application_errors_are_distinct() {
		assert!(Error::PeerClosed.is_transport());
		assert!(!Error::PeerClosed.is_application());

		let refused = Error::ApplicationError {
			name: MessageName::Insert,
			status: MessageStatus::Failure("m3:SIB.Error".into()),
		};
		assert!(refused.is_application());
		assert!(!refused.is_transport());
		assert_eq!(
			refused.to_string(),
			"Server reported INSERT failure: m3:SIB.Error"
		);
	}

	#[test]
	fn mismatch_message_names_both_sides() {
		let err = Error::ProtocolMismatch {
			expected_name: MessageName::Join,
			expected_type: MessageType::Confirm,
			expected_node: "n1".into(),
			expected_space: "s1".into(),
			got_name: MessageName::Leave,
			got_type: MessageType::Confirm,
			got_node: "n1".into(),
			got_space: "s1".into(),
		};
		assert!(err.is_protocol_mismatch());
		let text = err.to_string();
		assert!(text.contains("Unexpected LEAVE CONFIRM"));
		assert!(text.contains("expected JOIN CONFIRM"));
	}
}
