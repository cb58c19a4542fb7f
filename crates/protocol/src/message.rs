//! Parsed SSAP messages and their header vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction name carried in every SSAP message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageName {
	/// Node joins a smart space.
	Join,
	/// Node leaves a smart space.
	Leave,
	/// Insert triples.
	Insert,
	/// Remove triples.
	Remove,
	/// Atomic remove-then-insert.
	Update,
	/// One-shot query.
	Query,
	/// Persistent query with pushed indications.
	Subscribe,
	/// Ends a subscription.
	Unsubscribe,
}

impl MessageName {
	/// Returns the protocol spelling of the transaction name.
	pub fn as_str(self) -> &'static str {
		match self {
			MessageName::Join => "JOIN",
			MessageName::Leave => "LEAVE",
			MessageName::Insert => "INSERT",
			MessageName::Remove => "REMOVE",
			MessageName::Update => "UPDATE",
			MessageName::Query => "QUERY",
			MessageName::Subscribe => "SUBSCRIBE",
			MessageName::Unsubscribe => "UNSUBSCRIBE",
		}
	}
}

impl fmt::Display for MessageName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Role of a message within its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
	/// Sent by the node to the server.
	Request,
	/// Server's answer to a request.
	Confirm,
	/// Unsolicited push from the server (subscriptions only).
	Indication,
}

impl MessageType {
	/// Returns the protocol spelling of the message type.
	pub fn as_str(self) -> &'static str {
		match self {
			MessageType::Request => "REQUEST",
			MessageType::Confirm => "CONFIRM",
			MessageType::Indication => "INDICATION",
		}
	}
}

impl fmt::Display for MessageType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Status parameter reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
	/// The server accepted the transaction.
	Success,
	/// Any other status, kept verbatim for diagnostics.
	Failure(String),
}

impl MessageStatus {
	/// Returns true for [`MessageStatus::Success`].
	pub fn is_ok(&self) -> bool {
		matches!(self, MessageStatus::Success)
	}
}

impl fmt::Display for MessageStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MessageStatus::Success => f.write_str("success"),
			MessageStatus::Failure(status) => f.write_str(status),
		}
	}
}

/// One fully parsed SSAP message.
///
/// Produced by a [`MessageParser`](crate::MessageParser); the gateway reads
/// the header fields to validate identity and the optional body fields to
/// build upstream replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	/// Transaction name.
	pub name: MessageName,
	/// Request, confirmation or indication.
	#[serde(rename = "type")]
	pub message_type: MessageType,
	/// Transaction (message) number echoed by the server.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_id: Option<u32>,
	/// Node the message is addressed to.
	pub node_id: String,
	/// Smart space (server identity) the message comes from.
	pub space_id: String,
	/// Status parameter, absent on indications.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<MessageStatus>,
	/// Subscription the message belongs to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subscription_id: Option<String>,
	/// Indication sequence number.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub update_sequence: Option<u32>,
	/// Result body (query results, initial subscription results, inserted ids).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payload: Option<String>,
	/// Results added since the previous indication.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub results_added: Option<String>,
	/// Results removed since the previous indication.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub results_removed: Option<String>,
}

impl Message {
	/// Creates a message with only the header fields set.
	pub fn new(
		name: MessageName,
		message_type: MessageType,
		node_id: impl Into<String>,
		space_id: impl Into<String>,
	) -> Self {
		Self {
			name,
			message_type,
			transaction_id: None,
			node_id: node_id.into(),
			space_id: space_id.into(),
			status: None,
			subscription_id: None,
			update_sequence: None,
			payload: None,
			results_added: None,
			results_removed: None,
		}
	}

	pub fn with_status(mut self, status: MessageStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn with_subscription_id(mut self, id: impl Into<String>) -> Self {
		self.subscription_id = Some(id.into());
		self
	}

	pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
		self.payload = Some(payload.into());
		self
	}

	pub fn with_update_sequence(mut self, sequence: u32) -> Self {
		self.update_sequence = Some(sequence);
		self
	}

	pub fn with_results(mut self, added: impl Into<String>, removed: impl Into<String>) -> Self {
		self.results_added = Some(added.into());
		self.results_removed = Some(removed.into());
		self
	}

	/// Returns true when the server reported [`MessageStatus::Success`].
	pub fn is_ok(&self) -> bool {
		self.status.as_ref().is_some_and(MessageStatus::is_ok)
	}

	/// Returns true when name and type both match.
	pub fn is(&self, name: MessageName, message_type: MessageType) -> bool {
		self.name == name && self.message_type == message_type
	}
}
