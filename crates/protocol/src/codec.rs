//! The seam to the external SSAP codec.
//!
//! The gateway never builds or inspects message bytes itself. It hands a
//! [`Request`] to [`Codec::build_request`] and feeds received byte ranges to a
//! [`MessageParser`] until one reports [`ParseOutcome::Complete`].
//!
//! # Parser contract
//!
//! A parser is created per message and is stateful: every byte handed to
//! [`MessageParser::parse_section`] is absorbed, so the caller may discard its
//! buffer after [`ParseOutcome::InProgress`] and continue with fresh bytes.
//! On completion `consumed` is the cumulative byte count of the message over
//! all sections; bytes handed in beyond that belong to the next message.

use thiserror::Error;

use crate::message::{Message, MessageName};
use crate::operation::Request;

/// Errors reported by the codec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
	/// The request could not be encoded.
	#[error("Cannot build {name} request: {reason}")]
	Build { name: MessageName, reason: String },

	/// The received bytes can never form a valid message.
	#[error("Malformed message: {0}")]
	Malformed(String),
}

/// Result of handing one byte section to a parser.
#[derive(Debug)]
pub enum ParseOutcome {
	/// A whole message was parsed.
	Complete {
		/// Bytes belonging to this message, counted across all sections.
		consumed: usize,
		message: Message,
	},
	/// All bytes were absorbed and more are needed.
	InProgress,
	/// Parsing failed; the parser must not be used again.
	Error(CodecError),
}

/// Incremental parser for a single message.
pub trait MessageParser: Send {
	/// Feeds the next section of bytes.
	fn parse_section(&mut self, section: &[u8]) -> ParseOutcome;
}

/// External SSAP codec.
pub trait Codec: Send + Sync {
	/// Encodes one request.
	fn build_request(&self, request: &Request<'_>) -> Result<Vec<u8>, CodecError>;

	/// Creates a parser for the next message on a stream.
	fn parser(&self) -> Box<dyn MessageParser>;
}
