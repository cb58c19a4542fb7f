//! Incremental receive buffer shared by every socket read.
//!
//! One [`RecvBuffer`] lives as long as its session. Bytes the parser did not
//! consume (the start of the next message) stay in the buffer and are handed
//! to the next [`RecvBuffer::receive`] call before the socket is read again.

use ssap_protocol::{Codec, Message, ParseOutcome};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Fixed-capacity read buffer with a parse cursor.
///
/// Invariant: `remaining <= valid <= capacity`. The unparsed bytes are always
/// the tail `[valid - remaining, valid)`.
#[derive(Debug)]
pub struct RecvBuffer {
	buf: Box<[u8]>,
	valid: usize,
	remaining: usize,
}

impl RecvBuffer {
	pub fn new(capacity: usize) -> Self {
		Self {
			buf: vec![0; capacity].into_boxed_slice(),
			valid: 0,
			remaining: 0,
		}
	}

	pub fn capacity(&self) -> usize {
		self.buf.len()
	}

	/// Bytes currently held in the buffer.
	pub fn valid(&self) -> usize {
		self.valid
	}

	/// Bytes held but not yet consumed by a parser.
	pub fn remaining(&self) -> usize {
		self.remaining
	}

	fn reset(&mut self) {
		self.valid = 0;
		self.remaining = 0;
	}

	/// Reads from `reader` until one whole message has been parsed.
	///
	/// Leftover bytes are parsed first; the socket is only read when nothing
	/// unparsed is left. Every loop iteration either hands bytes to the parser
	/// or blocks on a read, so the loop never spins.
	pub async fn receive<R>(&mut self, reader: &mut R, codec: &dyn Codec) -> Result<Message>
	where
		R: AsyncRead + Unpin + ?Sized,
	{
		let mut parser = codec.parser();
		let mut handled = 0usize;

		loop {
			debug_assert!(self.remaining <= self.valid && self.valid <= self.buf.len());

			if self.remaining > 0 {
				let start = self.valid - self.remaining;
				let section = self.remaining;
				handled += section;

				match parser.parse_section(&self.buf[start..self.valid]) {
					ParseOutcome::Complete { consumed, message } => {
						// Whatever is left must come out of this section
						let Some(left) = handled.checked_sub(consumed).filter(|left| *left <= section)
						else {
							self.reset();
							return Err(Error::ParseFailed(format!(
								"parser consumed {consumed} of {handled} bytes"
							)));
						};
						self.remaining = left;
						tracing::trace!(
							target: "ssap.session",
							consumed,
							left,
							name = %message.name,
							"parsed message"
						);
						return Ok(message);
					}
					ParseOutcome::InProgress => {
						// Parser keeps what it was given
						self.reset();
					}
					ParseOutcome::Error(err) => {
						self.reset();
						return Err(Error::ParseFailed(err.to_string()));
					}
				}
			}

			let n = match reader.read(&mut self.buf[..]).await {
				Ok(0) => return Err(Error::PeerClosed),
				Ok(n) => n,
				Err(err) => return Err(Error::ReceiveFailed(err)),
			};
			self.valid = n;
			self.remaining = n;
		}
	}
}
