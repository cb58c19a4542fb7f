//! In-memory collaborators for unit tests: a framed test codec, a chunked
//! reader, a scripted SIB behind the [`Connector`] seam, and caller helpers.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use ssap_protocol::{
	Codec, CodecError, Message, MessageName, MessageParser, MessageStatus, MessageType,
	ParseOutcome, Request,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::Layer;

use crate::caller::{CallerHandle, Reply};
use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::transport::{BoxedSocket, ConnectFuture, Connector, ServerAddress};

pub const START_TAG: &str = "<SSAP_message>";
pub const END_TAG: &str = "</SSAP_message>";

/// Frames a message the way [`TestCodec`] parses it.
pub fn encode(message: &Message) -> Vec<u8> {
	let body = serde_json::to_string(message).unwrap();
	format!("{START_TAG}{body}{END_TAG}").into_bytes()
}

/// Confirmation with an OK status.
pub fn confirm(name: MessageName, node: &str, space: &str) -> Message {
	Message::new(name, MessageType::Confirm, node, space).with_status(MessageStatus::Success)
}

pub fn indication(node: &str, space: &str, sub_id: &str, seq: u32) -> Message {
	Message::new(MessageName::Subscribe, MessageType::Indication, node, space)
		.with_subscription_id(sub_id)
		.with_update_sequence(seq)
		.with_results(format!("added-{seq}"), format!("removed-{seq}"))
}

/// JSON body between the message tags.
pub struct TestCodec;

impl Codec for TestCodec {
	fn build_request(&self, request: &Request<'_>) -> Result<Vec<u8>, CodecError> {
		if request.node_id.is_empty() {
			return Err(CodecError::Build {
				name: request.operation.name(),
				reason: "empty node id".into(),
			});
		}
		let body = serde_json::json!({
			"space_id": request.space_id,
			"node_id": request.node_id,
			"transaction_id": request.transaction_id,
			"operation": request.operation,
		});
		Ok(format!("{START_TAG}{body}{END_TAG}").into_bytes())
	}

	fn parser(&self) -> Box<dyn MessageParser> {
		Box::<TestParser>::default()
	}
}

/// Stateful parser: keeps every section until the end tag shows up.
#[derive(Default)]
pub struct TestParser {
	pending: Vec<u8>,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack.windows(needle.len()).position(|w| w == needle)
}

impl MessageParser for TestParser {
	fn parse_section(&mut self, section: &[u8]) -> ParseOutcome {
		self.pending.extend_from_slice(section);

		let start = self
			.pending
			.iter()
			.position(|b| !b.is_ascii_whitespace())
			.unwrap_or(self.pending.len());
		let head = &self.pending[start..];
		let tag = START_TAG.as_bytes();
		let prefix = head.len().min(tag.len());
		if head[..prefix] != tag[..prefix] {
			return ParseOutcome::Error(CodecError::Malformed("missing start tag".into()));
		}

		let Some(end) = find(&self.pending, END_TAG.as_bytes()) else {
			return ParseOutcome::InProgress;
		};
		let body = &self.pending[start + tag.len()..end];
		match serde_json::from_slice::<Message>(body) {
			Ok(message) => ParseOutcome::Complete {
				consumed: end + END_TAG.len(),
				message,
			},
			Err(err) => ParseOutcome::Error(CodecError::Malformed(err.to_string())),
		}
	}
}

/// Delivers one chunk per read, then end of stream.
pub struct ChunkedReader {
	chunks: VecDeque<Vec<u8>>,
	reads: usize,
}

impl ChunkedReader {
	pub fn new(chunks: Vec<Vec<u8>>) -> Self {
		Self {
			chunks: chunks.into(),
			reads: 0,
		}
	}

	/// Number of reads that returned data.
	pub fn reads(&self) -> usize {
		self.reads
	}
}

impl AsyncRead for ChunkedReader {
	fn poll_read(
		mut self: Pin<&mut Self>,
		_cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let this = &mut *self;
		if let Some(front) = this.chunks.front_mut() {
			let n = front.len().min(buf.remaining());
			buf.put_slice(&front[..n]);
			front.drain(..n);
			if front.is_empty() {
				this.chunks.pop_front();
			}
			this.reads += 1;
		}
		Poll::Ready(Ok(()))
	}
}

/// What the fake SIB does with the next connection.
pub enum Behavior {
	/// Read the request, write these chunks, close.
	Respond(Vec<Vec<u8>>),
	/// Read the request, close without answering.
	Reset,
	/// Fail the connect itself.
	Refuse,
	/// Read the request, write `initial`, then forward chunks until the sender drops.
	Stream {
		initial: Vec<Vec<u8>>,
		rx: mpsc::UnboundedReceiver<Vec<u8>>,
	},
}

impl Behavior {
	pub fn respond(message: &Message) -> Self {
		Behavior::Respond(vec![encode(message)])
	}
}

/// Scripted SIB. Each connect pops the next [`Behavior`]; an empty script resets.
#[derive(Default)]
pub struct FakeSib {
	script: Mutex<VecDeque<Behavior>>,
	opened: AtomicUsize,
	closed: Arc<AtomicUsize>,
	requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeSib {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn push(&self, behavior: Behavior) {
		self.script.lock().push_back(behavior);
	}

	/// Sockets handed out.
	pub fn opened(&self) -> usize {
		self.opened.load(Ordering::SeqCst)
	}

	/// Client-side sockets dropped.
	pub fn closed(&self) -> usize {
		self.closed.load(Ordering::SeqCst)
	}

	/// Request bodies received so far, as JSON.
	pub fn requests(&self) -> Vec<serde_json::Value> {
		self.requests
			.lock()
			.iter()
			.map(|raw| {
				let text = std::str::from_utf8(raw).unwrap();
				let body = text
					.trim()
					.trim_start_matches(START_TAG)
					.trim_end_matches(END_TAG);
				serde_json::from_str(body).unwrap()
			})
			.collect()
	}

	/// Waits until `count` requests have been read by the peer side.
	pub async fn wait_for_requests(&self, count: usize) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while self.requests.lock().len() < count {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap();
	}
}

impl Connector for FakeSib {
	fn connect<'a>(&'a self, _address: &'a ServerAddress) -> ConnectFuture<'a> {
		let behavior = self.script.lock().pop_front().unwrap_or(Behavior::Reset);
		Box::pin(async move {
			if matches!(behavior, Behavior::Refuse) {
				return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
			}
			let (client, peer) = tokio::io::duplex(64 * 1024);
			self.opened.fetch_add(1, Ordering::SeqCst);
			tokio::spawn(serve(peer, behavior, Arc::clone(&self.requests)));
			Ok(Box::new(CountedStream {
				inner: client,
				closed: Arc::clone(&self.closed),
			}) as BoxedSocket)
		})
	}
}

async fn serve(mut peer: DuplexStream, behavior: Behavior, requests: Arc<Mutex<Vec<Vec<u8>>>>) {
	let mut request = Vec::new();
	let _ = peer.read_to_end(&mut request).await;
	requests.lock().push(request);

	match behavior {
		Behavior::Respond(chunks) => {
			for chunk in chunks {
				if peer.write_all(&chunk).await.is_err() {
					return;
				}
			}
		}
		Behavior::Stream { initial, mut rx } => {
			for chunk in initial {
				if peer.write_all(&chunk).await.is_err() {
					return;
				}
			}
			while let Some(chunk) = rx.recv().await {
				if peer.write_all(&chunk).await.is_err() {
					return;
				}
			}
		}
		Behavior::Reset | Behavior::Refuse => {}
	}
}

/// Client end of a fake socket; counts its own drop as a close.
pub struct CountedStream {
	inner: DuplexStream,
	closed: Arc<AtomicUsize>,
}

impl Drop for CountedStream {
	fn drop(&mut self) {
		self.closed.fetch_add(1, Ordering::SeqCst);
	}
}

impl AsyncRead for CountedStream {
	fn poll_read(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		Pin::new(&mut self.inner).poll_read(cx, buf)
	}
}

impl AsyncWrite for CountedStream {
	fn poll_write(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		Pin::new(&mut self.inner).poll_write(cx, buf)
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.inner).poll_flush(cx)
	}

	fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.inner).poll_shutdown(cx)
	}
}

/// Context wired to a fake SIB and the test codec.
pub fn context(sib: &Arc<FakeSib>, workers: usize) -> Arc<GatewayContext> {
	let config = GatewayConfig {
		workers,
		..GatewayConfig::default()
	};
	let connector: Arc<dyn Connector> = Arc::clone(sib) as Arc<dyn Connector>;
	GatewayContext::new(config, Arc::new(TestCodec), connector).unwrap()
}

/// Caller handle that records replies on a channel.
pub fn caller() -> (CallerHandle, mpsc::UnboundedReceiver<Reply>) {
	let (tx, rx) = mpsc::unbounded_channel();
	let handle: CallerHandle = Arc::new(tx);
	(handle, rx)
}

pub async fn next_reply(rx: &mut mpsc::UnboundedReceiver<Reply>) -> Reply {
	tokio::time::timeout(Duration::from_secs(5), rx.recv())
		.await
		.unwrap()
		.unwrap()
}

/// Polls `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while !check() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap();
}

/// Records the target of every event it sees.
#[derive(Clone, Default)]
pub struct TargetRecorder {
	targets: Arc<Mutex<Vec<String>>>,
}

impl TargetRecorder {
	pub fn targets(&self) -> Vec<String> {
		self.targets.lock().clone()
	}

	/// Installs the recorder as this thread's default subscriber until the
	/// guard drops.
	pub fn install(&self) -> tracing::subscriber::DefaultGuard {
		let subscriber = tracing_subscriber::registry().with(self.clone());
		tracing::subscriber::set_default(subscriber)
	}
}

impl<S: tracing::Subscriber> Layer<S> for TargetRecorder {
	fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
		self.targets.lock().push(event.metadata().target().to_owned());
	}
}
