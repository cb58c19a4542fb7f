//! Live subscription sessions and the long-poll loop that drains them.
//!
//! Removing an entry always closes its socket. The poller holds the session
//! lock only while receiving and releases it before it removes the entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ssap_protocol::{Message, MessageName, MessageStatus, MessageType};

use crate::error::{Error, Result};
use crate::session::{Session, SessionClient};

/// A registered subscription socket.
pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// Subscription id to open session, for one server.
#[derive(Default)]
pub struct SubscriptionRegistry {
	sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SubscriptionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `session` under `id` unless the id is taken.
	///
	/// On collision the existing entry stays and `session` is closed.
	pub fn register(&self, id: &str, mut session: Session) -> bool {
		{
			let mut sessions = self.sessions.lock();
			if !sessions.contains_key(id) {
				sessions.insert(id.to_owned(), Arc::new(tokio::sync::Mutex::new(session)));
				return true;
			}
		}
		tracing::warn!(target: "ssap.subscription", sub = %id, "subscription id already registered");
		session.close();
		false
	}

	pub fn lookup(&self, id: &str) -> Result<SharedSession> {
		self.sessions
			.lock()
			.get(id)
			.cloned()
			.ok_or_else(|| Error::SubscriptionNotFound(id.to_owned()))
	}

	/// Removes the entry and closes its socket. False if `id` is absent.
	pub async fn remove(&self, id: &str) -> bool {
		let removed = { self.sessions.lock().remove(id) };
		let Some(session) = removed else {
			return false;
		};
		session.lock().await.close();
		tracing::debug!(target: "ssap.subscription", sub = %id, "subscription removed");
		true
	}

	pub fn contains(&self, id: &str) -> bool {
		self.sessions.lock().contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}

	pub fn ids(&self) -> Vec<String> {
		self.sessions.lock().keys().cloned().collect()
	}
}

/// One outcome of polling a subscription socket.
#[derive(Debug)]
pub enum SubscriptionEvent {
	/// Result-set change pushed by the server.
	Indication {
		sequence: u32,
		added: String,
		removed: String,
	},
	/// Unsubscribe confirmation or indication. Terminal.
	Ended { status: MessageStatus },
	/// Receive error or unexpected message. Terminal.
	Failed(Error),
}

impl SubscriptionEvent {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, SubscriptionEvent::Indication { .. })
	}
}

impl SessionClient {
	/// Waits for the next message on a registered subscription.
	///
	/// Terminal events remove (and close) the registry entry before they are
	/// returned.
	pub async fn next_event(&self, node_id: &str, subscription_id: &str) -> SubscriptionEvent {
		let session = match self.subscriptions.lookup(subscription_id) {
			Ok(session) => session,
			Err(err) => return SubscriptionEvent::Failed(err),
		};

		let received = {
			let mut session = session.lock().await;
			session.receive(self.context().codec.as_ref()).await
		};
		drop(session);

		let event = match received.and_then(|message| self.classify(node_id, subscription_id, message))
		{
			Ok(event) => event,
			Err(err) => SubscriptionEvent::Failed(err),
		};

		if event.is_terminal() {
			self.subscriptions.remove(subscription_id).await;
		}
		event
	}

	fn classify(
		&self,
		node_id: &str,
		subscription_id: &str,
		message: Message,
	) -> Result<SubscriptionEvent> {
		let (name, message_type) = match (message.name, message.message_type) {
			(MessageName::Unsubscribe, t @ (MessageType::Confirm | MessageType::Indication)) => {
				(MessageName::Unsubscribe, t)
			}
			_ => (MessageName::Subscribe, MessageType::Indication),
		};
		self.validate(node_id, name, message_type, &message)?;

		let got = message.subscription_id.as_deref().unwrap_or_default();
		if !got.eq_ignore_ascii_case(subscription_id) {
			return Err(Error::SubscriptionMismatch {
				expected: subscription_id.to_owned(),
				got: got.to_owned(),
			});
		}

		if name == MessageName::Unsubscribe {
			return Ok(SubscriptionEvent::Ended {
				status: message.status.unwrap_or(MessageStatus::Success),
			});
		}
		Ok(SubscriptionEvent::Indication {
			sequence: message.update_sequence.unwrap_or_default(),
			added: message.results_added.unwrap_or_default(),
			removed: message.results_removed.unwrap_or_default(),
		})
	}

	/// Drains a subscription until it ends, handing every event to `deliver`.
	///
	/// The last event delivered is always terminal, and by then the registry
	/// entry is gone.
	pub async fn long_poll(
		&self,
		node_id: &str,
		subscription_id: &str,
		mut deliver: impl FnMut(SubscriptionEvent),
	) {
		loop {
			let event = self.next_event(node_id, subscription_id).await;
			match &event {
				SubscriptionEvent::Indication { sequence, .. } => {
					tracing::trace!(target: "ssap.subscription", sub = %subscription_id, sequence, "indication");
				}
				SubscriptionEvent::Ended { status } => {
					tracing::debug!(target: "ssap.subscription", sub = %subscription_id, %status, "subscription ended");
				}
				SubscriptionEvent::Failed(err) => {
					tracing::warn!(target: "ssap.subscription", sub = %subscription_id, error = %err, "subscription failed");
				}
			}
			let terminal = event.is_terminal();
			deliver(event);
			if terminal {
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use ssap_protocol::{Operation, QueryType};
	use tokio::sync::mpsc;

	use super::*;
	use crate::testing::{Behavior, FakeSib, confirm, context, encode, indication};
	use crate::transport::ServerAddress;

	fn idle_session() -> Session {
		let (client, _peer) = tokio::io::duplex(64);
		Session::new(Box::new(client), 64)
	}

	#[tokio::test]
	async fn register_refuses_duplicate_and_keeps_existing() {
		let registry = SubscriptionRegistry::new();
		assert!(registry.register("sub-1", idle_session()));
		let existing = registry.lookup("sub-1").unwrap();

		assert!(!registry.register("sub-1", idle_session()));
		let current = registry.lookup("sub-1").unwrap();
		assert!(Arc::ptr_eq(&existing, &current));
		assert_eq!(registry.len(), 1);
	}

	#[tokio::test]
	async fn remove_absent_is_false_without_side_effects() {
		let registry = SubscriptionRegistry::new();
		registry.register("sub-1", idle_session());

		assert!(!registry.remove("sub-2").await);
		assert_eq!(registry.ids(), vec!["sub-1".to_owned()]);
	}

	#[tokio::test]
	async fn remove_closes_session() {
		let registry = SubscriptionRegistry::new();
		registry.register("sub-1", idle_session());
		let session = registry.lookup("sub-1").unwrap();

		assert!(registry.remove("sub-1").await);
		assert!(!session.lock().await.is_open());
		assert!(registry.is_empty());
		assert!(matches!(
			registry.lookup("sub-1"),
			Err(Error::SubscriptionNotFound(_))
		));
	}

	struct Subscribed {
		sib: Arc<FakeSib>,
		client: SessionClient,
		push: mpsc::UnboundedSender<Vec<u8>>,
	}

	async fn subscribed(sub_id: &str) -> Subscribed {
		let sib = FakeSib::new();
		let (push, rx) = mpsc::unbounded_channel();
		let cnf = confirm(MessageName::Subscribe, "N1", "S1").with_subscription_id(sub_id);
		sib.push(Behavior::Stream {
			initial: vec![encode(&cnf)],
			rx,
		});

		let client = SessionClient::new("S1", ServerAddress::new("sib", 1), context(&sib, 1));
		let op = Operation::Subscribe {
			query_type: QueryType::Wql,
			query: "q".into(),
		};
		client.subscribe("N1", 1, &op).await.unwrap();
		Subscribed { sib, client, push }
	}

	#[tokio::test]
	async fn indications_then_unsubscribe_end_the_poll() {
		let sub = subscribed("sub-42").await;
		sub.push.send(encode(&indication("N1", "S1", "sub-42", 1))).unwrap();
		sub.push.send(encode(&indication("N1", "S1", "sub-42", 2))).unwrap();
		let cnf = confirm(MessageName::Unsubscribe, "N1", "S1").with_subscription_id("sub-42");
		sub.push.send(encode(&cnf)).unwrap();

		let mut events = Vec::new();
		sub.client.long_poll("N1", "sub-42", |event| events.push(event)).await;

		assert_eq!(events.len(), 3);
		assert!(matches!(&events[0], SubscriptionEvent::Indication { sequence: 1, added, .. } if added == "added-1"));
		assert!(matches!(&events[1], SubscriptionEvent::Indication { sequence: 2, .. }));
		assert!(matches!(&events[2], SubscriptionEvent::Ended { status } if status.is_ok()));
		assert!(sub.client.subscriptions().is_empty());
		assert_eq!(sub.sib.closed(), 1);
	}

	#[tokio::test]
	async fn unsubscribe_indication_without_status_ends_cleanly() {
		let sub = subscribed("sub-5").await;
		let ind = Message::new(MessageName::Unsubscribe, MessageType::Indication, "N1", "S1")
			.with_subscription_id("sub-5");
		sub.push.send(encode(&ind)).unwrap();

		let event = sub.client.next_event("N1", "sub-5").await;
		assert!(matches!(event, SubscriptionEvent::Ended { status: MessageStatus::Success }));
		assert!(!sub.client.subscriptions().contains("sub-5"));
		assert_eq!(sub.sib.closed(), 1);
	}

	#[tokio::test]
	async fn refused_unsubscribe_confirm_ends_with_failure_status() {
		let sub = subscribed("sub-6").await;
		let cnf = Message::new(MessageName::Unsubscribe, MessageType::Confirm, "N1", "S1")
			.with_status(MessageStatus::Failure("m3:SIB.Error".into()))
			.with_subscription_id("sub-6");
		sub.push.send(encode(&cnf)).unwrap();

		let event = sub.client.next_event("N1", "sub-6").await;
		assert!(matches!(
			event,
			SubscriptionEvent::Ended { status: MessageStatus::Failure(ref s) } if s == "m3:SIB.Error"
		));
		assert!(sub.client.subscriptions().is_empty());
		assert_eq!(sub.sib.closed(), 1);
	}

	#[tokio::test]
	async fn foreign_subscription_id_fails_and_removes() {
		let sub = subscribed("sub-1").await;
		sub.push.send(encode(&indication("N1", "S1", "sub-9", 1))).unwrap();

		let event = sub.client.next_event("N1", "sub-1").await;
		assert!(matches!(event, SubscriptionEvent::Failed(Error::SubscriptionMismatch { .. })));
		assert!(!sub.client.subscriptions().contains("sub-1"));
		assert_eq!(sub.sib.closed(), 1);
	}

	#[tokio::test]
	async fn wrong_node_fails_and_removes() {
		let sub = subscribed("sub-1").await;
		sub.push.send(encode(&indication("N2", "S1", "sub-1", 1))).unwrap();

		let event = sub.client.next_event("N1", "sub-1").await;
		assert!(matches!(event, SubscriptionEvent::Failed(ref err) if err.is_protocol_mismatch()));
		assert!(sub.client.subscriptions().is_empty());
	}

	#[tokio::test]
	async fn unexpected_message_fails_and_removes() {
		let sub = subscribed("sub-1").await;
		let stray = confirm(MessageName::Query, "N1", "S1").with_subscription_id("sub-1");
		sub.push.send(encode(&stray)).unwrap();

		let event = sub.client.next_event("N1", "sub-1").await;
		assert!(matches!(event, SubscriptionEvent::Failed(ref err) if err.is_protocol_mismatch()));
		assert!(sub.client.subscriptions().is_empty());
	}

	#[tokio::test]
	async fn peer_close_fails_and_removes() {
		let sub = subscribed("sub-1").await;
		drop(sub.push);

		let event = sub.client.next_event("N1", "sub-1").await;
		assert!(matches!(event, SubscriptionEvent::Failed(Error::PeerClosed)));
		assert!(sub.client.subscriptions().is_empty());
		assert_eq!(sub.sib.closed(), 1);
	}

	#[tokio::test]
	async fn polling_unknown_subscription_fails() {
		let sib = FakeSib::new();
		let client = SessionClient::new("S1", ServerAddress::new("sib", 1), context(&sib, 1));

		let event = client.next_event("N1", "missing").await;
		assert!(matches!(event, SubscriptionEvent::Failed(Error::SubscriptionNotFound(_))));
	}
}
