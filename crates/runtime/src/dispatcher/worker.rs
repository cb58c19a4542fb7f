//! Worker loop and per-operation execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ssap_protocol::{Message, Operation};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::task::Task;
use crate::caller::{CONNECTION_FAILURE, Reply, ReplyStatus, SIB_REPORTED_ERROR};
use crate::error::{Error, Result};
use crate::subscription::SubscriptionEvent;

pub(super) type Queue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>;

/// Marks a worker busy for as long as it lives.
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
	fn enter(active: &'a AtomicUsize) -> Self {
		active.fetch_add(1, Ordering::SeqCst);
		Self(active)
	}
}

impl Drop for Busy<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

pub(super) async fn run(id: usize, queue: Queue, active: Arc<AtomicUsize>) {
	loop {
		let next = { queue.lock().await.recv().await };
		let Some(task) = next else {
			break;
		};

		let _busy = Busy::enter(&active);
		let span = tracing::info_span!(
			"task",
			worker = id,
			op = %task.operation.name(),
			server = %task.server.identity(),
			node = %task.node_id,
			access = %task.access_id,
		);
		execute(task).instrument(span).await;
	}
	tracing::debug!(target: "ssap.dispatch", worker = id, "worker stopped");
}

fn log_failure(err: &Error) {
	if err.is_application() {
		tracing::debug!(target: "ssap.dispatch", error = %err, "server refused operation");
	} else {
		tracing::warn!(target: "ssap.dispatch", error = %err, "operation failed");
	}
}

/// Insert/update/remove reply: payload on success, diagnostic otherwise.
fn modify_outcome(result: Result<Message>) -> (ReplyStatus, String) {
	match result {
		Ok(message) => (ReplyStatus::Ok, message.payload.unwrap_or_default()),
		Err(err) => {
			log_failure(&err);
			let diagnostic = if err.is_application() {
				SIB_REPORTED_ERROR
			} else {
				CONNECTION_FAILURE
			};
			(ReplyStatus::OperationFailed, diagnostic.to_owned())
		}
	}
}

async fn execute(task: Task) {
	let client = task.server.client();
	let access_id = task.access_id.clone();

	match &task.operation {
		Operation::Join => {
			let status = match client.request(&task.node_id, task.transaction_id, &task.operation).await {
				Ok(_) => ReplyStatus::Ok,
				Err(err) => {
					log_failure(&err);
					ReplyStatus::OperationFailed
				}
			};
			task.reply(Reply::JoinComplete { access_id, status });
		}
		Operation::Leave => {
			if let Err(err) = client.request(&task.node_id, task.transaction_id, &task.operation).await {
				tracing::error!(target: "ssap.dispatch", error = %err, "leave failed");
			}
		}
		Operation::Insert { .. } | Operation::Update { .. } | Operation::Remove { .. } => {
			let result = client.request(&task.node_id, task.transaction_id, &task.operation).await;
			let (status, payload) = modify_outcome(result);
			let reply = match task.operation {
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
				_ => Reply::RemoveResponse {
					access_id,
					status,
					payload,
				},
			};
			task.reply(reply);
		}
		Operation::Query { .. } => {
			let result = client.request(&task.node_id, task.transaction_id, &task.operation).await;
			match result.map(|message| message.payload) {
				Ok(Some(payload)) => task.reply(Reply::QueryResponse {
					access_id,
					status: ReplyStatus::Ok,
					payload,
				}),
				Ok(None) => {
					tracing::warn!(target: "ssap.dispatch", "query confirmation without results");
					task.reply_failure();
				}
				Err(err) => {
					log_failure(&err);
					task.reply_failure();
				}
			}
		}
		Operation::Subscribe { .. } => subscribe(&task).await,
		Operation::Unsubscribe { subscription_id } => {
			// Success is reported by the subscription's own poll loop
			if let Err(err) = client
				.unsubscribe(&task.node_id, task.transaction_id, subscription_id)
				.await
			{
				log_failure(&err);
				task.reply_failure();
			}
		}
	}
}

/// Subscribes, replies, then stays on the subscription until it ends.
async fn subscribe(task: &Task) {
	let client = task.server.client();
	let confirm = match client.subscribe(&task.node_id, task.transaction_id, &task.operation).await {
		Ok(message) => message,
		Err(err) => {
			log_failure(&err);
			task.reply_failure();
			return;
		}
	};

	let subscription_id = confirm.subscription_id.unwrap_or_default();
	task.reply(Reply::SubscribeResponse {
		access_id: task.access_id.clone(),
		status: ReplyStatus::Ok,
		subscription_id: subscription_id.clone(),
		results: confirm.payload.unwrap_or_default(),
	});

	client
		.long_poll(&task.node_id, &subscription_id, |event| {
			let reply = match event {
				SubscriptionEvent::Indication {
					sequence,
					added,
					removed,
				} => Reply::SubscriptionIndication {
					access_id: task.access_id.clone(),
					sequence,
					subscription_id: subscription_id.clone(),
					added,
					removed,
				},
				SubscriptionEvent::Ended { status } => Reply::UnsubscribeComplete {
					access_id: task.access_id.clone(),
					status: if status.is_ok() {
						ReplyStatus::Ok
					} else {
						ReplyStatus::OperationFailed
					},
					subscription_id: subscription_id.clone(),
				},
				SubscriptionEvent::Failed(_) => Reply::UnsubscribeComplete {
					access_id: task.access_id.clone(),
					status: ReplyStatus::OperationFailed,
					subscription_id: subscription_id.clone(),
				},
			};
			task.reply(reply);
		})
		.await;
}
