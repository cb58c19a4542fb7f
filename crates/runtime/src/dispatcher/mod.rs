//! Fixed-size worker pool fed by a non-blocking queue.
//!
//! Each worker takes one [`Task`] at a time and runs it to completion. A
//! subscribe task holds its worker until the subscription ends, so every live
//! subscription shrinks the pool available to one-shot operations by one;
//! [`Dispatcher::active_workers`] makes that visible. Tasks for the same
//! server may run in any order.

mod task;
mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
pub use task::Task;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::caller::{CallerHandle, InboundRequest};
use crate::context::GatewayContext;
use crate::error::{Error, Result};
use crate::server::ServerHandle;

pub struct Dispatcher {
	queue: Mutex<Option<mpsc::UnboundedSender<Task>>>,
	workers: Mutex<Vec<JoinHandle<()>>>,
	active: Arc<AtomicUsize>,
	worker_count: usize,
}

impl Dispatcher {
	/// Spawns the pool on the current tokio runtime.
	pub fn new(ctx: &GatewayContext) -> Self {
		let worker_count = ctx.config.workers.max(1);
		let (tx, rx) = mpsc::unbounded_channel();
		let rx: worker::Queue = Arc::new(tokio::sync::Mutex::new(rx));
		let active = Arc::new(AtomicUsize::new(0));

		let workers = (0..worker_count)
			.map(|id| tokio::spawn(worker::run(id, Arc::clone(&rx), Arc::clone(&active))))
			.collect();
		tracing::debug!(target: "ssap.dispatch", workers = worker_count, "dispatcher started");

		Self {
			queue: Mutex::new(Some(tx)),
			workers: Mutex::new(workers),
			active,
			worker_count,
		}
	}

	/// Queues one operation and returns immediately.
	///
	/// The task takes its own references on `server` and `caller` and copies
	/// the payload, so the caller may drop everything once this returns.
	pub fn submit(
		&self,
		server: &ServerHandle,
		caller: &CallerHandle,
		request: &InboundRequest,
	) -> Result<()> {
		let task = Task::new(server, caller, request);
		let queue = self.queue.lock();
		let Some(tx) = queue.as_ref() else {
			return Err(Error::DispatcherClosed);
		};
		tx.send(task).map_err(|_| Error::DispatcherClosed)?;
		tracing::debug!(
			target: "ssap.dispatch",
			op = %request.operation.name(),
			server = %server.identity(),
			access = %request.access_id,
			payload_len = request.operation.payload_len(),
			"task queued"
		);
		Ok(())
	}

	/// Workers currently running a task, subscriptions included.
	pub fn active_workers(&self) -> usize {
		self.active.load(Ordering::SeqCst)
	}

	pub fn worker_count(&self) -> usize {
		self.worker_count
	}

	pub fn is_closed(&self) -> bool {
		self.queue.lock().is_none()
	}

	/// Stops accepting tasks and waits for every worker to exit.
	///
	/// Queued tasks still run. Workers on a subscription exit once it ends.
	pub async fn shutdown(&self) {
		drop(self.queue.lock().take());
		let workers = std::mem::take(&mut *self.workers.lock());
		for result in futures_util::future::join_all(workers).await {
			if let Err(err) = result {
				tracing::warn!(target: "ssap.dispatch", error = %err, "worker ended abnormally");
			}
		}
		tracing::debug!(target: "ssap.dispatch", "dispatcher stopped");
	}
}
