//! Sharded dispatch of transport events.
//!
//! The transport pushes [`TransportEvent`]s into an [`EventSender`]. Each event goes to one of
//! several bounded queues picked by hashing its `(peer, file handle)` pair, and every queue is
//! drained by its own worker thread. Events of one transfer are therefore serviced in the order
//! they were sent, while different transfers proceed in parallel.

use std::{
	collections::hash_map::DefaultHasher,
	hash::{Hash, Hasher},
	panic::{self, AssertUnwindSafe},
	sync::Arc,
	thread::{self, JoinHandle},
};

use async_channel as chan;
use tracing::{debug, error, trace};

use super::{
	error::{Error, Result},
	manager::TransferManager,
	registry::RouteKey,
	transport::TransportEvent,
};

/// Handle given to the transport to deliver its callbacks
#[derive(Debug, Clone)]
pub struct EventSender {
	queues: Arc<[chan::Sender<TransportEvent>]>,
}

impl EventSender {
	/// Queue an event, blocking while the target queue is full
	pub fn send(&self, event: TransportEvent) -> Result<()> {
		self.queue_for(event.route_key())
			.send_blocking(event)
			.map_err(|_| Error::DispatcherClosed)
	}

	/// Queue an event without blocking
	pub fn try_send(&self, event: TransportEvent) -> Result<()> {
		self.queue_for(event.route_key())
			.try_send(event)
			.map_err(|e| match e {
				chan::TrySendError::Full(_) => Error::EventQueueFull,
				chan::TrySendError::Closed(_) => Error::DispatcherClosed,
			})
	}

	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.queues.iter().all(chan::Sender::is_closed)
	}

	fn queue_for(&self, key: RouteKey) -> &chan::Sender<TransportEvent> {
		&self.queues[shard_of(key, self.queues.len())]
	}
}

#[allow(clippy::cast_possible_truncation)]
fn shard_of(key: RouteKey, shards: usize) -> usize {
	let mut hasher = DefaultHasher::new();
	key.hash(&mut hasher);
	(hasher.finish() % shards as u64) as usize
}

/// Worker threads servicing transport events for one manager
#[derive(Debug)]
pub struct EventDispatcher {
	sender: EventSender,
	workers: Vec<JoinHandle<()>>,
}

impl EventDispatcher {
	pub(crate) fn spawn(
		manager: &Arc<TransferManager>,
		workers_count: usize,
		queue_capacity: usize,
	) -> Result<Self> {
		let workers_count = workers_count.max(1);

		let (queues, receivers) = (0..workers_count)
			.map(|_| chan::bounded(queue_capacity.max(1)))
			.unzip::<_, _, Vec<_>, Vec<_>>();

		let mut dispatcher = Self {
			sender: EventSender {
				queues: queues.into(),
			},
			workers: Vec::with_capacity(workers_count),
		};

		for (worker_id, events_rx) in receivers.into_iter().enumerate() {
			let manager = Arc::clone(manager);

			// On failure the partially built dispatcher is dropped, which closes the queues
			// and joins the workers already running
			let handle = thread::Builder::new()
				.name(format!("file-transfer-events-{worker_id}"))
				.spawn(move || run(worker_id, &manager, &events_rx))
				.map_err(Error::DispatcherSpawn)?;

			dispatcher.workers.push(handle);
		}

		debug!(workers = workers_count, "event dispatcher started");

		Ok(dispatcher)
	}

	#[must_use]
	pub fn sender(&self) -> EventSender {
		self.sender.clone()
	}

	/// Stop accepting events, let workers drain what is already queued and wait for them
	pub fn shutdown(mut self) {
		self.close();
	}

	fn close(&mut self) {
		for queue in self.sender.queues.iter() {
			queue.close();
		}

		for handle in self.workers.drain(..) {
			if handle.join().is_err() {
				error!("event dispatcher worker panicked");
			}
		}
	}
}

impl Drop for EventDispatcher {
	fn drop(&mut self) {
		self.close();
	}
}

fn run(worker_id: usize, manager: &TransferManager, events_rx: &chan::Receiver<TransportEvent>) {
	while let Ok(event) = events_rx.recv_blocking() {
		trace!(worker_id, ?event, "dispatching transport event");

		if let Err(e) = panic::catch_unwind(AssertUnwindSafe(|| manager.handle_event(event))) {
			error!(worker_id, "transport event handler panicked: {e:?}");
		}
	}

	debug!(worker_id, "event dispatcher worker stopped");
}
