//! Progress and completion observers.
//!
//! Observers run on the thread that serviced the transport event, right after the transfer lock
//! is released. They must return quickly and must not block: hand the snapshot over to another
//! thread (see [`ChannelObserver`]) if there is real work to do.

use async_channel as chan;
use tracing::debug;

use super::transfer::TransferSnapshot;

/// Notified after every chunk that moved a transfer forward
pub trait ProgressObserver: Send + Sync {
	fn on_progress(&self, snapshot: &TransferSnapshot);
}

/// Notified once when a transport event drives a transfer to `Completed` or `Failed`
pub trait CompletionObserver: Send + Sync {
	fn on_complete(&self, snapshot: &TransferSnapshot);
}

impl<F> ProgressObserver for F
where
	F: Fn(&TransferSnapshot) + Send + Sync,
{
	fn on_progress(&self, snapshot: &TransferSnapshot) {
		self(snapshot);
	}
}

impl<F> CompletionObserver for F
where
	F: Fn(&TransferSnapshot) + Send + Sync,
{
	fn on_complete(&self, snapshot: &TransferSnapshot) {
		self(snapshot);
	}
}

/// Forwards snapshots into a channel without ever blocking the caller.
///
/// Updates are dropped when the channel is full or closed, so use a bounded channel sized for
/// how far behind the consumer may fall.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
	tx: chan::Sender<TransferSnapshot>,
}

impl ChannelObserver {
	#[must_use]
	pub const fn new(tx: chan::Sender<TransferSnapshot>) -> Self {
		Self { tx }
	}

	fn forward(&self, snapshot: &TransferSnapshot) {
		if let Err(e) = self.tx.try_send(snapshot.clone()) {
			debug!(transfer_id = %snapshot.id, "dropping transfer update: {e}");
		}
	}
}

impl From<chan::Sender<TransferSnapshot>> for ChannelObserver {
	fn from(tx: chan::Sender<TransferSnapshot>) -> Self {
		Self::new(tx)
	}
}

impl ProgressObserver for ChannelObserver {
	fn on_progress(&self, snapshot: &TransferSnapshot) {
		self.forward(snapshot);
	}
}

impl CompletionObserver for ChannelObserver {
	fn on_complete(&self, snapshot: &TransferSnapshot) {
		self.forward(snapshot);
	}
}
