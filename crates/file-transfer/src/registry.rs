//! Registry of every transfer known to a manager.
//!
//! Two indices live behind a single lock: by transfer id (every transfer, for the life of the
//! manager) and by `(peer, file handle)` (only while the transport may still send events for
//! it). Methods hand out `Arc<Transfer>` clones and never touch a transfer's own lock while the
//! registry lock is held.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::{
	transfer::{Transfer, TransferId},
	transport::{FileHandle, PeerId},
};

pub(crate) type RouteKey = (PeerId, FileHandle);

#[derive(Default)]
struct Indices {
	by_id: HashMap<TransferId, Arc<Transfer>>,
	by_route: HashMap<RouteKey, Arc<Transfer>>,
}

#[derive(Default)]
pub(crate) struct TransferRegistry {
	indices: RwLock<Indices>,
}

impl TransferRegistry {
	pub(crate) fn insert(&self, transfer: Arc<Transfer>) {
		self.indices.write().by_id.insert(transfer.id(), transfer);
	}

	/// Insert a transfer and route `key` to it, returning whatever the key pointed at before
	pub(crate) fn insert_routed(
		&self,
		transfer: Arc<Transfer>,
		key: RouteKey,
	) -> Option<Arc<Transfer>> {
		let mut indices = self.indices.write();
		indices.by_id.insert(transfer.id(), Arc::clone(&transfer));
		indices.by_route.insert(key, transfer)
	}

	/// Route `key` to an already registered transfer, returning the previous target
	pub(crate) fn route(&self, key: RouteKey, transfer: Arc<Transfer>) -> Option<Arc<Transfer>> {
		self.indices.write().by_route.insert(key, transfer)
	}

	/// Drop the route for `key` if it still points at `transfer`
	pub(crate) fn unroute(&self, key: RouteKey, transfer: &Transfer) -> bool {
		let mut indices = self.indices.write();
		let routed_here = indices
			.by_route
			.get(&key)
			.is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), transfer));
		if routed_here {
			indices.by_route.remove(&key);
		}

		routed_here
	}

	pub(crate) fn get(&self, id: TransferId) -> Option<Arc<Transfer>> {
		self.indices.read().by_id.get(&id).cloned()
	}

	pub(crate) fn get_routed(&self, key: RouteKey) -> Option<Arc<Transfer>> {
		self.indices.read().by_route.get(&key).cloned()
	}

	pub(crate) fn all(&self) -> Vec<Arc<Transfer>> {
		self.indices.read().by_id.values().cloned().collect()
	}

	pub(crate) fn by_peer(&self, peer: PeerId) -> Vec<Arc<Transfer>> {
		self.indices
			.read()
			.by_id
			.values()
			.filter(|transfer| transfer.peer() == peer)
			.cloned()
			.collect()
	}

	/// Forget the given transfers entirely, routes included
	pub(crate) fn remove(&self, ids: &[TransferId]) -> usize {
		let mut indices = self.indices.write();
		let removed = ids
			.iter()
			.filter(|id| indices.by_id.remove(*id).is_some())
			.count();
		indices
			.by_route
			.retain(|_, transfer| !ids.contains(&transfer.id()));

		removed
	}

	#[cfg(test)]
	pub(crate) fn routed_count(&self) -> usize {
		self.indices.read().by_route.len()
	}
}
