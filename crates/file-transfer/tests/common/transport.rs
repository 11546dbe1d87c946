use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use parley_file_transfer::{
	ControlSignal, EventSender, FileHandle, FileKind, PeerId, TransferId, Transport,
	TransportError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announced {
	pub peer: PeerId,
	pub kind: FileKind,
	pub size: u64,
	pub file_id: TransferId,
	pub name: String,
	pub file_handle: FileHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pushed {
	pub peer: PeerId,
	pub file_handle: FileHandle,
	pub position: u64,
	pub data: Vec<u8>,
}

/// Transport that records every call and fails on request
#[derive(Default)]
pub struct MockTransport {
	next_handle: AtomicU32,
	pub fail_initiate: AtomicBool,
	pub fail_push: AtomicBool,
	pub fail_control: AtomicBool,
	pub announced: Mutex<Vec<Announced>>,
	pub pushed: Mutex<Vec<Pushed>>,
	pub controls: Mutex<Vec<(PeerId, FileHandle, ControlSignal)>>,
	pub events: Mutex<Option<EventSender>>,
}

impl MockTransport {
	/// Handles are handed out starting at 1
	pub fn set_next_handle(&self, handle: u32) {
		self.next_handle.store(handle.saturating_sub(1), Ordering::SeqCst);
	}

	pub fn pushed_bytes(&self) -> Vec<u8> {
		self.pushed
			.lock()
			.iter()
			.flat_map(|pushed| pushed.data.iter().copied())
			.collect()
	}

	pub fn controls(&self) -> Vec<ControlSignal> {
		self.controls
			.lock()
			.iter()
			.map(|&(_, _, signal)| signal)
			.collect()
	}

	pub fn sender(&self) -> EventSender {
		self.events.lock().clone().expect("no dispatcher subscribed")
	}

	fn check(flag: &AtomicBool) -> Result<(), TransportError> {
		if flag.load(Ordering::SeqCst) {
			Err(TransportError::Other("mock failure".to_string()))
		} else {
			Ok(())
		}
	}
}

impl Transport for MockTransport {
	fn initiate(
		&self,
		peer: PeerId,
		kind: FileKind,
		size: u64,
		file_id: TransferId,
		name: &str,
	) -> Result<FileHandle, TransportError> {
		if self.fail_initiate.load(Ordering::SeqCst) {
			return Err(TransportError::FriendNotConnected(peer));
		}

		let file_handle = FileHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
		self.announced.lock().push(Announced {
			peer,
			kind,
			size,
			file_id,
			name: name.to_string(),
			file_handle,
		});

		Ok(file_handle)
	}

	fn push_chunk(
		&self,
		peer: PeerId,
		file_handle: FileHandle,
		position: u64,
		data: &[u8],
	) -> Result<(), TransportError> {
		Self::check(&self.fail_push)?;

		self.pushed.lock().push(Pushed {
			peer,
			file_handle,
			position,
			data: data.to_vec(),
		});

		Ok(())
	}

	fn control(
		&self,
		peer: PeerId,
		file_handle: FileHandle,
		signal: ControlSignal,
	) -> Result<(), TransportError> {
		Self::check(&self.fail_control)?;

		self.controls.lock().push((peer, file_handle, signal));

		Ok(())
	}

	fn subscribe(&self, events: EventSender) {
		*self.events.lock() = Some(events);
	}
}
