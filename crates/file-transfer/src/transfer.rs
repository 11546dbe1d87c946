use std::{fmt, fs::File, path::PathBuf, sync::Arc, time::SystemTime};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
	error::Error,
	observer::{CompletionObserver, ProgressObserver},
	state::TransferState,
	transport::{FileHandle, FileKind, PeerId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	#[must_use]
	pub const fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for TransferId {
	fn default() -> Self {
		Self::new()
	}
}

impl From<Uuid> for TransferId {
	fn from(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

impl fmt::Display for TransferId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
	/// We send a local file to a friend
	Outgoing,
	/// A friend sends a file to us
	Incoming,
}

impl fmt::Display for TransferDirection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Outgoing => write!(f, "outgoing"),
			Self::Incoming => write!(f, "incoming"),
		}
	}
}

/// Byte ranges written to an incoming file, kept sorted and merged
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ReceivedRanges(Vec<(u64, u64)>);

impl ReceivedRanges {
	pub(crate) fn insert(&mut self, start: u64, end: u64) {
		if start >= end {
			return;
		}

		let idx = self.0.partition_point(|&(_, e)| e < start);
		let mut merged = (start, end);
		let mut last = idx;
		while let Some(&(s, e)) = self.0.get(last) {
			if s > merged.1 {
				break;
			}
			merged = (merged.0.min(s), merged.1.max(e));
			last += 1;
		}

		self.0.drain(idx..last);
		self.0.insert(idx, merged);
	}

	/// Length of the gap free prefix starting at offset zero
	pub(crate) fn contiguous_len(&self) -> u64 {
		match self.0.first() {
			Some(&(0, end)) => end,
			_ => 0,
		}
	}
}

/// Mutable part of a [`Transfer`], only reachable through its lock
pub(crate) struct TransferInner {
	pub(crate) state: TransferState,
	pub(crate) file_handle: Option<FileHandle>,
	pub(crate) file_path: Option<PathBuf>,
	pub(crate) checksum: Option<String>,
	pub(crate) expected_checksum: Option<String>,
	pub(crate) checksum_verified: Option<bool>,
	pub(crate) bytes_transferred: u64,
	pub(crate) received: ReceivedRanges,
	pub(crate) started_at: SystemTime,
	pub(crate) ended_at: Option<SystemTime>,
	pub(crate) failure_reason: Option<String>,
	pub(crate) file: Option<File>,
	pub(crate) progress_observer: Option<Arc<dyn ProgressObserver>>,
	pub(crate) completion_observer: Option<Arc<dyn CompletionObserver>>,
}

impl TransferInner {
	fn new(file: Option<File>, file_path: Option<PathBuf>) -> Self {
		Self {
			state: TransferState::Pending,
			file_handle: None,
			file_path,
			checksum: None,
			expected_checksum: None,
			checksum_verified: None,
			bytes_transferred: 0,
			received: ReceivedRanges::default(),
			started_at: SystemTime::now(),
			ended_at: None,
			failure_reason: None,
			file,
			progress_observer: None,
			completion_observer: None,
		}
	}

	pub(crate) fn expect_state(
		&self,
		id: TransferId,
		expected: TransferState,
	) -> Result<(), Error> {
		if self.state == expected {
			Ok(())
		} else {
			Err(Error::InvalidState {
				id,
				expected: expected.name(),
				actual: self.state,
			})
		}
	}

	/// Move to `next`, closing the file and stamping the end time on terminal states.
	/// Callers validate the transition first.
	pub(crate) fn set_state(&mut self, id: TransferId, next: TransferState) {
		debug_assert!(
			self.state.can_transition_to(next),
			"invalid transition {} -> {next}",
			self.state
		);

		debug!(%id, from = %self.state, to = %next, "transfer state change");
		self.state = next;

		if next.is_terminal() {
			self.file = None;
			self.ended_at = Some(SystemTime::now());
		}
	}

	/// Mark as failed unless already finished
	pub(crate) fn fail(&mut self, id: TransferId, reason: impl Into<String>) {
		if self.state.is_terminal() {
			return;
		}

		let reason = reason.into();
		info!(%id, %reason, "transfer failed");
		self.failure_reason = Some(reason);
		self.set_state(id, TransferState::Failed);
	}

	/// Raise the high-water mark, never past `file_size` and never backwards
	pub(crate) fn advance_to(&mut self, offset: u64, file_size: u64) {
		self.bytes_transferred = self.bytes_transferred.max(offset.min(file_size));
	}
}

/// One unidirectional file transfer with a friend
pub struct Transfer {
	id: TransferId,
	peer: PeerId,
	direction: TransferDirection,
	kind: FileKind,
	file_name: String,
	file_size: u64,
	inner: RwLock<TransferInner>,
}

impl Transfer {
	pub(crate) fn outgoing(
		peer: PeerId,
		kind: FileKind,
		file_name: String,
		file_size: u64,
		file_path: PathBuf,
		checksum: String,
		file: File,
	) -> Self {
		let mut inner = TransferInner::new(Some(file), Some(file_path));
		inner.checksum = Some(checksum);

		Self {
			id: TransferId::new(),
			peer,
			direction: TransferDirection::Outgoing,
			kind,
			file_name,
			file_size,
			inner: RwLock::new(inner),
		}
	}

	pub(crate) fn incoming(
		peer: PeerId,
		file_handle: FileHandle,
		kind: FileKind,
		file_name: String,
		file_size: u64,
	) -> Self {
		let mut inner = TransferInner::new(None, None);
		inner.file_handle = Some(file_handle);

		Self {
			id: TransferId::new(),
			peer,
			direction: TransferDirection::Incoming,
			kind,
			file_name,
			file_size,
			inner: RwLock::new(inner),
		}
	}

	pub(crate) fn read(&self) -> RwLockReadGuard<'_, TransferInner> {
		self.inner.read()
	}

	pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TransferInner> {
		self.inner.write()
	}

	#[must_use]
	pub const fn id(&self) -> TransferId {
		self.id
	}

	#[must_use]
	pub const fn peer(&self) -> PeerId {
		self.peer
	}

	#[must_use]
	pub const fn direction(&self) -> TransferDirection {
		self.direction
	}

	#[must_use]
	pub const fn kind(&self) -> FileKind {
		self.kind
	}

	/// Name as announced, for incoming transfers this is untrusted input
	#[must_use]
	pub fn file_name(&self) -> &str {
		&self.file_name
	}

	#[must_use]
	pub const fn file_size(&self) -> u64 {
		self.file_size
	}

	#[must_use]
	pub fn state(&self) -> TransferState {
		self.read().state
	}

	#[must_use]
	pub fn file_handle(&self) -> Option<FileHandle> {
		self.read().file_handle
	}

	/// Source path for outgoing transfers, destination path once an incoming one is accepted
	#[must_use]
	pub fn file_path(&self) -> Option<PathBuf> {
		self.read().file_path.clone()
	}

	/// Hex SHA-256 of the file, for incoming transfers only set after completion
	#[must_use]
	pub fn checksum(&self) -> Option<String> {
		self.read().checksum.clone()
	}

	/// `None` when there was no expected checksum to compare with
	#[must_use]
	pub fn checksum_verified(&self) -> Option<bool> {
		self.read().checksum_verified
	}

	#[must_use]
	pub fn bytes_transferred(&self) -> u64 {
		self.read().bytes_transferred
	}

	#[must_use]
	pub fn started_at(&self) -> SystemTime {
		self.read().started_at
	}

	#[must_use]
	pub fn ended_at(&self) -> Option<SystemTime> {
		self.read().ended_at
	}

	#[must_use]
	pub fn failure_reason(&self) -> Option<String> {
		self.read().failure_reason.clone()
	}

	/// Fraction of the file transferred, `0.0` for empty files
	#[must_use]
	pub fn progress(&self) -> f64 {
		progress_of(self.read().bytes_transferred, self.file_size)
	}

	/// Whether the transfer reached a terminal state
	#[must_use]
	pub fn is_complete(&self) -> bool {
		self.read().state.is_terminal()
	}

	#[must_use]
	pub fn snapshot(&self) -> TransferSnapshot {
		self.snapshot_with(&self.read())
	}

	pub(crate) fn snapshot_with(&self, inner: &TransferInner) -> TransferSnapshot {
		TransferSnapshot {
			id: self.id,
			peer: self.peer,
			direction: self.direction,
			kind: self.kind,
			file_name: self.file_name.clone(),
			file_size: self.file_size,
			file_handle: inner.file_handle,
			file_path: inner.file_path.clone(),
			state: inner.state,
			bytes_transferred: inner.bytes_transferred,
			checksum: inner.checksum.clone(),
			checksum_verified: inner.checksum_verified,
			started_at: inner.started_at,
			ended_at: inner.ended_at,
			failure_reason: inner.failure_reason.clone(),
		}
	}
}

impl fmt::Debug for Transfer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = self.read();
		f.debug_struct("Transfer")
			.field("id", &self.id)
			.field("peer", &self.peer)
			.field("direction", &self.direction)
			.field("file_name", &self.file_name)
			.field("file_size", &self.file_size)
			.field("file_handle", &inner.file_handle)
			.field("state", &inner.state)
			.field("bytes_transferred", &inner.bytes_transferred)
			.finish_non_exhaustive()
	}
}

/// Point in time copy of a transfer, handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSnapshot {
	pub id: TransferId,
	pub peer: PeerId,
	pub direction: TransferDirection,
	pub kind: FileKind,
	pub file_name: String,
	pub file_size: u64,
	pub file_handle: Option<FileHandle>,
	pub file_path: Option<PathBuf>,
	pub state: TransferState,
	pub bytes_transferred: u64,
	pub checksum: Option<String>,
	pub checksum_verified: Option<bool>,
	pub started_at: SystemTime,
	pub ended_at: Option<SystemTime>,
	pub failure_reason: Option<String>,
}

impl TransferSnapshot {
	#[must_use]
	pub fn progress(&self) -> f64 {
		progress_of(self.bytes_transferred, self.file_size)
	}
}

#[allow(clippy::cast_precision_loss)]
fn progress_of(bytes_transferred: u64, file_size: u64) -> f64 {
	if file_size == 0 {
		0.0
	} else {
		bytes_transferred as f64 / file_size as f64
	}
}
