//! Servicing of transport events.
//!
//! Handlers never report errors back to the transport: stale events are logged and dropped, and
//! I/O or transport failures while servicing a live transfer mark it `Failed`. Observers run once
//! the transfer lock has been released.

use std::{
	fs::File,
	io::{self, Read, Seek, SeekFrom, Write},
	sync::Arc,
};

use tracing::{debug, error, info, warn};

use super::{
	error::Error,
	integrity::{checksum_file, IntegrityPolicy},
	manager::TransferManager,
	observer::{CompletionObserver, ProgressObserver},
	state::TransferState,
	transfer::{Transfer, TransferDirection, TransferId, TransferInner, TransferSnapshot},
	transport::{FileHandle, FileKind, PeerId, TransportEvent},
};

/// Observer calls collected under the transfer lock, delivered after it is released
pub(crate) struct Notification {
	snapshot: TransferSnapshot,
	progress: Option<Arc<dyn ProgressObserver>>,
	completion: Option<Arc<dyn CompletionObserver>>,
}

impl Notification {
	pub(crate) fn capture(transfer: &Transfer, inner: &TransferInner, progressed: bool) -> Self {
		let snapshot = transfer.snapshot_with(inner);
		let progress = if progressed {
			inner.progress_observer.clone()
		} else {
			None
		};
		let completion = if snapshot.state.is_terminal() {
			inner.completion_observer.clone()
		} else {
			None
		};

		Self {
			snapshot,
			progress,
			completion,
		}
	}
}

impl TransferManager {
	/// Service one event from the transport on the calling thread
	pub fn handle_event(&self, event: TransportEvent) {
		match event {
			TransportEvent::Announce {
				peer,
				file_handle,
				kind,
				size,
				name,
			} => {
				self.on_announce(peer, file_handle, kind, size, name);
			}
			TransportEvent::Chunk {
				peer,
				file_handle,
				position,
				data,
			} => self.on_chunk(peer, file_handle, position, &data),
			TransportEvent::PullRequest {
				peer,
				file_handle,
				position,
				length,
			} => self.on_pull_request(peer, file_handle, position, length),
		}
	}

	/// A friend offers a file, it waits as `Pending` until
	/// [`accept_incoming`](Self::accept_incoming)
	pub fn on_announce(
		&self,
		peer: PeerId,
		file_handle: FileHandle,
		kind: FileKind,
		size: u64,
		name: String,
	) -> TransferId {
		let transfer = Arc::new(Transfer::incoming(peer, file_handle, kind, name, size));
		let id = transfer.id();
		let key = (peer, file_handle);

		if let Some(previous) = self.registry.insert_routed(Arc::clone(&transfer), key) {
			self.supersede(&previous, key);
		}

		info!(
			transfer_id = %id,
			%peer,
			%file_handle,
			size,
			name = transfer.file_name(),
			"incoming transfer announced"
		);

		id
	}

	/// The remote side pulls `length` bytes at `position` of a file we send, zero meaning it is
	/// done
	pub fn on_pull_request(
		&self,
		peer: PeerId,
		file_handle: FileHandle,
		position: u64,
		length: usize,
	) {
		let Some(transfer) = self.registry.get_routed((peer, file_handle)) else {
			warn!(%peer, %file_handle, position, length, "pull request for unknown file, ignoring");
			return;
		};
		if transfer.direction() != TransferDirection::Outgoing {
			warn!(
				transfer_id = %transfer.id(),
				%peer,
				%file_handle,
				"pull request for incoming transfer, ignoring"
			);
			return;
		}

		let id = transfer.id();
		let notification = {
			let mut inner = transfer.write();
			if inner.state != TransferState::Active {
				debug!(
					transfer_id = %id,
					state = %inner.state,
					"pull request while not active, ignoring"
				);
				return;
			}

			if length == 0 {
				inner.set_state(id, TransferState::Completed);
				info!(transfer_id = %id, %peer, "outgoing transfer completed");
				Notification::capture(&transfer, &inner, false)
			} else if position > transfer.file_size() {
				warn!(
					transfer_id = %id,
					position,
					size = transfer.file_size(),
					"pull request past end of file, ignoring"
				);
				return;
			} else {
				let served = match self.serve_chunk(&transfer, &mut inner, position, length) {
					Ok(read) => {
						inner.advance_to(position + read, transfer.file_size());
						debug!(transfer_id = %id, position, read, "served chunk");
						true
					}
					Err(reason) => {
						error!(transfer_id = %id, %reason, "failed to serve pull request");
						inner.fail(id, reason);
						false
					}
				};
				Notification::capture(&transfer, &inner, served)
			}
		};

		self.deliver(&transfer, notification);
	}

	fn serve_chunk(
		&self,
		transfer: &Transfer,
		inner: &mut TransferInner,
		position: u64,
		length: usize,
	) -> Result<u64, String> {
		let (Some(file), Some(file_handle)) = (inner.file.as_mut(), inner.file_handle) else {
			return Err("source file is not open".to_string());
		};

		let remaining = transfer.file_size().saturating_sub(position);
		let length = usize::try_from(remaining).map_or(length, |remaining| length.min(remaining));

		let data = read_chunk(file, position, length)
			.map_err(|e| format!("failed to read source file: {e}"))?;
		if !data.is_empty() {
			self.transport
				.push_chunk(transfer.peer(), file_handle, position, &data)
				.map_err(|e| format!("failed to push chunk: {e}"))?;
		}

		Ok(data.len() as u64)
	}

	/// A chunk of a file we accepted arrived
	pub fn on_chunk(&self, peer: PeerId, file_handle: FileHandle, position: u64, data: &[u8]) {
		let Some(transfer) = self.registry.get_routed((peer, file_handle)) else {
			warn!(%peer, %file_handle, position, "chunk for unknown file, ignoring");
			return;
		};
		if transfer.direction() != TransferDirection::Incoming {
			warn!(
				transfer_id = %transfer.id(),
				%peer,
				%file_handle,
				"chunk for outgoing transfer, ignoring"
			);
			return;
		}

		let id = transfer.id();
		let size = transfer.file_size();
		let notification = {
			let mut inner = transfer.write();
			if inner.state != TransferState::Active {
				debug!(transfer_id = %id, state = %inner.state, "chunk while not active, ignoring");
				return;
			}
			let Some(file) = inner.file.as_mut() else {
				debug!(transfer_id = %id, "chunk without an open file, ignoring");
				return;
			};

			let written = match position
				.checked_add(data.len() as u64)
				.filter(|&end| end <= size)
			{
				Some(end) => write_chunk(file, position, data)
					.map(|()| end)
					.map_err(|e| format!("failed to write chunk: {e}")),
				None => Err("chunk exceeds announced size".to_string()),
			};

			let stored = written.is_ok();
			match written {
				Ok(end) => {
					inner.received.insert(position, end);
					inner.bytes_transferred = inner.received.contiguous_len();
					debug!(transfer_id = %id, position, len = data.len(), "wrote chunk");

					if inner.bytes_transferred >= size {
						self.finalize_incoming(&transfer, &mut inner);
					}
				}
				Err(reason) => {
					error!(transfer_id = %id, %reason, "failed to store chunk");
					inner.fail(id, reason);
				}
			}

			Notification::capture(&transfer, &inner, stored)
		};

		self.deliver(&transfer, notification);
	}

	/// Close the destination, digest it and settle the final state per the integrity policy
	pub(crate) fn finalize_incoming(&self, transfer: &Transfer, inner: &mut TransferInner) {
		let id = transfer.id();

		if let Some(mut file) = inner.file.take() {
			if let Err(e) = file.flush() {
				inner.fail(id, format!("failed to flush received file: {e}"));
				return;
			}
		}

		let Some(path) = inner.file_path.clone() else {
			inner.fail(id, "received file has no destination path");
			return;
		};

		let actual = match checksum_file(&path) {
			Ok(actual) => actual,
			Err(e) => {
				error!(transfer_id = %id, "{e}");
				inner.fail(id, format!("failed to checksum received file: {e}"));
				return;
			}
		};

		let expected = inner.expected_checksum.clone();
		inner.checksum = Some(actual.clone());
		inner.checksum_verified = expected.as_ref().map(|expected| *expected == actual);

		match (expected, inner.checksum_verified) {
			(Some(expected), Some(false)) => {
				let mismatch = Error::ChecksumMismatch { expected, actual };
				match self.config.integrity {
					IntegrityPolicy::Record => {
						warn!(transfer_id = %id, "{mismatch}");
						inner.set_state(id, TransferState::Completed);
					}
					IntegrityPolicy::Enforce => inner.fail(id, mismatch.to_string()),
				}
			}
			_ => {
				inner.set_state(id, TransferState::Completed);
				info!(transfer_id = %id, peer = %transfer.peer(), "incoming transfer completed");
			}
		}
	}

	/// Run observers and drop the route of a finished transfer, the transfer lock must be released
	pub(crate) fn deliver(&self, transfer: &Transfer, notification: Notification) {
		let Notification {
			snapshot,
			progress,
			completion,
		} = notification;

		if let Some(observer) = progress {
			observer.on_progress(&snapshot);
		}

		if snapshot.state.is_terminal() {
			if let Some(file_handle) = snapshot.file_handle {
				self.registry.unroute((snapshot.peer, file_handle), transfer);
			}

			if let Some(observer) = completion {
				observer.on_complete(&snapshot);
			}
		}
	}
}

fn read_chunk(file: &mut File, position: u64, length: usize) -> io::Result<Vec<u8>> {
	file.seek(SeekFrom::Start(position))?;

	let mut data = Vec::with_capacity(length);
	Read::take(&mut *file, length as u64).read_to_end(&mut data)?;

	Ok(data)
}

fn write_chunk(file: &mut File, position: u64, data: &[u8]) -> io::Result<()> {
	file.seek(SeekFrom::Start(position))?;
	file.write_all(data)
}
