use std::{
	fs::{self, File, OpenOptions},
	io,
	path::Path,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};

use parley_utils::error::{report_error, FileIOError, NonUtf8PathError};
use tracing::{debug, info, warn};

use super::{
	config::TransferConfig,
	dispatcher::EventDispatcher,
	error::{Error, Result},
	handlers::Notification,
	integrity::checksum_file,
	observer::{CompletionObserver, ProgressObserver},
	registry::{RouteKey, TransferRegistry},
	state::TransferState,
	transfer::{Transfer, TransferDirection, TransferId, TransferInner},
	transport::{ControlSignal, FileHandle, PeerId, Transport},
	validation::sanitize_file_name,
};

/// Owns every transfer and drives them against a [`Transport`].
///
/// The registry lock and a transfer's own lock are never held at the same time: lookups clone the
/// `Arc<Transfer>` out of the registry, release it, and only then lock the transfer.
pub struct TransferManager {
	pub(crate) transport: Arc<dyn Transport>,
	pub(crate) registry: TransferRegistry,
	pub(crate) config: TransferConfig,
	max_file_size: AtomicU64,
}

impl TransferManager {
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self::with_config(transport, TransferConfig::default())
	}

	pub fn with_config(transport: Arc<dyn Transport>, config: TransferConfig) -> Self {
		Self {
			transport,
			registry: TransferRegistry::default(),
			max_file_size: AtomicU64::new(config.max_file_size),
			config,
		}
	}

	#[must_use]
	pub const fn config(&self) -> &TransferConfig {
		&self.config
	}

	/// Start the worker threads servicing transport events and hand their sender to the transport
	pub fn spawn_dispatcher(self: &Arc<Self>) -> Result<EventDispatcher> {
		let dispatcher = EventDispatcher::spawn(
			self,
			self.config.dispatcher_workers,
			self.config.event_queue_capacity,
		)?;

		self.transport.subscribe(dispatcher.sender());

		Ok(dispatcher)
	}

	/// Register a local file to be sent to `peer`.
	///
	/// The file's checksum is computed right away, so this blocks for a time proportional to the
	/// file size. Nothing is sent until [`start_send`](Self::start_send).
	pub fn send_file(&self, peer: PeerId, path: impl AsRef<Path>) -> Result<Arc<Transfer>> {
		let path = path.as_ref();

		let metadata = fs::metadata(path)
			.map_err(FileIOError::mapper(path, "failed to read metadata of file to send"))?;
		if !metadata.is_file() {
			return Err(Error::NotAFile(path.into()));
		}

		let max = self.max_file_size();
		if metadata.len() > max {
			return Err(Error::FileTooLarge {
				size: metadata.len(),
				max,
			});
		}

		let file_name = path
			.file_name()
			.ok_or_else(|| Error::NotAFile(path.into()))?
			.to_str()
			.ok_or_else(|| NonUtf8PathError(path.into()))?
			.to_owned();

		let checksum = checksum_file(path)?;
		let file =
			File::open(path).map_err(FileIOError::mapper(path, "failed to open file to send"))?;

		let transfer = Arc::new(Transfer::outgoing(
			peer,
			self.config.announce_kind,
			file_name,
			metadata.len(),
			path.to_path_buf(),
			checksum,
			file,
		));
		self.registry.insert(Arc::clone(&transfer));

		info!(
			transfer_id = %transfer.id(),
			%peer,
			size = transfer.file_size(),
			"registered outgoing transfer"
		);

		Ok(transfer)
	}

	/// Announce a pending outgoing transfer to its peer, after which it is `Active` and waits for
	/// the peer to pull chunks
	pub fn start_send(&self, transfer: &Arc<Transfer>) -> Result<()> {
		let id = transfer.id();
		expect_direction(transfer, TransferDirection::Outgoing)?;

		let file_handle = {
			let mut inner = transfer.write();
			inner.expect_state(id, TransferState::Pending)?;

			match self.transport.initiate(
				transfer.peer(),
				transfer.kind(),
				transfer.file_size(),
				id,
				transfer.file_name(),
			) {
				Ok(file_handle) => {
					inner.file_handle = Some(file_handle);
					inner.set_state(id, TransferState::Active);
					file_handle
				}
				Err(e) => {
					inner.fail(id, format!("announce failed: {e}"));
					return Err(e.into());
				}
			}
		};

		self.route_outgoing(transfer, (transfer.peer(), file_handle));

		info!(
			transfer_id = %id,
			peer = %transfer.peer(),
			%file_handle,
			"announced outgoing transfer"
		);

		Ok(())
	}

	/// Route pull requests for `key` to an announced transfer. The route is taken after the
	/// transfer lock is released, so a transfer finished meanwhile gets its route dropped again.
	fn route_outgoing(&self, transfer: &Arc<Transfer>, key: (PeerId, FileHandle)) {
		if let Some(previous) = self.registry.route(key, Arc::clone(transfer)) {
			self.supersede(&previous, key);
		}

		if transfer.is_complete() {
			self.registry.unroute(key, transfer);
		}
	}

	/// Accept a pending incoming transfer, writing it to `save_dir` under its announced name.
	///
	/// The announced name must already be a bare file name, see
	/// [`sanitize_file_name`](crate::sanitize_file_name).
	pub fn accept_incoming(&self, id: TransferId, save_dir: impl AsRef<Path>) -> Result<()> {
		let transfer = self.lookup(id)?;
		expect_direction(&transfer, TransferDirection::Incoming)?;

		let notification = {
			let mut inner = transfer.write();
			inner.expect_state(id, TransferState::Pending)?;
			self.open_incoming(&transfer, &mut inner, save_dir.as_ref())?;

			info!(transfer_id = %id, peer = %transfer.peer(), "accepted incoming transfer");

			// Nothing will ever arrive for an empty file
			if transfer.file_size() == 0 {
				self.finalize_incoming(&transfer, &mut inner);
			}
			Notification::capture(&transfer, &inner, false)
		};

		self.deliver(&transfer, notification);

		Ok(())
	}

	fn open_incoming(
		&self,
		transfer: &Transfer,
		inner: &mut TransferInner,
		save_dir: &Path,
	) -> Result<()> {
		let id = transfer.id();
		let file_name = sanitize_file_name(transfer.file_name())?;
		let destination = save_dir.join(file_name);

		let file = open_destination(&destination).map_err(|e| {
			if e.kind() == io::ErrorKind::AlreadyExists {
				Error::DestinationExists(destination.as_path().into())
			} else {
				FileIOError::with_context(&destination, e, "failed to create destination file")
					.into()
			}
		})?;

		if let Some(file_handle) = inner.file_handle {
			if let Err(e) = self
				.transport
				.control(transfer.peer(), file_handle, ControlSignal::Resume)
			{
				drop(file);
				report_error(
					"removing destination of unaccepted transfer",
					fs::remove_file(&destination).map_err(FileIOError::mapper(
						&destination,
						"failed to remove destination file",
					)),
				);
				return Err(e.into());
			}
		}

		inner.file = Some(file);
		inner.file_path = Some(destination);
		inner.set_state(id, TransferState::Active);

		Ok(())
	}

	pub fn pause_transfer(&self, id: TransferId) -> Result<()> {
		self.signal_and_move(
			id,
			TransferState::Active,
			ControlSignal::Pause,
			TransferState::Paused,
		)
	}

	pub fn resume_transfer(&self, id: TransferId) -> Result<()> {
		self.signal_and_move(
			id,
			TransferState::Paused,
			ControlSignal::Resume,
			TransferState::Active,
		)
	}

	fn signal_and_move(
		&self,
		id: TransferId,
		from: TransferState,
		signal: ControlSignal,
		to: TransferState,
	) -> Result<()> {
		let transfer = self.lookup(id)?;
		let mut inner = transfer.write();
		inner.expect_state(id, from)?;

		if let Some(file_handle) = inner.file_handle {
			self.transport.control(transfer.peer(), file_handle, signal)?;
		}

		inner.set_state(id, to);
		info!(transfer_id = %id, %signal, "transfer {to}");

		Ok(())
	}

	/// Cancel any unfinished transfer.
	///
	/// The remote peer is told on a best-effort basis, the local side is cancelled regardless.
	/// A partially received file is deleted.
	pub fn cancel_transfer(&self, id: TransferId) -> Result<()> {
		let transfer = self.lookup(id)?;

		let file_handle = {
			let mut inner = transfer.write();
			if inner.state.is_terminal() {
				return Err(Error::InvalidState {
					id,
					expected: "unfinished",
					actual: inner.state,
				});
			}

			if let Some(file_handle) = inner.file_handle {
				if let Err(e) =
					self.transport
						.control(transfer.peer(), file_handle, ControlSignal::Cancel)
				{
					warn!(transfer_id = %id, "failed to signal cancellation to peer: {e}");
				}
			}

			inner.file = None;

			let partial = transfer.direction() == TransferDirection::Incoming
				&& inner.bytes_transferred < transfer.file_size();
			if partial {
				if let Some(path) = &inner.file_path {
					match fs::remove_file(path) {
						Ok(()) => debug!(transfer_id = %id, "removed partial file"),
						Err(e) if e.kind() == io::ErrorKind::NotFound => {}
						Err(e) => report_error::<FileIOError>(
							"removing partial file of cancelled transfer",
							Err(FileIOError::new(path, e)),
						),
					}
				}
			}

			inner.set_state(id, TransferState::Cancelled);
			inner.file_handle
		};

		if let Some(file_handle) = file_handle {
			self.registry.unroute((transfer.peer(), file_handle), &transfer);
		}

		info!(transfer_id = %id, "transfer cancelled");

		Ok(())
	}

	#[must_use]
	pub fn get_transfer(&self, id: TransferId) -> Option<Arc<Transfer>> {
		self.registry.get(id)
	}

	/// Transfers that are `Active` or `Paused`
	#[must_use]
	pub fn get_active_transfers(&self) -> Vec<Arc<Transfer>> {
		let mut transfers = self.registry.all();
		transfers.retain(|transfer| {
			matches!(
				transfer.state(),
				TransferState::Active | TransferState::Paused
			)
		});

		transfers
	}

	#[must_use]
	pub fn get_transfers_by_peer(&self, peer: PeerId) -> Vec<Arc<Transfer>> {
		self.registry.by_peer(peer)
	}

	pub fn set_progress_observer(
		&self,
		id: TransferId,
		observer: impl ProgressObserver + 'static,
	) -> Result<()> {
		self.lookup(id)?.write().progress_observer = Some(Arc::new(observer));
		Ok(())
	}

	pub fn set_completion_observer(
		&self,
		id: TransferId,
		observer: impl CompletionObserver + 'static,
	) -> Result<()> {
		self.lookup(id)?.write().completion_observer = Some(Arc::new(observer));
		Ok(())
	}

	/// Digest an incoming file is expected to have, checked once it completes
	pub fn set_expected_checksum(&self, id: TransferId, checksum: impl Into<String>) -> Result<()> {
		let transfer = self.lookup(id)?;
		expect_direction(&transfer, TransferDirection::Incoming)?;

		let mut inner = transfer.write();
		if inner.state.is_terminal() {
			return Err(Error::InvalidState {
				id,
				expected: "unfinished",
				actual: inner.state,
			});
		}
		inner.expected_checksum = Some(checksum.into().to_ascii_lowercase());

		Ok(())
	}

	pub fn set_max_file_size(&self, size: u64) {
		self.max_file_size.store(size, Ordering::Relaxed);
	}

	#[must_use]
	pub fn max_file_size(&self) -> u64 {
		self.max_file_size.load(Ordering::Relaxed)
	}

	/// Drop every finished transfer from the registry, returning how many were removed
	pub fn remove_finished(&self) -> usize {
		let finished = self
			.registry
			.all()
			.into_iter()
			.filter(|transfer| transfer.is_complete())
			.map(|transfer| transfer.id())
			.collect::<Vec<_>>();

		self.registry.remove(&finished)
	}

	pub(crate) fn lookup(&self, id: TransferId) -> Result<Arc<Transfer>> {
		self.registry.get(id).ok_or(Error::NotFound(id))
	}

	/// A live transfer lost its route to a newer one with the same handle, it can never receive
	/// events again
	pub(crate) fn supersede(&self, previous: &Arc<Transfer>, key: RouteKey) {
		let (peer, file_handle) = key;

		let notification = {
			let mut inner = previous.write();
			if inner.state.is_terminal() {
				return;
			}

			warn!(
				transfer_id = %previous.id(),
				%peer,
				%file_handle,
				"file handle reused while transfer was still live"
			);
			inner.fail(previous.id(), "superseded by new announce");
			Notification::capture(previous, &inner, false)
		};

		self.deliver(previous, notification);
	}
}

fn expect_direction(transfer: &Transfer, expected: TransferDirection) -> Result<()> {
	if transfer.direction() == expected {
		Ok(())
	} else {
		Err(Error::WrongDirection {
			id: transfer.id(),
			expected,
		})
	}
}

/// Never reuses an existing file, the name comes from the remote peer
fn open_destination(path: &Path) -> io::Result<File> {
	let mut options = OpenOptions::new();
	options.write(true).create_new(true);

	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;
		options.mode(0o600);
	}

	options.open(path)
}
