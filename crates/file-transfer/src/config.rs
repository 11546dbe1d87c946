use std::{fs, num::NonZeroUsize, path::Path, thread};

use parley_utils::error::FileIOError;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{error::ConfigError, integrity::IntegrityPolicy, transport::FileKind};

/// 4 GiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

/// Tunables of a [`TransferManager`](crate::TransferManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
	/// Largest file `send_file` accepts, adjustable at runtime
	pub max_file_size: u64,
	/// Event dispatcher threads, events of one transfer always land on the same one
	pub dispatcher_workers: usize,
	/// Bound of each dispatcher queue, a full queue blocks the transport thread
	pub event_queue_capacity: usize,
	pub integrity: IntegrityPolicy,
	/// Kind announced for files sent with `send_file`
	pub announce_kind: FileKind,
}

impl Default for TransferConfig {
	fn default() -> Self {
		Self {
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			dispatcher_workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
			event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
			integrity: IntegrityPolicy::default(),
			announce_kind: FileKind::default(),
		}
	}
}

impl TransferConfig {
	/// Load from a JSON file, missing fields take their default value
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let json = fs::read_to_string(path)
			.map_err(FileIOError::mapper(path, "failed to read transfer config"))?;

		let config = serde_json::from_str(&json)?;
		info!(path = %path.display(), "loaded transfer config");

		Ok(config)
	}

	pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
		let path = path.as_ref();
		let json = serde_json::to_string_pretty(self)?;

		fs::write(path, json)
			.map_err(FileIOError::mapper(path, "failed to write transfer config"))?;
		info!(path = %path.display(), "saved transfer config");

		Ok(())
	}
}
