use std::path::Path;

use parley_utils::error::{FileIOError, NonUtf8PathError};
use thiserror::Error;

use super::{
	state::TransferState,
	transfer::{TransferDirection, TransferId},
	transport::TransportError,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("transfer not found: {0}")]
	NotFound(TransferId),
	#[error("not a regular file: <path='{}'>", .0.display())]
	NotAFile(Box<Path>),
	#[error("file is too large: {size} bytes, limit is {max} bytes")]
	FileTooLarge { size: u64, max: u64 },
	#[error("unsafe file name: {0:?}")]
	UnsafeFileName(String),
	#[error("destination already exists: <path='{}'>", .0.display())]
	DestinationExists(Box<Path>),
	#[error("transfer <id='{id}'> is {actual}, expected {expected}")]
	InvalidState {
		id: TransferId,
		expected: &'static str,
		actual: TransferState,
	},
	#[error("transfer <id='{id}'> is not {expected}")]
	WrongDirection {
		id: TransferId,
		expected: TransferDirection,
	},
	#[error("checksum mismatch: expected {expected}, got {actual}")]
	ChecksumMismatch { expected: String, actual: String },

	#[error("event dispatcher is closed")]
	DispatcherClosed,
	#[error("event queue is full")]
	EventQueueFull,
	#[error("failed to spawn event dispatcher worker: {0}")]
	DispatcherSpawn(#[source] std::io::Error),

	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("invalid transfer config: {0}")]
	Parse(#[from] serde_json::Error),
}
