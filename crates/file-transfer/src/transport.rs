//! Boundary to the peer messaging layer.
//!
//! The transport owns the wire: it announces files to friends, moves chunks and carries control
//! signals. Everything it learns from the remote side comes back to us as [`TransportEvent`]s
//! sent through the [`EventSender`] handed to [`Transport::subscribe`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{dispatcher::EventSender, transfer::TransferId};

/// Friend handle as assigned by the messaging layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Transport assigned number correlating events to one announced file. Only unique per peer and
/// only while the file is in flight, transports recycle them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileHandle(pub u32);

impl fmt::Display for FileHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
	#[default]
	Data,
	Avatar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlSignal {
	Pause,
	Resume,
	Cancel,
}

impl fmt::Display for ControlSignal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Pause => write!(f, "pause"),
			Self::Resume => write!(f, "resume"),
			Self::Cancel => write!(f, "cancel"),
		}
	}
}

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("peer <id='{0}'> is not connected")]
	FriendNotConnected(PeerId),
	#[error("unknown transport file <peer='{peer}', handle='{file_handle}'>")]
	NotFound {
		peer: PeerId,
		file_handle: FileHandle,
	},
	#[error("transport send queue is full")]
	SendQueueFull,
	#[error("transport error: {0}")]
	Other(String),
}

/// Callbacks from the transport, delivered as messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// A friend offers us a file
	Announce {
		peer: PeerId,
		file_handle: FileHandle,
		kind: FileKind,
		size: u64,
		name: String,
	},
	/// A friend pushed a chunk of a file we accepted
	Chunk {
		peer: PeerId,
		file_handle: FileHandle,
		position: u64,
		data: Vec<u8>,
	},
	/// A friend asks for a chunk of a file we are sending, `length == 0` means it has everything
	PullRequest {
		peer: PeerId,
		file_handle: FileHandle,
		position: u64,
		length: usize,
	},
}

impl TransportEvent {
	#[must_use]
	pub const fn route_key(&self) -> (PeerId, FileHandle) {
		match self {
			Self::Announce {
				peer, file_handle, ..
			}
			| Self::Chunk {
				peer, file_handle, ..
			}
			| Self::PullRequest {
				peer, file_handle, ..
			} => (*peer, *file_handle),
		}
	}
}

/// Peer messaging layer consumed by [`TransferManager`](crate::TransferManager).
///
/// Implementations are called from application threads and from the event dispatcher, and may
/// block on their own I/O.
pub trait Transport: Send + Sync {
	/// Announce an outgoing file to `peer`, returning the handle later events will carry
	fn initiate(
		&self,
		peer: PeerId,
		kind: FileKind,
		size: u64,
		file_id: TransferId,
		name: &str,
	) -> Result<FileHandle, TransportError>;

	fn push_chunk(
		&self,
		peer: PeerId,
		file_handle: FileHandle,
		position: u64,
		data: &[u8],
	) -> Result<(), TransportError>;

	fn control(
		&self,
		peer: PeerId,
		file_handle: FileHandle,
		signal: ControlSignal,
	) -> Result<(), TransportError>;

	/// Receive the sink for announce, chunk and pull request events
	fn subscribe(&self, events: EventSender);
}

/// Accepts everything and hands out handle 1, for unit tests driving a manager directly
#[cfg(test)]
pub(crate) struct NullTransport;

#[cfg(test)]
impl Transport for NullTransport {
	fn initiate(
		&self,
		_peer: PeerId,
		_kind: FileKind,
		_size: u64,
		_file_id: TransferId,
		_name: &str,
	) -> Result<FileHandle, TransportError> {
		Ok(FileHandle(1))
	}

	fn push_chunk(
		&self,
		_peer: PeerId,
		_file_handle: FileHandle,
		_position: u64,
		_data: &[u8],
	) -> Result<(), TransportError> {
		Ok(())
	}

	fn control(
		&self,
		_peer: PeerId,
		_file_handle: FileHandle,
		_signal: ControlSignal,
	) -> Result<(), TransportError> {
		Ok(())
	}

	fn subscribe(&self, _events: EventSender) {}
}
