//!
//! # File Transfer
//!
//! Orchestration layer for chunked, resumable file transfers between the local peer and its
//! friends. The crate sits on top of an opaque [`Transport`] that knows how to announce a file to
//! a friend, push a chunk of bytes and send control signals; everything above that is handled
//! here:
//! - A registry of every transfer, reachable by [`TransferId`] and by the `(peer, file handle)`
//!   pair the transport uses to correlate its events;
//! - The per transfer state machine (`Pending -> Active <-> Paused -> Completed | Failed |
//!   Cancelled`);
//! - Receiver driven flow control: the remote peer pulls chunks of outgoing files at its own pace;
//! - Whole file SHA-256 digests for outgoing files (on creation) and incoming files (on
//!   completion);
//! - A sharded event dispatcher so transport callbacks for different transfers are serviced in
//!   parallel while events of a single transfer keep their order.
//!
//! ## Basic example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parley_file_transfer::{
//! 	ControlSignal, FileHandle, FileKind, PeerId, Transport, TransportError, TransferId,
//! 	TransferManager, EventSender,
//! };
//!
//! struct Loopback;
//!
//! impl Transport for Loopback {
//! 	fn initiate(
//! 		&self,
//! 		_peer: PeerId,
//! 		_kind: FileKind,
//! 		_size: u64,
//! 		_file_id: TransferId,
//! 		_name: &str,
//! 	) -> Result<FileHandle, TransportError> {
//! 		Ok(FileHandle(0))
//! 	}
//!
//! 	fn push_chunk(
//! 		&self,
//! 		_peer: PeerId,
//! 		_file_handle: FileHandle,
//! 		_position: u64,
//! 		_data: &[u8],
//! 	) -> Result<(), TransportError> {
//! 		Ok(())
//! 	}
//!
//! 	fn control(
//! 		&self,
//! 		_peer: PeerId,
//! 		_file_handle: FileHandle,
//! 		_signal: ControlSignal,
//! 	) -> Result<(), TransportError> {
//! 		Ok(())
//! 	}
//!
//! 	fn subscribe(&self, _events: EventSender) {}
//! }
//!
//! let manager = Arc::new(TransferManager::new(Arc::new(Loopback)));
//! let dispatcher = manager.spawn_dispatcher().unwrap();
//!
//! let transfer = manager.send_file(PeerId(7), "notes.txt").unwrap();
//! manager.start_send(&transfer).unwrap();
//!
//! dispatcher.shutdown();
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod dispatcher;
mod error;
mod handlers;
mod integrity;
mod manager;
mod observer;
mod registry;
mod state;
mod transfer;
mod transport;
mod validation;

pub use config::TransferConfig;
pub use dispatcher::{EventDispatcher, EventSender};
pub use error::{ConfigError, Error, Result};
pub use integrity::{checksum_file, checksum_reader, IntegrityPolicy, CHECKSUM_BLOCK_SIZE};
pub use manager::TransferManager;
pub use observer::{ChannelObserver, CompletionObserver, ProgressObserver};
pub use state::TransferState;
pub use transfer::{Transfer, TransferDirection, TransferId, TransferSnapshot};
pub use transport::{
	ControlSignal, FileHandle, FileKind, PeerId, Transport, TransportError, TransportEvent,
};
pub use validation::sanitize_file_name;
