#![allow(dead_code)]

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use parley_file_transfer::{
	FileHandle, PeerId, Transfer, TransferConfig, TransferManager, TransportEvent,
};

pub mod transport;

use transport::MockTransport;

pub const HELLO: &[u8] = b"Hello, World!";
pub const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

pub fn manager() -> (Arc<TransferManager>, Arc<MockTransport>) {
	manager_with(TransferConfig::default())
}

pub fn manager_with(config: TransferConfig) -> (Arc<TransferManager>, Arc<MockTransport>) {
	let transport = Arc::new(MockTransport::default());
	let manager = Arc::new(TransferManager::with_config(
		Arc::clone(&transport) as _,
		config,
	));

	(manager, transport)
}

pub fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
	let path = dir.path().join(name);
	fs::write(&path, contents).unwrap();
	path
}

/// Register and announce a file, leaving the transfer `Active`
pub fn started_send(manager: &TransferManager, peer: PeerId, path: &Path) -> Arc<Transfer> {
	let transfer = manager.send_file(peer, path).unwrap();
	manager.start_send(&transfer).unwrap();
	transfer
}

pub fn random_bytes(len: usize) -> Vec<u8> {
	use rand::RngCore;

	let mut data = vec![0; len];
	rand::thread_rng().fill_bytes(&mut data);
	data
}

/// Split `len` bytes in chunk sized `(position, length)` pieces
pub fn pieces(len: usize, chunk: usize) -> Vec<(u64, usize)> {
	(0..len)
		.step_by(chunk)
		.map(|start| (start as u64, chunk.min(len - start)))
		.collect()
}

pub fn chunk_event(
	peer: PeerId,
	file_handle: FileHandle,
	position: u64,
	data: &[u8],
) -> TransportEvent {
	TransportEvent::Chunk {
		peer,
		file_handle,
		position,
		data: data.to_vec(),
	}
}
