use std::{
	fs::File,
	io::{self, Read},
	path::Path,
};

use parley_utils::error::FileIOError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const CHECKSUM_BLOCK_SIZE: usize = 64 * 1024;

/// What to do when a completed incoming file does not match its expected checksum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
	/// Keep the transfer `Completed`, store the verdict and log the mismatch
	#[default]
	Record,
	/// Fail the transfer on mismatch
	Enforce,
}

/// Hex encoded SHA-256 of everything `reader` yields
pub fn checksum_reader(mut reader: impl Read) -> io::Result<String> {
	let mut hasher = Sha256::new();
	let mut buf = vec![0; CHECKSUM_BLOCK_SIZE];

	loop {
		match reader.read(&mut buf) {
			Ok(0) => break,
			Ok(read) => hasher.update(&buf[..read]),
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		}
	}

	Ok(hex::encode(hasher.finalize()))
}

/// Hex encoded SHA-256 of a whole file, streamed so memory use does not grow with the file
pub fn checksum_file(path: impl AsRef<Path>) -> Result<String, FileIOError> {
	let path = path.as_ref();

	File::open(path)
		.and_then(checksum_reader)
		.map_err(FileIOError::mapper(path, "failed to compute file checksum"))
}
