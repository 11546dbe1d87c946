use std::{
	fmt::{self, Display},
	io,
	path::Path,
};

use thiserror::Error;
use tracing::error;

/// Log the error of a best-effort operation whose result nobody waits on
pub fn report_error<E: Display>(context: &str, res: Result<(), E>) {
	if let Err(e) = res {
		error!(%context, "{e:#}");
	}
}

/// Filesystem error tagged with the path that produced it
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
	pub context: Option<&'static str>,
}

impl Display for FileIOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.context {
			Some(context) => write!(f, "{context}: {}", self.source)?,
			None => write!(f, "file I/O error: {}", self.source)?,
		}

		write!(f, "; path: '{}'", self.path.display())
	}
}

impl FileIOError {
	pub fn new(path: impl AsRef<Path>, source: io::Error) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			context: None,
		}
	}

	pub fn with_context(path: impl AsRef<Path>, source: io::Error, context: &'static str) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			context: Some(context),
		}
	}

	/// Shortcut to build a `map_err` adapter for a fixed path and context
	pub fn mapper<'a>(
		path: &'a Path,
		context: &'static str,
	) -> impl FnOnce(io::Error) -> Self + 'a {
		move |source| Self::with_context(path, source, context)
	}

	#[must_use]
	pub fn kind(&self) -> io::ErrorKind {
		self.source.kind()
	}
}

/// Error for paths that contain non-UTF8 characters
#[derive(Error, Debug)]
#[error("received a non UTF-8 path: <path='{0:?}'>")]
pub struct NonUtf8PathError(pub Box<Path>);
