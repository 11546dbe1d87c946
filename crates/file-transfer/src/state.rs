use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a single transfer
///
/// ```text
/// Pending -> Active -> Completed
///              ^  |
///              |  v
///             Paused
/// ```
/// Any non terminal state may also move to `Cancelled` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferState {
	/// Created, waiting to be announced (outgoing) or accepted (incoming)
	Pending,
	/// Chunks are flowing
	Active,
	/// Suspended by an explicit request, events are ignored
	Paused,
	Completed,
	Failed,
	Cancelled,
}

impl TransferState {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
	}

	#[must_use]
	pub const fn can_transition_to(self, next: Self) -> bool {
		match (self, next) {
			(Self::Pending | Self::Paused, Self::Active)
			| (Self::Active, Self::Paused | Self::Completed) => true,
			(from, Self::Cancelled | Self::Failed) => !from.is_terminal(),
			_ => false,
		}
	}

	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Active => "active",
			Self::Paused => "paused",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for TransferState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
