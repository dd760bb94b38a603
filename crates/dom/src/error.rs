//! Errors raised while composing snapshots.

use thiserror::Error;

/// Errors that can occur while a view is written into a snapshot.
///
/// All of them except [`DomError::CapacityExceeded`] point at a renderer that
/// broke the literal/dynamic alternation contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
	/// Render output would grow the arena past its hard ceiling.
	#[error("render needs {needed} slots, above the ceiling of {ceiling}")]
	CapacityExceeded {
		/// Slots required.
		needed: usize,
		/// Configured ceiling.
		ceiling: usize,
	},

	/// A range must declare exactly one more literal than dynamic positions.
	#[error("range declares {literals} literals for {dynamics} dynamic positions")]
	UnbalancedRange {
		/// Declared literal count.
		literals: usize,
		/// Declared dynamic count.
		dynamics: usize,
	},

	/// A write landed on a position of the wrong parity.
	#[error("{what} written at position {position}")]
	Misplaced {
		/// Kind of write.
		what: &'static str,
		/// Position inside the current range.
		position: usize,
	},

	/// More writes than the range declared.
	#[error("write past the end of a {len}-slot range")]
	RangeOverflow {
		/// Declared range length.
		len: usize,
	},

	/// A range was closed before all of its slots were written.
	#[error("range closed after {written} of {len} slots")]
	UnfinishedRange {
		/// Slots written.
		written: usize,
		/// Declared range length.
		len: usize,
	},

	/// A nested, attribute or item body returned without beginning its range.
	#[error("nested body did not begin a range")]
	EmptyNested,

	/// A sub-range was started where no nested slot is waiting for one.
	#[error("sub-range started outside a nested slot")]
	StrayRange,

	/// Attribute ranges may only hold literals and scalar values.
	#[error("{0} is not allowed inside an attribute")]
	NotInAttribute(&'static str),

	/// The renderer never started the root range.
	#[error("renderer produced no root range")]
	EmptyRender,

	/// A snapshot is populated by exactly one render pass.
	#[error("snapshot was already populated")]
	AlreadyPopulated,
}

/// Result type for snapshot composition.
pub type Result<T, E = DomError> = std::result::Result<T, E>;
