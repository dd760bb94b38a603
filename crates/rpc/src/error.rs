//! Error types for the wire layer.

use std::io;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible wire errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The frame body is not a valid JSON-RPC message.
	#[error("deserialization failed: {0}")]
	Deserialize(#[from] serde_json::Error),
	/// The peer violated the framing rules for one frame.
	#[error("protocol error: {0}")]
	Protocol(String),
	/// A frame announced a body larger than the configured limit; its body was skipped.
	#[error("frame of {len} bytes exceeds limit of {limit} bytes")]
	FrameTooLarge {
		/// Announced body length.
		len: usize,
		/// Configured limit.
		limit: usize,
	},
	/// Input/output errors from the underlying stream.
	#[error("{0}")]
	Io(#[from] io::Error),
	/// The underlying stream reached EOF.
	#[error("the underlying stream reached EOF")]
	Eof,
}

impl Error {
	/// Whether the stream is still usable after this error.
	///
	/// Recoverable errors concern a single frame that has been fully consumed
	/// from the stream, so the reader can continue with the next one.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::Deserialize(_) | Self::Protocol(_) | Self::FrameTooLarge { .. })
	}
}
