//! Outbound frames.

use bytes::Bytes;

/// One outbound wire message, possibly spread over several buffer segments.
///
/// The writer emits a single header for the summed length and then every
/// segment in order, so a frame never has to be copied into one contiguous
/// buffer before it hits the socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
	segments: Vec<Bytes>,
}

impl Frame {
	/// Creates a frame from one contiguous buffer.
	pub fn single(body: impl Into<Bytes>) -> Self {
		Self { segments: vec![body.into()] }
	}

	/// Creates a frame from ordered segments.
	pub fn from_segments(segments: Vec<Bytes>) -> Self {
		Self { segments }
	}

	/// Appends a segment.
	pub fn push(&mut self, segment: impl Into<Bytes>) {
		self.segments.push(segment.into());
	}

	/// Total body length in bytes.
	pub fn len(&self) -> usize {
		self.segments.iter().map(Bytes::len).sum()
	}

	/// Whether the body is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Ordered body segments.
	pub fn segments(&self) -> &[Bytes] {
		&self.segments
	}

	/// Copies all segments into one buffer.
	pub fn to_vec(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(self.len());
		for segment in &self.segments {
			out.extend_from_slice(segment);
		}
		out
	}
}
