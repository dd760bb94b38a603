//! Protocol abstraction for wire formats.

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::frame::Frame;
use crate::message::InboundMessage;
use crate::{Error, Result};

/// Default inbound body limit.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20;

const CONTENT_LENGTH: &str = "content-length";

/// Longest header line kept in memory; the rest of a longer line is discarded.
const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

/// Binding between a session loop and a concrete message format.
pub trait Protocol: Send + 'static {
	/// Decoded inbound message type.
	type Inbound: Send + 'static;

	/// Encoded outbound message type.
	type Outbound: Send + 'static;

	/// Error type for IO/codec/protocol violations in the loop.
	type LoopError: From<std::io::Error> + Send + 'static;

	/// Read a complete message from the input stream.
	fn read_message(
		&mut self,
		input: &mut (impl AsyncBufRead + Unpin + Send),
	) -> impl std::future::Future<Output = std::result::Result<Self::Inbound, Self::LoopError>> + Send;

	/// Write a message to the output stream.
	fn write_message(
		&mut self,
		output: &mut (impl AsyncWrite + Unpin + Send),
		msg: &Self::Outbound,
	) -> impl std::future::Future<Output = std::result::Result<(), Self::LoopError>> + Send;

	/// Returns true if the loop error represents a clean disconnect.
	fn is_disconnect(_err: &Self::LoopError) -> bool {
		false
	}

	/// Returns true if the loop may keep reading after this error.
	fn is_recoverable(_err: &Self::LoopError) -> bool {
		false
	}
}

/// JSON-RPC 2.0 over `Content-Length` framed byte streams.
///
/// Each frame is a header block (`Content-Length: N`, other headers ignored)
/// terminated by an empty line, followed by exactly `N` body bytes.
#[derive(Debug, Clone)]
pub struct JsonRpcProtocol {
	max_frame_bytes: usize,
}

impl JsonRpcProtocol {
	/// Creates a protocol instance with the given inbound body limit.
	#[must_use]
	pub const fn new(max_frame_bytes: usize) -> Self {
		Self { max_frame_bytes }
	}

	/// Inbound body limit.
	pub const fn max_frame_bytes(&self) -> usize {
		self.max_frame_bytes
	}

	/// Reads one raw frame body.
	///
	/// # Errors
	///
	/// - [`Error::Eof`] when the stream ends before a header starts.
	/// - [`Error::Protocol`] when the header block has no usable `Content-Length`.
	///   Header lines that are not UTF-8 or longer than 8 KiB count as malformed.
	/// - [`Error::FrameTooLarge`] when the body exceeds the limit; the body is skipped.
	/// - [`Error::Io`] on stream failure or truncation inside a frame.
	pub async fn read_frame(&self, input: &mut (impl AsyncBufRead + Unpin + Send)) -> Result<BytesMut> {
		let mut line = Vec::new();
		let mut content_len = None;
		let mut malformed = None;
		let mut first = true;

		loop {
			let (read, truncated) = read_header_line(input, &mut line).await?;
			if read == 0 {
				if first {
					return Err(Error::Eof);
				}
				return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
			}
			first = false;

			if truncated {
				malformed = Some(format!("header line exceeds {MAX_HEADER_LINE_BYTES} bytes"));
				continue;
			}
			let end = line.iter().rposition(|&b| b != b'\r' && b != b'\n').map_or(0, |last| last + 1);
			let Ok(header) = std::str::from_utf8(&line[..end]) else {
				malformed = Some("header line is not UTF-8".into());
				continue;
			};
			if header.is_empty() {
				break;
			}
			let Some((name, value)) = header.split_once(':') else {
				malformed = Some(format!("malformed header line {header:?}"));
				continue;
			};
			if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
				match value.trim().parse::<usize>() {
					Ok(len) => content_len = Some(len),
					Err(_) => malformed = Some(format!("invalid Content-Length {:?}", value.trim())),
				}
			}
		}

		let Some(len) = content_len else {
			return Err(Error::Protocol(malformed.unwrap_or_else(|| "missing Content-Length".into())));
		};

		if len > self.max_frame_bytes {
			let skipped = tokio::io::copy(&mut (&mut *input).take(len as u64), &mut tokio::io::sink()).await?;
			if skipped < len as u64 {
				return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
			}
			return Err(Error::FrameTooLarge {
				len,
				limit: self.max_frame_bytes,
			});
		}

		let mut body = BytesMut::zeroed(len);
		input.read_exact(&mut body).await?;
		if let Some(problem) = malformed {
			tracing::debug!(problem, "rpc.frame.ignored_header");
		}
		Ok(body)
	}

	/// Writes one frame: a single header for the summed segment length, then every segment.
	pub async fn write_frame(&self, output: &mut (impl AsyncWrite + Unpin + Send), frame: &Frame) -> Result<()> {
		let header = format!("Content-Length: {}\r\n\r\n", frame.len());
		output.write_all(header.as_bytes()).await?;
		for segment in frame.segments() {
			output.write_all(segment).await?;
		}
		output.flush().await?;
		tracing::trace!(bytes = frame.len(), segments = frame.segments().len(), "rpc.frame.written");
		Ok(())
	}
}

/// Reads one header line into `line`, keeping at most [`MAX_HEADER_LINE_BYTES`].
///
/// Returns the bytes consumed and whether the line was cut short. A cut line
/// is consumed up to and including its newline without buffering it.
async fn read_header_line(input: &mut (impl AsyncBufRead + Unpin + Send), line: &mut Vec<u8>) -> std::io::Result<(usize, bool)> {
	line.clear();
	let read = (&mut *input)
		.take(MAX_HEADER_LINE_BYTES as u64)
		.read_until(b'\n', line)
		.await?;
	if read < MAX_HEADER_LINE_BYTES || line.ends_with(b"\n") {
		return Ok((read, false));
	}

	let mut consumed = read;
	loop {
		let buf = input.fill_buf().await?;
		if buf.is_empty() {
			return Ok((consumed, true));
		}
		match buf.iter().position(|&b| b == b'\n') {
			Some(end) => {
				input.consume(end + 1);
				return Ok((consumed + end + 1, true));
			}
			None => {
				let len = buf.len();
				input.consume(len);
				consumed += len;
			}
		}
	}
}

impl Default for JsonRpcProtocol {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_FRAME_BYTES)
	}
}

impl Protocol for JsonRpcProtocol {
	type Inbound = InboundMessage;
	type Outbound = Frame;
	type LoopError = Error;

	async fn read_message(&mut self, input: &mut (impl AsyncBufRead + Unpin + Send)) -> Result<Self::Inbound> {
		let body = self.read_frame(input).await?;
		Ok(InboundMessage::from_slice(&body)?)
	}

	async fn write_message(&mut self, output: &mut (impl AsyncWrite + Unpin + Send), msg: &Self::Outbound) -> Result<()> {
		self.write_frame(output, msg).await
	}

	fn is_disconnect(err: &Self::LoopError) -> bool {
		match err {
			Error::Eof => true,
			Error::Io(io) => matches!(
				io.kind(),
				std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
			),
			_ => false,
		}
	}

	fn is_recoverable(err: &Self::LoopError) -> bool {
		err.is_recoverable()
	}
}
