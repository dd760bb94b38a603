use std::path::PathBuf;

use keyhole_dom::DomError;
use thiserror::Error;

/// Errors surfaced by sessions, schedulers and configuration loading.
#[derive(Debug, Error)]
pub enum LiveError {
	/// Rendering a snapshot failed.
	#[error(transparent)]
	Dom(#[from] DomError),

	/// Wire IO or framing failed.
	#[error(transparent)]
	Rpc(#[from] keyhole_rpc::Error),

	/// A configuration value is out of range.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Configuration text is not valid TOML for [`crate::LiveConfig`].
	#[error("failed to parse configuration: {0}")]
	ConfigParse(#[from] toml::de::Error),

	/// Configuration file could not be read.
	#[error("failed to read configuration {}: {error}", path.display())]
	ConfigIo {
		/// Path that was read.
		path: PathBuf,
		/// Underlying error.
		#[source]
		error: std::io::Error,
	},

	/// The outbound mailbox is closed.
	#[error("outbound queue closed")]
	OutboundClosed,

	/// A mutation or response could not be serialized.
	#[error("failed to encode message: {0}")]
	Encode(#[from] serde_json::Error),
}

/// Result alias for this crate.
pub type Result<T, E = LiveError> = std::result::Result<T, E>;
