//! Session configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! reconcile_interval_ms = 16
//! snapshot_policy = "retain"
//!
//! [pool]
//! initial_slots = 256
//! max_slots = 1048576
//! max_pooled = 8
//!
//! [outbound]
//! capacity = 64
//! overflow = "drop-newest"
//!
//! [inbound]
//! max_frame_bytes = 1048576
//! ```

use std::path::Path;
use std::time::Duration;

use keyhole_dom::PoolLimits;
use keyhole_rpc::protocol::DEFAULT_MAX_FRAME_BYTES;
use keyhole_worker::MailboxPolicy;
use serde::Deserialize;

use crate::error::{LiveError, Result};

/// Which snapshot serves as "before" in a reconcile cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotPolicy {
	/// Keep the previous cycle's "after" as the next "before".
	#[default]
	Retain,
	/// Capture a fresh "before" at invalidation and drop it after the diff.
	Recapture,
}

/// What the outbound queue does when full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
	/// Discard the frame being enqueued.
	#[default]
	DropNewest,
	/// Wait for the writer to make room.
	Backpressure,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
	#[serde(default = "default_initial_slots")]
	pub initial_slots: usize,
	#[serde(default = "default_max_slots")]
	pub max_slots: usize,
	#[serde(default = "default_max_pooled")]
	pub max_pooled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundConfig {
	#[serde(default = "default_outbound_capacity")]
	pub capacity: usize,
	#[serde(default)]
	pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundConfig {
	#[serde(default = "default_max_frame_bytes")]
	pub max_frame_bytes: usize,
}

/// Tunables of one session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiveConfig {
	/// Minimum time between two reconciliations.
	#[serde(default = "default_reconcile_interval_ms")]
	pub reconcile_interval_ms: u64,
	#[serde(default)]
	pub snapshot_policy: SnapshotPolicy,
	#[serde(default)]
	pub pool: PoolConfig,
	#[serde(default)]
	pub outbound: OutboundConfig,
	#[serde(default)]
	pub inbound: InboundConfig,
}

fn default_reconcile_interval_ms() -> u64 {
	16
}

fn default_initial_slots() -> usize {
	PoolLimits::default().initial_slots
}

fn default_max_slots() -> usize {
	PoolLimits::default().max_slots
}

fn default_max_pooled() -> usize {
	PoolLimits::default().max_pooled
}

fn default_outbound_capacity() -> usize {
	64
}

fn default_max_frame_bytes() -> usize {
	DEFAULT_MAX_FRAME_BYTES
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			initial_slots: default_initial_slots(),
			max_slots: default_max_slots(),
			max_pooled: default_max_pooled(),
		}
	}
}

impl Default for OutboundConfig {
	fn default() -> Self {
		Self {
			capacity: default_outbound_capacity(),
			overflow: OverflowPolicy::default(),
		}
	}
}

impl Default for InboundConfig {
	fn default() -> Self {
		Self {
			max_frame_bytes: default_max_frame_bytes(),
		}
	}
}

impl Default for LiveConfig {
	fn default() -> Self {
		Self {
			reconcile_interval_ms: default_reconcile_interval_ms(),
			snapshot_policy: SnapshotPolicy::default(),
			pool: PoolConfig::default(),
			outbound: OutboundConfig::default(),
			inbound: InboundConfig::default(),
		}
	}
}

impl LiveConfig {
	/// Parses and validates TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| LiveError::ConfigIo {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&text)?;
		tracing::debug!(path = %path.display(), "live.config.loaded");
		Ok(config)
	}

	/// Rejects values no session can run with.
	pub fn validate(&self) -> Result<()> {
		if self.outbound.capacity == 0 {
			return Err(LiveError::Config("outbound.capacity must be at least 1".into()));
		}
		if self.pool.max_slots < 2 {
			return Err(LiveError::Config("pool.max_slots must be at least 2".into()));
		}
		if self.pool.max_slots > u32::MAX as usize {
			return Err(LiveError::Config(format!("pool.max_slots must not exceed {}", u32::MAX)));
		}
		if self.pool.initial_slots > self.pool.max_slots {
			return Err(LiveError::Config(format!(
				"pool.initial_slots ({}) exceeds pool.max_slots ({})",
				self.pool.initial_slots, self.pool.max_slots
			)));
		}
		if self.inbound.max_frame_bytes == 0 {
			return Err(LiveError::Config("inbound.max_frame_bytes must be at least 1".into()));
		}
		Ok(())
	}

	pub fn reconcile_interval(&self) -> Duration {
		Duration::from_millis(self.reconcile_interval_ms)
	}

	pub fn pool_limits(&self) -> PoolLimits {
		PoolLimits {
			initial_slots: self.pool.initial_slots,
			max_slots: self.pool.max_slots,
			max_pooled: self.pool.max_pooled,
		}
	}

	pub fn mailbox_policy(&self) -> MailboxPolicy {
		match self.outbound.overflow {
			OverflowPolicy::DropNewest => MailboxPolicy::DropNewest,
			OverflowPolicy::Backpressure => MailboxPolicy::Backpressure,
		}
	}
}
