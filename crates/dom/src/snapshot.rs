//! Snapshot lifetime: pooled arenas populated by one render pass.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::compose::{SnapshotWriter, View, Walker};
use crate::error::{DomError, Result};
use crate::key::KeyInterner;
use crate::slot::{ChildRange, Slot};

/// Sizing of a [`SlotPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
	/// Capacity of buffers allocated before any render raised the high-water mark.
	pub initial_slots: usize,
	/// Hard ceiling on a single arena; exceeding it fails that render.
	pub max_slots: usize,
	/// Number of idle buffers kept for reuse.
	pub max_pooled: usize,
}

impl Default for PoolLimits {
	fn default() -> Self {
		Self {
			initial_slots: 256,
			max_slots: 1 << 20,
			max_pooled: 8,
		}
	}
}

/// Free list of arena buffers shared by every session of a process.
///
/// New buffers are allocated at the largest capacity any returned buffer
/// reached, so steady-state renders never grow.
pub struct SlotPool {
	limits: PoolLimits,
	free: Mutex<Vec<Vec<Slot>>>,
	high_water: AtomicUsize,
}

impl SlotPool {
	pub fn new(limits: PoolLimits) -> Self {
		Self {
			limits,
			free: Mutex::new(Vec::new()),
			high_water: AtomicUsize::new(limits.initial_slots.min(limits.max_slots)),
		}
	}

	pub fn limits(&self) -> PoolLimits {
		self.limits
	}

	pub(crate) fn take(&self) -> Vec<Slot> {
		if let Some(buffer) = self.free.lock().pop() {
			return buffer;
		}
		let capacity = self.high_water.load(Ordering::Relaxed);
		tracing::trace!(capacity, "dom.pool.allocate");
		Vec::with_capacity(capacity)
	}

	pub(crate) fn give_back(&self, mut buffer: Vec<Slot>) {
		self.high_water.fetch_max(buffer.capacity().min(self.limits.max_slots), Ordering::Relaxed);
		buffer.clear();
		let mut free = self.free.lock();
		if free.len() < self.limits.max_pooled {
			free.push(buffer);
		}
	}

	/// Idle buffers currently held.
	pub fn pooled(&self) -> usize {
		self.free.lock().len()
	}

	/// Capacity handed to newly allocated buffers.
	pub fn high_water(&self) -> usize {
		self.high_water.load(Ordering::Relaxed)
	}
}

impl Default for SlotPool {
	fn default() -> Self {
		Self::new(PoolLimits::default())
	}
}

impl fmt::Debug for SlotPool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SlotPool")
			.field("limits", &self.limits)
			.field("pooled", &self.pooled())
			.field("high_water", &self.high_water())
			.finish()
	}
}

/// One rendered tree. Owns its arena and returns it to the pool on drop.
pub struct Snapshot {
	slots: Vec<Slot>,
	root: ChildRange,
	populated: bool,
	pool: Arc<SlotPool>,
}

impl Snapshot {
	/// Meaningful arena length, header included. Zero before population.
	pub fn len(&self) -> usize {
		self.slots.first().and_then(Slot::header_len).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_populated(&self) -> bool {
		self.populated
	}

	/// The top-level template range.
	pub fn root(&self) -> ChildRange {
		self.root
	}

	/// Every meaningful slot, header first.
	pub fn slots(&self) -> &[Slot] {
		&self.slots[..self.len().min(self.slots.len())]
	}

	/// Slots of one range. Empty for ranges outside the arena.
	pub fn range(&self, range: ChildRange) -> &[Slot] {
		self.slots().get(range.indices()).unwrap_or(&[])
	}

	pub fn slot(&self, index: usize) -> Option<&Slot> {
		self.slots().get(index)
	}
}

impl Drop for Snapshot {
	fn drop(&mut self) {
		self.pool.give_back(std::mem::take(&mut self.slots));
	}
}

impl fmt::Debug for Snapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Snapshot")
			.field("len", &self.len())
			.field("root", &self.root)
			.field("populated", &self.populated)
			.finish()
	}
}

/// Acquires, populates and releases snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
	pool: Arc<SlotPool>,
	interner: Arc<KeyInterner>,
}

impl SnapshotManager {
	pub fn new(pool: Arc<SlotPool>, interner: Arc<KeyInterner>) -> Self {
		Self { pool, interner }
	}

	pub fn pool(&self) -> &Arc<SlotPool> {
		&self.pool
	}

	pub fn interner(&self) -> &Arc<KeyInterner> {
		&self.interner
	}

	/// An empty snapshot backed by a pooled buffer.
	pub fn acquire(&self) -> Snapshot {
		Snapshot {
			slots: self.pool.take(),
			root: ChildRange::default(),
			populated: false,
			pool: Arc::clone(&self.pool),
		}
	}

	/// Renders `view` into `snapshot`. A snapshot is populated exactly once.
	///
	/// # Errors
	///
	/// [`DomError::AlreadyPopulated`] on a second call, the first composition
	/// error of the render, or [`DomError::CapacityExceeded`] past the ceiling.
	/// A failed render leaves the snapshot empty.
	pub fn populate(&self, snapshot: &mut Snapshot, view: &dyn View) -> Result<()> {
		if snapshot.populated {
			return Err(DomError::AlreadyPopulated);
		}
		let writer = SnapshotWriter::new(&mut snapshot.slots, self.pool.limits.max_slots);
		let (writer, result) = Walker::new(writer, &self.interner).walk(view);
		match result {
			Ok(root) => {
				let len = writer.finish();
				snapshot.root = root;
				snapshot.populated = true;
				tracing::trace!(len, "dom.snapshot.populated");
				Ok(())
			}
			Err(err) => {
				drop(writer);
				snapshot.slots.clear();
				Err(err)
			}
		}
	}

	/// Acquires and populates in one step.
	pub fn capture(&self, view: &dyn View) -> Result<Snapshot> {
		let mut snapshot = self.acquire();
		self.populate(&mut snapshot, view)?;
		Ok(snapshot)
	}

	/// Returns a snapshot's buffer to the pool.
	pub fn release(&self, snapshot: Snapshot) {
		drop(snapshot);
	}
}
