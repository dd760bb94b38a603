//! Renderer adapter: the [`Compose`] visitor and the walker behind it.
//!
//! A renderer describes its output as ranges that alternate fixed literals
//! (even positions) with dynamic writes (odd positions). The walker checks
//! that alternation, mints a key for every dynamic write and hands each
//! slot to a [`Target`]: the snapshot writer fills an arena, the handler
//! finder only looks for one key.

use smallvec::SmallVec;

use crate::error::{DomError, Result};
use crate::handler::EventHandler;
use crate::key::{Key, KeyCursor, KeyInterner};
use crate::scalar::Scalar;
use crate::slot::{ChildRange, Slot};

/// Shared empty literal for single-value attributes.
pub(crate) const EMPTY: &str = "";

/// A renderable UI tree.
///
/// `render` must describe the same literal skeleton for the same state;
/// branching into a different sub-template is what the diff reports as a
/// shape change.
pub trait View: Send + Sync {
	fn render(&self, out: &mut dyn Compose);
}

impl<F> View for F
where
	F: Fn(&mut dyn Compose) + Send + Sync,
{
	fn render(&self, out: &mut dyn Compose) {
		self(out)
	}
}

/// Write calls a renderer issues, in document order.
///
/// Every body passed to [`Compose::nested`], [`Compose::attribute`] or
/// [`Compose::each`] must start with exactly one [`Compose::begin_range`].
/// Misuse does not panic: the first error poisons the build and every
/// later call is ignored.
pub trait Compose {
	/// Opens a range of `literals` fixed and `dynamics` dynamic positions.
	/// `literals` must be `dynamics + 1`.
	fn begin_range(&mut self, literals: usize, dynamics: usize);

	fn literal(&mut self, text: &'static str);

	fn value(&mut self, value: Scalar, format: Option<&'static str>);

	/// Attribute whose value is composed by `body` from literals and values.
	fn attribute(&mut self, name: &'static str, body: &mut dyn FnMut(&mut dyn Compose));

	/// Attribute holding a single scalar.
	fn attribute_value(&mut self, name: &'static str, value: Scalar) {
		self.attribute(name, &mut |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal(EMPTY);
			out.value(value.clone(), None);
			out.literal(EMPTY);
		});
	}

	fn nested(&mut self, transition: Option<&'static str>, body: &mut dyn FnMut(&mut dyn Compose));

	/// `count` nested items; `body` renders item `i`.
	fn each(&mut self, count: usize, transition: Option<&'static str>, body: &mut dyn FnMut(usize, &mut dyn Compose));

	fn event(&mut self, name: &'static str, handler: EventHandler);
}

/// Receiver of walked slots.
pub(crate) trait Target {
	/// Reserves `len` contiguous slots and returns the first index.
	fn reserve(&mut self, len: usize) -> Result<usize>;

	fn put(&mut self, index: usize, slot: Slot);

	fn set_range(&mut self, index: usize, range: ChildRange);

	/// Whether the body under `key` needs to be walked at all.
	fn wants(&self, _key: &Key) -> bool {
		true
	}

	/// Stops the walk early once true.
	fn finished(&self) -> bool {
		false
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
	Template,
	Attribute,
	Items,
}

struct Frame {
	kind: FrameKind,
	start: usize,
	len: usize,
	written: usize,
	saved: KeyCursor,
}

/// Slot waiting for its body to begin a range. `slot` is `None` for the root.
struct Awaiting {
	slot: Option<usize>,
	key: Key,
	kind: FrameKind,
}

pub(crate) struct Walker<'i, T> {
	target: T,
	interner: &'i KeyInterner,
	cursor: KeyCursor,
	frames: SmallVec<[Frame; 8]>,
	awaiting: Option<Awaiting>,
	root: Option<ChildRange>,
	error: Option<DomError>,
}

impl<'i, T: Target> Walker<'i, T> {
	pub(crate) fn new(target: T, interner: &'i KeyInterner) -> Self {
		let root = interner.root().clone();
		Self {
			target,
			interner,
			cursor: KeyCursor::new(root.clone(), 0),
			frames: SmallVec::new(),
			awaiting: Some(Awaiting {
				slot: None,
				key: root,
				kind: FrameKind::Template,
			}),
			root: None,
			error: None,
		}
	}

	/// Runs `view` once and returns the target with the root range.
	pub(crate) fn walk(mut self, view: &dyn View) -> (T, Result<ChildRange>) {
		view.render(&mut self);
		let result = self.complete();
		(self.target, result)
	}

	fn complete(&mut self) -> Result<ChildRange> {
		if let Some(err) = self.error.take() {
			return Err(err);
		}
		if self.target.finished() {
			return self.root.ok_or(DomError::EmptyRender);
		}
		if self.awaiting.is_some() {
			return Err(DomError::EmptyRender);
		}
		self.close()?;
		self.root.ok_or(DomError::EmptyRender)
	}

	fn active(&self) -> bool {
		self.error.is_none() && !self.target.finished()
	}

	fn settle(&mut self, result: Result<()>) {
		if let Err(err) = result
			&& self.error.is_none()
		{
			tracing::debug!(%err, "dom.compose.poisoned");
			self.error = Some(err);
		}
	}

	/// Claims the next position of the current range.
	fn claim(&mut self, what: &'static str, dynamic: bool, in_attribute: bool) -> Result<usize> {
		if self.awaiting.is_some() {
			return Err(DomError::EmptyNested);
		}
		let frame = self.frames.last_mut().ok_or(DomError::StrayRange)?;
		match frame.kind {
			FrameKind::Items => {
				return Err(DomError::Misplaced {
					what,
					position: frame.written,
				});
			}
			FrameKind::Attribute if !in_attribute => return Err(DomError::NotInAttribute(what)),
			_ => {}
		}
		if frame.written >= frame.len {
			return Err(DomError::RangeOverflow { len: frame.len });
		}
		if (frame.written % 2 == 1) != dynamic {
			return Err(DomError::Misplaced {
				what,
				position: frame.written,
			});
		}
		let index = frame.start + frame.written;
		frame.written += 1;
		Ok(index)
	}

	fn next_key(&mut self) -> Result<Key> {
		let len = self.frames.last().map_or(0, |frame| frame.len);
		self.cursor.next_key(self.interner).ok_or(DomError::RangeOverflow { len })
	}

	fn open(&mut self, literals: usize, dynamics: usize) -> Result<()> {
		let awaiting = self.awaiting.take().ok_or(DomError::StrayRange)?;
		if literals != dynamics + 1 {
			return Err(DomError::UnbalancedRange { literals, dynamics });
		}
		let len = literals + dynamics;
		let start = self.target.reserve(len)?;
		let range = ChildRange::new(start, len);
		match awaiting.slot {
			Some(index) => self.target.set_range(index, range),
			None => self.root = Some(range),
		}
		let saved = self.cursor.descend_into(awaiting.key, dynamics);
		self.frames.push(Frame {
			kind: awaiting.kind,
			start,
			len,
			written: 0,
			saved,
		});
		Ok(())
	}

	/// Pops the innermost frame and restores the parent generation.
	fn close(&mut self) -> Result<()> {
		let frame = self.frames.pop().ok_or(DomError::StrayRange)?;
		if frame.written != frame.len {
			return Err(DomError::UnfinishedRange {
				written: frame.written,
				len: frame.len,
			});
		}
		let (parent, position, count) = frame.saved.into_parts();
		self.cursor.return_to_parent(parent, position, count);
		Ok(())
	}

	/// Runs a body that must open exactly one range for the slot at `index`.
	fn enter(&mut self, index: usize, key: Key, kind: FrameKind, body: impl FnOnce(&mut Self)) -> Result<()> {
		if !self.target.wants(&key) {
			return Ok(());
		}
		let depth = self.frames.len();
		self.awaiting = Some(Awaiting {
			slot: Some(index),
			key,
			kind,
		});
		body(self);
		if !self.active() {
			return Ok(());
		}
		if self.awaiting.take().is_some() {
			return Err(DomError::EmptyNested);
		}
		debug_assert_eq!(self.frames.len(), depth + 1);
		self.close()
	}

	fn write_literal(&mut self, text: &'static str) -> Result<()> {
		let index = self.claim("literal", false, true)?;
		self.target.put(index, Slot::literal(text));
		Ok(())
	}

	fn write_value(&mut self, value: Scalar, format: Option<&'static str>) -> Result<()> {
		let index = self.claim("value", true, true)?;
		let key = self.next_key()?;
		tracing::trace!(%key, index, "dom.compose.value");
		self.target.put(index, Slot::value(key, value, format));
		Ok(())
	}

	fn write_attribute(&mut self, name: &'static str, body: &mut dyn FnMut(&mut dyn Compose)) -> Result<()> {
		let index = self.claim("attribute", true, false)?;
		let key = self.next_key()?;
		self.target.put(index, Slot::attribute(key.clone(), name));
		self.enter(index, key, FrameKind::Attribute, |walker| body(walker))
	}

	fn write_nested(&mut self, transition: Option<&'static str>, body: &mut dyn FnMut(&mut dyn Compose)) -> Result<()> {
		let index = self.claim("nested tree", true, false)?;
		let key = self.next_key()?;
		self.target.put(index, Slot::nested(key.clone(), transition));
		self.enter(index, key, FrameKind::Template, |walker| body(walker))
	}

	fn write_each(
		&mut self,
		count: usize,
		transition: Option<&'static str>,
		body: &mut dyn FnMut(usize, &mut dyn Compose),
	) -> Result<()> {
		let index = self.claim("enumerable group", true, false)?;
		let key = self.next_key()?;
		self.target.put(index, Slot::enumerable(key.clone(), transition));
		if !self.target.wants(&key) {
			return Ok(());
		}
		let start = self.target.reserve(count)?;
		self.target.set_range(index, ChildRange::new(start, count));
		let saved = self.cursor.descend_into(key, count);
		self.frames.push(Frame {
			kind: FrameKind::Items,
			start,
			len: count,
			written: 0,
			saved,
		});

		for item in 0..count {
			if !self.active() {
				return Ok(());
			}
			let item_index = start + item;
			if let Some(frame) = self.frames.last_mut() {
				frame.written += 1;
			}
			let item_key = self.next_key()?;
			self.target.put(item_index, Slot::nested(item_key.clone(), transition));
			self.enter(item_index, item_key, FrameKind::Template, |walker| body(item, walker))?;
		}
		if !self.active() {
			return Ok(());
		}
		self.close()
	}

	fn write_event(&mut self, name: &'static str, handler: EventHandler) -> Result<()> {
		let index = self.claim("event binding", true, false)?;
		let key = self.next_key()?;
		self.target.put(index, Slot::event(key, name, handler));
		Ok(())
	}
}

impl<T: Target> Compose for Walker<'_, T> {
	fn begin_range(&mut self, literals: usize, dynamics: usize) {
		if self.active() {
			let result = self.open(literals, dynamics);
			self.settle(result);
		}
	}

	fn literal(&mut self, text: &'static str) {
		if self.active() {
			let result = self.write_literal(text);
			self.settle(result);
		}
	}

	fn value(&mut self, value: Scalar, format: Option<&'static str>) {
		if self.active() {
			let result = self.write_value(value, format);
			self.settle(result);
		}
	}

	fn attribute(&mut self, name: &'static str, body: &mut dyn FnMut(&mut dyn Compose)) {
		if self.active() {
			let result = self.write_attribute(name, body);
			self.settle(result);
		}
	}

	fn nested(&mut self, transition: Option<&'static str>, body: &mut dyn FnMut(&mut dyn Compose)) {
		if self.active() {
			let result = self.write_nested(transition, body);
			self.settle(result);
		}
	}

	fn each(&mut self, count: usize, transition: Option<&'static str>, body: &mut dyn FnMut(usize, &mut dyn Compose)) {
		if self.active() {
			let result = self.write_each(count, transition, body);
			self.settle(result);
		}
	}

	fn event(&mut self, name: &'static str, handler: EventHandler) {
		if self.active() {
			let result = self.write_event(name, handler);
			self.settle(result);
		}
	}
}

/// Fills a pooled arena, growing it by doubling up to a hard ceiling.
pub(crate) struct SnapshotWriter<'a> {
	slots: &'a mut Vec<Slot>,
	ceiling: usize,
}

impl<'a> SnapshotWriter<'a> {
	/// Starts a fresh arena whose slot 0 is the header.
	pub(crate) fn new(slots: &'a mut Vec<Slot>, ceiling: usize) -> Self {
		slots.clear();
		slots.push(Slot::header(1));
		Self { slots, ceiling }
	}

	/// Records the final length in the header slot.
	pub(crate) fn finish(self) -> usize {
		let len = self.slots.len();
		self.slots[0].set_header_len(len);
		len
	}
}

impl Target for SnapshotWriter<'_> {
	fn reserve(&mut self, len: usize) -> Result<usize> {
		let start = self.slots.len();
		let needed = start + len;
		if needed > self.ceiling {
			return Err(DomError::CapacityExceeded {
				needed,
				ceiling: self.ceiling,
			});
		}
		let capacity = self.slots.capacity();
		if needed > capacity {
			let target = needed.max(capacity.saturating_mul(2)).min(self.ceiling);
			self.slots.reserve_exact(target - start);
			tracing::trace!(from = capacity, to = target, "dom.arena.grow");
		}
		self.slots.resize_with(needed, Slot::default);
		Ok(start)
	}

	fn put(&mut self, index: usize, slot: Slot) {
		if let Some(entry) = self.slots.get_mut(index) {
			*entry = slot;
		}
	}

	fn set_range(&mut self, index: usize, range: ChildRange) {
		if let Some(entry) = self.slots.get_mut(index) {
			entry.set_range(range);
		}
	}
}

#[cfg(test)]
mod tests;
