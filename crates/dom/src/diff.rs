//! Snapshot comparison.
//!
//! Ranges are compared depth-first in document order. A range whose length,
//! literal identities or dynamic kinds differ is replaced whole and not
//! descended into; otherwise each dynamic position is compared on its own.
//! Attributes are atomic: any difference inside one replaces the attribute.
//!
//! Enumerable groups reconcile by position. Items at common indices are
//! diffed like nested trees, extra items are inserted after their
//! predecessor and missing ones removed. When the item count crosses a key
//! digit-width boundary every item key changes, so the group is replaced.

use std::convert::Infallible;

use crate::html;
use crate::key::{Key, digit_width};
use crate::slot::{ChildRange, Slot, SlotKind};
use crate::snapshot::Snapshot;

/// A part of the "after" snapshot carried by a structural mutation.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
	snapshot: &'a Snapshot,
	slot: Option<usize>,
	range: ChildRange,
}

impl<'a> Fragment<'a> {
	fn root(snapshot: &'a Snapshot) -> Self {
		Self {
			snapshot,
			slot: None,
			range: snapshot.root(),
		}
	}

	fn slot(snapshot: &'a Snapshot, index: usize) -> Self {
		let range = snapshot.slot(index).map(Slot::range).unwrap_or_default();
		Self {
			snapshot,
			slot: Some(index),
			range,
		}
	}

	pub fn snapshot(&self) -> &'a Snapshot {
		self.snapshot
	}

	/// The range this fragment covers.
	pub fn range(&self) -> ChildRange {
		self.range
	}

	/// Markup of the range's content, without the owning slot's brackets.
	pub fn inner_html(&self) -> String {
		let mut out = String::new();
		html::render_range(self.snapshot, self.range, &mut out);
		out
	}

	/// Markup including the owning slot's brackets.
	pub fn outer_html(&self) -> String {
		let Some(slot) = self.slot.and_then(|index| self.snapshot.slot(index)) else {
			return self.inner_html();
		};
		let mut out = String::new();
		html::render_slot(self.snapshot, slot, &mut out);
		out
	}

	pub fn attribute_name(&self) -> Option<&'static str> {
		self.slot.and_then(|index| self.snapshot.slot(index)).and_then(Slot::attribute_name)
	}

	/// `None` when the attribute should be removed.
	pub fn attribute_value(&self) -> Option<String> {
		let slot = self.slot.and_then(|index| self.snapshot.slot(index))?;
		html::attribute_value(self.snapshot, slot)
	}
}

/// One patch operation against the remote copy.
#[derive(Debug, Clone)]
pub enum Mutation<'a> {
	/// New scalar for a value slot.
	ReplaceValue { key: Key, slot: &'a Slot },
	/// New value (or absence) for a whole attribute.
	ReplaceAttribute { key: Key, attribute: Fragment<'a> },
	/// New content for a nested tree, an enumerable group or the root.
	ReplaceSubtree {
		key: Key,
		fragment: Fragment<'a>,
		transition: Option<&'static str>,
	},
	/// New enumerable item placed right after `after`.
	InsertSubtree {
		after: Key,
		key: Key,
		fragment: Fragment<'a>,
		transition: Option<&'static str>,
	},
	/// Enumerable item that no longer exists.
	RemoveSubtree { key: Key, transition: Option<&'static str> },
}

/// Tag of a [`Mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
	ReplaceValue,
	ReplaceAttribute,
	ReplaceSubtree,
	InsertSubtree,
	RemoveSubtree,
}

impl Mutation<'_> {
	pub fn kind(&self) -> MutationKind {
		match self {
			Self::ReplaceValue { .. } => MutationKind::ReplaceValue,
			Self::ReplaceAttribute { .. } => MutationKind::ReplaceAttribute,
			Self::ReplaceSubtree { .. } => MutationKind::ReplaceSubtree,
			Self::InsertSubtree { .. } => MutationKind::InsertSubtree,
			Self::RemoveSubtree { .. } => MutationKind::RemoveSubtree,
		}
	}

	/// Key of the node the mutation targets.
	pub fn key(&self) -> &Key {
		match self {
			Self::ReplaceValue { key, .. }
			| Self::ReplaceAttribute { key, .. }
			| Self::ReplaceSubtree { key, .. }
			| Self::InsertSubtree { key, .. }
			| Self::RemoveSubtree { key, .. } => key,
		}
	}
}

/// Receiver of diff output, in document order.
pub trait PatchSink<'a> {
	type Error;

	fn push(&mut self, mutation: Mutation<'a>) -> Result<(), Self::Error>;
}

impl<'a> PatchSink<'a> for Vec<Mutation<'a>> {
	type Error = Infallible;

	fn push(&mut self, mutation: Mutation<'a>) -> Result<(), Infallible> {
		Vec::push(self, mutation);
		Ok(())
	}
}

/// Feeds the mutations turning `before` into `after` to `sink`.
///
/// An unpopulated `before` yields a single root replacement keyed `root_key`.
pub fn diff<'a, S>(before: &Snapshot, after: &'a Snapshot, root_key: &Key, sink: &mut S) -> Result<(), S::Error>
where
	S: PatchSink<'a>,
{
	if !before.is_populated() {
		return sink.push(Mutation::ReplaceSubtree {
			key: root_key.clone(),
			fragment: Fragment::root(after),
			transition: None,
		});
	}
	let mut differ = Differ { before, after, sink };
	differ.template(before.root(), after.root(), root_key, None, None)
}

/// [`diff()`] into a vector.
pub fn diff_to_vec<'a>(before: &Snapshot, after: &'a Snapshot, root_key: &Key) -> Vec<Mutation<'a>> {
	let mut out = Vec::new();
	match diff(before, after, root_key, &mut out) {
		Ok(()) => out,
		Err(never) => match never {},
	}
}

struct Differ<'b, 'a, 's, S> {
	before: &'b Snapshot,
	after: &'a Snapshot,
	sink: &'s mut S,
}

impl<'a, S: PatchSink<'a>> Differ<'_, 'a, '_, S> {
	fn template(
		&mut self,
		before: ChildRange,
		after: ChildRange,
		key: &Key,
		transition: Option<&'static str>,
		owner: Option<usize>,
	) -> Result<(), S::Error> {
		let (before_snapshot, after_snapshot) = (self.before, self.after);
		let old = before_snapshot.range(before);
		let new = after_snapshot.range(after);
		if !same_shape(old, new) {
			tracing::trace!(%key, before = old.len(), after = new.len(), "dom.diff.shape_changed");
			let fragment = match owner {
				Some(index) => Fragment::slot(self.after, index),
				None => Fragment::root(self.after),
			};
			return self.sink.push(Mutation::ReplaceSubtree {
				key: key.clone(),
				fragment,
				transition,
			});
		}

		let start = after.start as usize;
		for (offset, (old_slot, new_slot)) in old.iter().zip(new).enumerate().skip(1).step_by(2) {
			let Some(slot_key) = new_slot.key() else {
				continue;
			};
			let index = start + offset;
			match new_slot.kind() {
				SlotKind::Value(_) if !old_slot.same_value(new_slot) => {
					self.sink.push(Mutation::ReplaceValue {
						key: slot_key.clone(),
						slot: new_slot,
					})?;
				}
				SlotKind::Attribute if !self.same_attribute(old_slot, new_slot) => {
					self.sink.push(Mutation::ReplaceAttribute {
						key: slot_key.clone(),
						attribute: Fragment::slot(self.after, index),
					})?;
				}
				SlotKind::Nested => {
					self.template(old_slot.range(), new_slot.range(), slot_key, new_slot.transition(), Some(index))?;
				}
				SlotKind::Enumerable => self.items(old_slot, new_slot, slot_key, index)?,
				_ => {}
			}
		}
		Ok(())
	}

	fn items(&mut self, old_group: &Slot, new_group: &'a Slot, key: &Key, index: usize) -> Result<(), S::Error> {
		let transition = new_group.transition();
		let (before_snapshot, after_snapshot) = (self.before, self.after);
		let old = before_snapshot.range(old_group.range());
		let new = after_snapshot.range(new_group.range());
		if digit_width(old.len()) != digit_width(new.len()) {
			tracing::trace!(%key, before = old.len(), after = new.len(), "dom.diff.group_rekeyed");
			return self.sink.push(Mutation::ReplaceSubtree {
				key: key.clone(),
				fragment: Fragment::slot(self.after, index),
				transition,
			});
		}

		let start = new_group.range().start as usize;
		let common = old.len().min(new.len());
		for (offset, (old_item, new_item)) in old.iter().zip(new).enumerate() {
			let Some(item_key) = new_item.key() else {
				continue;
			};
			self.template(old_item.range(), new_item.range(), item_key, transition, Some(start + offset))?;
		}

		let mut previous = match common.checked_sub(1) {
			Some(last) => new.get(last).and_then(Slot::key).unwrap_or(key),
			None => key,
		};
		for (offset, item) in new.iter().enumerate().skip(common) {
			let Some(item_key) = item.key() else {
				continue;
			};
			self.sink.push(Mutation::InsertSubtree {
				after: previous.clone(),
				key: item_key.clone(),
				fragment: Fragment::slot(self.after, start + offset),
				transition,
			})?;
			previous = item_key;
		}

		for item in old.iter().skip(common) {
			if let Some(item_key) = item.key() {
				self.sink.push(Mutation::RemoveSubtree {
					key: item_key.clone(),
					transition,
				})?;
			}
		}
		Ok(())
	}

	fn same_attribute(&self, old: &Slot, new: &Slot) -> bool {
		let old = self.before.range(old.range());
		let new = self.after.range(new.range());
		old.len() == new.len()
			&& old.iter().zip(new).all(|(a, b)| match b.kind() {
				SlotKind::Literal => a.same_literal(b),
				SlotKind::Value(_) => a.same_value(b),
				_ => false,
			})
	}
}

/// Same length, same literal identities, same dynamic categories.
fn same_shape(old: &[Slot], new: &[Slot]) -> bool {
	old.len() == new.len()
		&& old.iter().zip(new).enumerate().all(|(position, (a, b))| {
			if position % 2 == 0 {
				a.same_literal(b)
			} else {
				a.same_position_shape(b)
			}
		})
}

#[cfg(test)]
mod tests;
