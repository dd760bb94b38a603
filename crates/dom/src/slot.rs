//! Arena entries.

use std::ops::Range;
use std::sync::Arc;

use crate::handler::EventHandler;
use crate::key::Key;
use crate::scalar::{Scalar, ScalarKind};

/// A sub-range of the arena, addressed without parent back-references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildRange {
	pub start: u32,
	pub len: u32,
}

impl ChildRange {
	/// Arena sizes are bounded well below `u32::MAX` by the pool ceiling.
	pub const fn new(start: usize, len: usize) -> Self {
		Self {
			start: start as u32,
			len: len as u32,
		}
	}

	pub const fn len(&self) -> usize {
		self.len as usize
	}

	pub const fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn indices(&self) -> Range<usize> {
		let start = self.start as usize;
		start..start + self.len as usize
	}
}

/// What a slot holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotKind {
	/// Not yet written.
	#[default]
	Vacant,
	/// Arena slot 0; value payload is the meaningful buffer length.
	Header,
	/// Fixed template text.
	Literal,
	/// Scalar written at a dynamic position.
	Value(ScalarKind),
	/// Named attribute whose child range holds its literal/value parts.
	Attribute,
	/// Nested template; also every item of an enumerable group.
	Nested,
	/// Sequence of nested items.
	Enumerable,
	/// Event binding; never rendered as content.
	Event,
}

impl SlotKind {
	/// Coarse category used for shape comparison: every scalar kind counts as one.
	pub(crate) fn category(self) -> u8 {
		match self {
			Self::Vacant => 0,
			Self::Header => 1,
			Self::Literal => 2,
			Self::Value(_) => 3,
			Self::Attribute => 4,
			Self::Nested => 5,
			Self::Enumerable => 6,
			Self::Event => 7,
		}
	}
}

/// Reference payload; which variant is meaningful follows from the kind.
#[derive(Debug, Clone, Default)]
enum SlotRef {
	#[default]
	None,
	Static(&'static str),
	Text(Arc<str>),
	Handler(EventHandler),
}

/// One keyhole.
///
/// Exactly one of the reference or value payloads is meaningful per kind.
/// `format` carries the value format, the event name of an event slot, or
/// the transition hint of nested and enumerable slots.
#[derive(Debug, Clone, Default)]
pub struct Slot {
	key: Option<Key>,
	kind: SlotKind,
	reference: SlotRef,
	bits: u64,
	format: Option<&'static str>,
	range: ChildRange,
}

impl Slot {
	pub(crate) fn header(len: usize) -> Self {
		Self {
			kind: SlotKind::Header,
			bits: len as u64,
			..Self::default()
		}
	}

	pub(crate) fn literal(text: &'static str) -> Self {
		Self {
			kind: SlotKind::Literal,
			reference: SlotRef::Static(text),
			..Self::default()
		}
	}

	pub(crate) fn value(key: Key, value: Scalar, format: Option<&'static str>) -> Self {
		let (kind, text, bits) = value.into_parts();
		Self {
			key: Some(key),
			kind: SlotKind::Value(kind),
			reference: text.map_or(SlotRef::None, SlotRef::Text),
			bits,
			format,
			range: ChildRange::default(),
		}
	}

	pub(crate) fn attribute(key: Key, name: &'static str) -> Self {
		Self {
			key: Some(key),
			kind: SlotKind::Attribute,
			reference: SlotRef::Static(name),
			..Self::default()
		}
	}

	pub(crate) fn nested(key: Key, transition: Option<&'static str>) -> Self {
		Self {
			key: Some(key),
			kind: SlotKind::Nested,
			format: transition,
			..Self::default()
		}
	}

	pub(crate) fn enumerable(key: Key, transition: Option<&'static str>) -> Self {
		Self {
			key: Some(key),
			kind: SlotKind::Enumerable,
			format: transition,
			..Self::default()
		}
	}

	pub(crate) fn event(key: Key, name: &'static str, handler: EventHandler) -> Self {
		Self {
			key: Some(key),
			kind: SlotKind::Event,
			reference: SlotRef::Handler(handler),
			format: Some(name),
			..Self::default()
		}
	}

	pub(crate) fn set_range(&mut self, range: ChildRange) {
		self.range = range;
	}

	pub(crate) fn set_header_len(&mut self, len: usize) {
		self.bits = len as u64;
	}

	/// Identity; `None` for literals and the header.
	pub fn key(&self) -> Option<&Key> {
		self.key.as_ref()
	}

	pub fn kind(&self) -> SlotKind {
		self.kind
	}

	/// Child range of attribute, nested and enumerable slots.
	pub fn range(&self) -> ChildRange {
		self.range
	}

	/// Value format specifier.
	pub fn format(&self) -> Option<&'static str> {
		match self.kind {
			SlotKind::Value(_) => self.format,
			_ => None,
		}
	}

	/// Transition hint of nested and enumerable slots.
	pub fn transition(&self) -> Option<&'static str> {
		match self.kind {
			SlotKind::Nested | SlotKind::Enumerable => self.format,
			_ => None,
		}
	}

	/// Event name of an event slot.
	pub fn event_name(&self) -> Option<&'static str> {
		match self.kind {
			SlotKind::Event => self.format,
			_ => None,
		}
	}

	/// Attribute name of an attribute slot.
	pub fn attribute_name(&self) -> Option<&'static str> {
		match (self.kind, &self.reference) {
			(SlotKind::Attribute, SlotRef::Static(name)) => Some(name),
			_ => None,
		}
	}

	/// Template text of a literal slot.
	pub fn literal_text(&self) -> Option<&'static str> {
		match (self.kind, &self.reference) {
			(SlotKind::Literal, SlotRef::Static(text)) => Some(text),
			_ => None,
		}
	}

	pub fn handler(&self) -> Option<&EventHandler> {
		match &self.reference {
			SlotRef::Handler(handler) => Some(handler),
			_ => None,
		}
	}

	/// Decoded scalar of a value slot.
	pub fn scalar(&self) -> Option<Scalar> {
		let SlotKind::Value(kind) = self.kind else {
			return None;
		};
		let text = match &self.reference {
			SlotRef::Text(text) => Some(text),
			_ => None,
		};
		Scalar::from_parts(kind, text, self.bits)
	}

	/// Appends the display text of a value slot.
	pub fn render_value(&self, out: &mut String) {
		match (self.kind, &self.reference) {
			(SlotKind::Value(ScalarKind::Str), SlotRef::Text(text)) => out.push_str(text),
			(SlotKind::Value(_), _) => {
				if let Some(value) = self.scalar() {
					value.render(self.format, out);
				}
			}
			_ => {}
		}
	}

	/// Meaningful arena length stored in the header slot.
	pub fn header_len(&self) -> Option<usize> {
		(self.kind == SlotKind::Header).then_some(self.bits as usize)
	}

	/// Literal identity: same static text by address and length.
	pub(crate) fn same_literal(&self, other: &Self) -> bool {
		match (self.literal_text(), other.literal_text()) {
			(Some(a), Some(b)) => std::ptr::eq(a.as_ptr(), b.as_ptr()) && a.len() == b.len(),
			_ => false,
		}
	}

	/// Value equality of two value slots: kind, payload and format.
	pub(crate) fn same_value(&self, other: &Self) -> bool {
		if self.kind != other.kind || self.bits != other.bits || self.format != other.format {
			return false;
		}
		match (&self.reference, &other.reference) {
			(SlotRef::Text(a), SlotRef::Text(b)) => Arc::ptr_eq(a, b) || a == b,
			(SlotRef::None, SlotRef::None) => true,
			_ => false,
		}
	}

	/// Same dynamic category, and for attributes and events the same static name.
	pub(crate) fn same_position_shape(&self, other: &Self) -> bool {
		if self.kind.category() != other.kind.category() {
			return false;
		}
		match self.kind {
			SlotKind::Attribute => match (self.attribute_name(), other.attribute_name()) {
				(Some(a), Some(b)) => a == b,
				_ => false,
			},
			SlotKind::Event => self.event_name() == other.event_name(),
			_ => true,
		}
	}
}
