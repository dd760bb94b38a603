//! Markup serialization of snapshots.
//!
//! Every dynamic node is bracketed so the remote side can locate it by key
//! without a registration step: content positions as `<!--K-->...<!--/K-->`,
//! attributes with a `data-kh-K="name"` sentinel, event bindings as
//! `data-kh-on<event>="K"`.

use crate::compose::EMPTY;
use crate::key::Key;
use crate::scalar::Scalar;
use crate::slot::{ChildRange, Slot, SlotKind};
use crate::snapshot::Snapshot;

/// Appends `text` with `& < > " '` escaped.
pub fn escape_into(text: &str, out: &mut String) {
	let mut last = 0;
	for (index, byte) in text.bytes().enumerate() {
		let entity = match byte {
			b'&' => "&amp;",
			b'<' => "&lt;",
			b'>' => "&gt;",
			b'"' => "&quot;",
			b'\'' => "&#39;",
			_ => continue,
		};
		out.push_str(&text[last..index]);
		out.push_str(entity);
		last = index + 1;
	}
	out.push_str(&text[last..]);
}

/// Full document for the initial response, root bracketed by `root_key`.
pub fn render_document(snapshot: &Snapshot, root_key: &Key) -> String {
	let mut out = String::with_capacity(snapshot.len() * 16);
	open_marker(root_key, &mut out);
	render_range(snapshot, snapshot.root(), &mut out);
	close_marker(root_key, &mut out);
	out
}

/// Inner markup of one range.
pub fn render_range(snapshot: &Snapshot, range: ChildRange, out: &mut String) {
	for index in range.indices() {
		if let Some(slot) = snapshot.slot(index) {
			render_slot(snapshot, slot, out);
		}
	}
}

/// Markup of one slot, brackets included.
pub fn render_slot(snapshot: &Snapshot, slot: &Slot, out: &mut String) {
	match slot.kind() {
		SlotKind::Literal => out.push_str(slot.literal_text().unwrap_or_default()),
		SlotKind::Value(_) => {
			let Some(key) = slot.key() else { return };
			open_marker(key, out);
			let mut text = String::new();
			slot.render_value(&mut text);
			escape_into(&text, out);
			close_marker(key, out);
		}
		SlotKind::Nested | SlotKind::Enumerable => {
			let Some(key) = slot.key() else { return };
			open_marker(key, out);
			render_range(snapshot, slot.range(), out);
			close_marker(key, out);
		}
		SlotKind::Attribute => render_attribute(snapshot, slot, out),
		SlotKind::Event => {
			let (Some(key), Some(name)) = (slot.key(), slot.event_name()) else {
				return;
			};
			out.push_str(" data-kh-on");
			out.push_str(name);
			out.push_str("=\"");
			out.push_str(key);
			out.push('"');
		}
		SlotKind::Vacant | SlotKind::Header => {}
	}
}

/// Value of an attribute slot: `None` when the attribute is absent
/// (a lone `false`), `Some("")` for a lone `true`.
pub fn attribute_value(snapshot: &Snapshot, slot: &Slot) -> Option<String> {
	let parts = snapshot.range(slot.range());
	if let [head, value, tail] = parts
		&& head.literal_text() == Some(EMPTY)
		&& tail.literal_text() == Some(EMPTY)
		&& let Some(Scalar::Bool(flag)) = value.scalar()
	{
		return flag.then(String::new);
	}
	let mut text = String::new();
	for part in parts {
		match part.kind() {
			SlotKind::Literal => text.push_str(part.literal_text().unwrap_or_default()),
			SlotKind::Value(_) => part.render_value(&mut text),
			_ => {}
		}
	}
	Some(text)
}

fn render_attribute(snapshot: &Snapshot, slot: &Slot, out: &mut String) {
	let (Some(key), Some(name)) = (slot.key(), slot.attribute_name()) else {
		return;
	};
	match attribute_value(snapshot, slot) {
		Some(value) if value.is_empty() => {
			out.push(' ');
			out.push_str(name);
		}
		Some(value) => {
			out.push(' ');
			out.push_str(name);
			out.push_str("=\"");
			escape_into(&value, out);
			out.push('"');
		}
		None => {}
	}
	out.push_str(" data-kh-");
	out.push_str(key);
	out.push_str("=\"");
	out.push_str(name);
	out.push('"');
}

fn open_marker(key: &Key, out: &mut String) {
	out.push_str("<!--");
	out.push_str(key);
	out.push_str("-->");
}

fn close_marker(key: &Key, out: &mut String) {
	out.push_str("<!--/");
	out.push_str(key);
	out.push_str("-->");
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use pretty_assertions::assert_eq;

	use super::*;
	use crate::compose::Compose;
	use crate::handler::EventHandler;
	use crate::key::KeyInterner;
	use crate::snapshot::{SlotPool, SnapshotManager};

	fn manager() -> SnapshotManager {
		SnapshotManager::new(Arc::new(SlotPool::default()), Arc::new(KeyInterner::new()))
	}

	#[test]
	fn escapes_markup_characters() {
		let mut out = String::new();
		escape_into(r#"a<b>&"c"'d'"#, &mut out);
		assert_eq!(out, "a&lt;b&gt;&amp;&quot;c&quot;&#39;d&#39;");
	}

	#[test]
	fn document_brackets_dynamic_nodes() {
		let view = |out: &mut dyn Compose| {
			out.begin_range(5, 4);
			out.literal("<label><input type=\"checkbox\"");
			out.attribute_value("checked", Scalar::Bool(true));
			out.literal("");
			out.event("change", EventHandler::action(|| Ok(())));
			out.literal(">");
			out.value(Scalar::from("a & b"), None);
			out.literal("");
			out.nested(None, &mut |out: &mut dyn Compose| {
				out.begin_range(1, 0);
				out.literal("<i>x</i>");
			});
			out.literal("</label>");
		};
		let manager = manager();
		let snapshot = manager.capture(&view).unwrap();
		let html = render_document(&snapshot, manager.interner().root());
		assert_eq!(
			html,
			concat!(
				"<!--k--><label><input type=\"checkbox\" checked data-kh-k0=\"checked\"",
				" data-kh-onchange=\"k1\">",
				"<!--k2-->a &amp; b<!--/k2-->",
				"<!--k3--><i>x</i><!--/k3-->",
				"</label><!--/k-->"
			)
		);
	}

	#[test]
	fn false_attribute_keeps_only_the_sentinel() {
		let view = |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("<input");
			out.attribute_value("disabled", Scalar::Bool(false));
			out.literal(">");
		};
		let manager = manager();
		let snapshot = manager.capture(&view).unwrap();
		assert_eq!(render_document(&snapshot, manager.interner().root()), "<!--k--><input data-kh-k0=\"disabled\"><!--/k-->");
	}

	#[test]
	fn composite_attribute_values_are_concatenated() {
		let view = |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("<div");
			out.attribute("class", &mut |out: &mut dyn Compose| {
				out.begin_range(2, 1);
				out.literal("item ");
				out.value(Scalar::from("\"on\""), None);
				out.literal("");
			});
			out.literal(">");
		};
		let manager = manager();
		let snapshot = manager.capture(&view).unwrap();
		assert_eq!(
			render_document(&snapshot, manager.interner().root()),
			"<!--k--><div class=\"item &quot;on&quot;\" data-kh-k0=\"class\"><!--/k-->"
		);
	}

	#[test]
	fn empty_text_attribute_renders_bare() {
		let manager = manager();
		let view = |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("<a");
			out.attribute_value("href", Scalar::from(""));
			out.literal(">");
		};
		let snapshot = manager.capture(&view).unwrap();
		let slot = snapshot.slot(snapshot.root().indices().start + 1).unwrap();
		assert_eq!(attribute_value(&snapshot, slot), Some(String::new()));
	}
}
