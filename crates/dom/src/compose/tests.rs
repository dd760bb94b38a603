use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::scalar::ScalarKind;
use crate::slot::SlotKind;
use crate::snapshot::{SlotPool, Snapshot, SnapshotManager};

fn manager() -> SnapshotManager {
	SnapshotManager::new(Arc::new(SlotPool::default()), Arc::new(KeyInterner::new()))
}

fn capture(view: &dyn View) -> Result<Snapshot> {
	manager().capture(view)
}

fn layout(snapshot: &Snapshot) -> Vec<(SlotKind, Option<String>)> {
	snapshot
		.slots()
		.iter()
		.map(|slot| (slot.kind(), slot.key().map(|key| key.to_string())))
		.collect()
}

#[test]
fn ranges_are_laid_out_in_pre_order() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(3, 2);
		out.literal("<p>");
		out.nested(None, &mut |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("<b>");
			out.value(Scalar::Int(1), None);
			out.literal("</b>");
		});
		out.literal("");
		out.value(Scalar::from("tail"), None);
		out.literal("</p>");
	};
	let snapshot = capture(&view).unwrap();
	let key = |text: &str| Some(text.to_string());
	assert_eq!(
		layout(&snapshot),
		vec![
			(SlotKind::Header, None),
			(SlotKind::Literal, None),
			(SlotKind::Nested, key("k0")),
			(SlotKind::Literal, None),
			(SlotKind::Value(ScalarKind::Str), key("k1")),
			(SlotKind::Literal, None),
			(SlotKind::Literal, None),
			(SlotKind::Value(ScalarKind::Int), key("k00")),
			(SlotKind::Literal, None),
		]
	);
	assert_eq!(snapshot.len(), 9);
	assert_eq!(snapshot.root(), ChildRange::new(1, 5));
	assert_eq!(snapshot.slot(2).unwrap().range(), ChildRange::new(6, 3));
}

#[test]
fn repeated_renders_reuse_interned_keys() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.value(Scalar::Bool(true), None);
		out.literal("</p>");
	};
	let manager = manager();
	let a = manager.capture(&view).unwrap();
	let b = manager.capture(&view).unwrap();
	let key_a = a.slot(2).unwrap().key().unwrap();
	let key_b = b.slot(2).unwrap().key().unwrap();
	assert!(Key::ptr_eq(key_a, key_b));
}

#[test]
fn items_get_their_own_ranges() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<ul>");
		out.each(2, Some("fade"), &mut |i: usize, out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("<li>");
			out.value(Scalar::from(i), None);
			out.literal("</li>");
		});
		out.literal("</ul>");
	};
	let snapshot = capture(&view).unwrap();
	let group = snapshot.slot(2).unwrap();
	assert_eq!(group.kind(), SlotKind::Enumerable);
	assert_eq!(group.transition(), Some("fade"));
	assert_eq!(group.range(), ChildRange::new(4, 2));
	let items: Vec<_> = snapshot.range(group.range()).iter().map(|slot| slot.key().unwrap().to_string()).collect();
	assert_eq!(items, vec!["k00", "k01"]);
	let second = snapshot.slot(5).unwrap();
	assert_eq!(second.range(), ChildRange::new(9, 3));
	assert_eq!(snapshot.slot(10).unwrap().key().unwrap().as_str(), "k010");
}

#[test]
fn unbalanced_range_is_rejected() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 2);
	};
	assert_eq!(
		capture(&view).unwrap_err(),
		DomError::UnbalancedRange {
			literals: 2,
			dynamics: 2
		}
	);
}

#[test]
fn literal_at_dynamic_position_is_misplaced() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.literal("oops");
		out.literal("</p>");
	};
	assert_eq!(
		capture(&view).unwrap_err(),
		DomError::Misplaced {
			what: "literal",
			position: 1
		}
	);
}

#[test]
fn overfilled_range_overflows() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(1, 0);
		out.literal("a");
		out.literal("b");
	};
	assert_eq!(capture(&view).unwrap_err(), DomError::RangeOverflow { len: 1 });
}

#[test]
fn short_range_is_unfinished() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
	};
	assert_eq!(capture(&view).unwrap_err(), DomError::UnfinishedRange { written: 1, len: 3 });
}

#[test]
fn nested_body_must_begin_a_range() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.nested(None, &mut |_out: &mut dyn Compose| {});
		out.literal("</p>");
	};
	assert_eq!(capture(&view).unwrap_err(), DomError::EmptyNested);
}

#[test]
fn empty_render_is_an_error() {
	let view = |_out: &mut dyn Compose| {};
	assert_eq!(capture(&view).unwrap_err(), DomError::EmptyRender);
}

#[test]
fn second_root_range_is_stray() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(1, 0);
		out.literal("a");
		out.begin_range(1, 0);
	};
	assert_eq!(capture(&view).unwrap_err(), DomError::StrayRange);
}

#[test]
fn attributes_reject_structure() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<div");
		out.attribute("class", &mut |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("");
			out.nested(None, &mut |out: &mut dyn Compose| out.begin_range(1, 0));
			out.literal("");
		});
		out.literal(">");
	};
	assert_eq!(capture(&view).unwrap_err(), DomError::NotInAttribute("nested tree"));
}

#[test]
fn first_error_wins() {
	let view = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.value(Scalar::Int(0), None);
		out.literal("a");
		out.begin_range(9, 1);
	};
	assert_eq!(
		capture(&view).unwrap_err(),
		DomError::Misplaced {
			what: "value",
			position: 0
		}
	);
}
