use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::compose::{Compose, View};
use crate::key::KeyInterner;
use crate::scalar::Scalar;
use crate::snapshot::{SlotPool, SnapshotManager};

fn manager() -> SnapshotManager {
	SnapshotManager::new(Arc::new(SlotPool::default()), Arc::new(KeyInterner::new()))
}

fn summary(mutations: &[Mutation<'_>]) -> Vec<(MutationKind, String)> {
	mutations.iter().map(|m| (m.kind(), m.key().to_string())).collect()
}

fn run(manager: &SnapshotManager, before: &dyn View, after: &dyn View) -> Vec<(MutationKind, String)> {
	let before = manager.capture(before).unwrap();
	let after = manager.capture(after).unwrap();
	summary(&diff_to_vec(&before, &after, manager.interner().root()))
}

struct Paragraph(&'static str);

impl View for Paragraph {
	fn render(&self, out: &mut dyn Compose) {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.value(Scalar::from(self.0), None);
		out.literal("</p>");
	}
}

struct List(Vec<String>);

impl View for List {
	fn render(&self, out: &mut dyn Compose) {
		out.begin_range(2, 1);
		out.literal("<ul>");
		out.each(self.0.len(), Some("slide"), &mut |i: usize, out: &mut dyn Compose| {
			out.begin_range(2, 1);
			out.literal("<li>");
			out.value(Scalar::from(self.0[i].as_str()), None);
			out.literal("</li>");
		});
		out.literal("</ul>");
	}
}

fn list(items: &[&str]) -> List {
	List(items.iter().map(|item| item.to_string()).collect())
}

struct Checkbox(bool);

impl View for Checkbox {
	fn render(&self, out: &mut dyn Compose) {
		out.begin_range(2, 1);
		out.literal("<input type=\"checkbox\"");
		out.attribute_value("checked", Scalar::Bool(self.0));
		out.literal(">");
	}
}

/// Same slot count in both branches; only the literal skeleton differs.
struct Branch(bool);

impl View for Branch {
	fn render(&self, out: &mut dyn Compose) {
		out.begin_range(2, 1);
		out.literal("<div>");
		out.nested(None, &mut |out: &mut dyn Compose| {
			out.begin_range(2, 1);
			if self.0 {
				out.literal("<b>");
			} else {
				out.literal("<i>");
			}
			out.value(Scalar::Int(1), None);
			out.literal("</>");
		});
		out.literal("</div>");
	}
}

#[test]
fn changed_value_replaces_only_that_value() {
	let manager = manager();
	let before = manager.capture(&Paragraph("hi")).unwrap();
	let after = manager.capture(&Paragraph("bye")).unwrap();
	let mutations = diff_to_vec(&before, &after, manager.interner().root());
	assert_eq!(summary(&mutations), vec![(MutationKind::ReplaceValue, "k0".to_string())]);
	let Mutation::ReplaceValue { slot, .. } = &mutations[0] else {
		panic!("expected a value replacement");
	};
	assert_eq!(slot.scalar(), Some(Scalar::from("bye")));
}

#[test]
fn root_length_change_replaces_root_only() {
	let short = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.value(Scalar::Int(1), None);
		out.literal("</p>");
	};
	let long = |out: &mut dyn Compose| {
		out.begin_range(3, 2);
		out.literal("<p>");
		out.value(Scalar::Int(1), None);
		out.literal("");
		out.value(Scalar::Int(2), None);
		out.literal("</p>");
	};
	let manager = manager();
	assert_eq!(run(&manager, &short, &long), vec![(MutationKind::ReplaceSubtree, "k".to_string())]);
}

#[test]
fn attribute_change_replaces_the_attribute() {
	let manager = manager();
	let before = manager.capture(&Checkbox(true)).unwrap();
	let after = manager.capture(&Checkbox(false)).unwrap();
	let mutations = diff_to_vec(&before, &after, manager.interner().root());
	assert_eq!(summary(&mutations), vec![(MutationKind::ReplaceAttribute, "k0".to_string())]);
	let Mutation::ReplaceAttribute { attribute, .. } = &mutations[0] else {
		panic!("expected an attribute replacement");
	};
	assert_eq!(attribute.attribute_name(), Some("checked"));
	assert_eq!(attribute.attribute_value(), None);
}

#[test]
fn snapshot_against_itself_is_clean() {
	let manager = manager();
	let snapshot = manager.capture(&list(&["a", "b"])).unwrap();
	assert!(diff_to_vec(&snapshot, &snapshot, manager.interner().root()).is_empty());
}

#[test]
fn branch_switch_with_equal_length_replaces_the_nested_tree() {
	let manager = manager();
	let before = manager.capture(&Branch(true)).unwrap();
	let after = manager.capture(&Branch(false)).unwrap();
	let mutations = diff_to_vec(&before, &after, manager.interner().root());
	assert_eq!(summary(&mutations), vec![(MutationKind::ReplaceSubtree, "k0".to_string())]);
	let Mutation::ReplaceSubtree { fragment, .. } = &mutations[0] else {
		panic!("expected a subtree replacement");
	};
	assert_eq!(fragment.inner_html(), "<i><!--k00-->1<!--/k00--></>");
}

#[test]
fn dynamic_kind_change_is_a_shape_change() {
	let value = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.value(Scalar::Int(1), None);
		out.literal("</p>");
	};
	let tree = |out: &mut dyn Compose| {
		out.begin_range(2, 1);
		out.literal("<p>");
		out.nested(None, &mut |out: &mut dyn Compose| {
			out.begin_range(1, 0);
			out.literal("x");
		});
		out.literal("</p>");
	};
	let manager = manager();
	assert_eq!(run(&manager, &value, &tree), vec![(MutationKind::ReplaceSubtree, "k".to_string())]);
}

#[test]
fn unpopulated_before_replaces_root() {
	let manager = manager();
	let before = manager.acquire();
	let after = manager.capture(&Paragraph("x")).unwrap();
	let mutations = diff_to_vec(&before, &after, manager.interner().root());
	assert_eq!(summary(&mutations), vec![(MutationKind::ReplaceSubtree, "k".to_string())]);
	let Mutation::ReplaceSubtree { fragment, .. } = &mutations[0] else {
		panic!("expected a subtree replacement");
	};
	assert_eq!(fragment.inner_html(), "<p><!--k0-->x<!--/k0--></p>");
}

#[test]
fn appended_items_are_inserted_after_their_predecessor() {
	let manager = manager();
	let before = manager.capture(&list(&["a", "b", "c"])).unwrap();
	let after = manager.capture(&list(&["a", "b", "c", "d", "e"])).unwrap();
	let mutations = diff_to_vec(&before, &after, manager.interner().root());
	assert_eq!(
		summary(&mutations),
		vec![(MutationKind::InsertSubtree, "k03".to_string()), (MutationKind::InsertSubtree, "k04".to_string())]
	);
	let Mutation::InsertSubtree {
		after: anchor,
		fragment,
		transition,
		..
	} = &mutations[0]
	else {
		panic!("expected an insertion");
	};
	assert_eq!(anchor.as_str(), "k02");
	assert_eq!(*transition, Some("slide"));
	assert_eq!(fragment.outer_html(), "<!--k03--><li><!--k030-->d<!--/k030--></li><!--/k03-->");
	let Mutation::InsertSubtree { after: anchor, .. } = &mutations[1] else {
		panic!("expected an insertion");
	};
	assert_eq!(anchor.as_str(), "k03");
}

#[test]
fn first_item_is_inserted_after_the_group() {
	let manager = manager();
	let before = manager.capture(&list(&[])).unwrap();
	let after = manager.capture(&list(&["a"])).unwrap();
	let mutations = diff_to_vec(&before, &after, manager.interner().root());
	let Mutation::InsertSubtree { after: anchor, key, .. } = &mutations[0] else {
		panic!("expected an insertion");
	};
	assert_eq!((anchor.as_str(), key.as_str()), ("k0", "k00"));
	assert_eq!(mutations.len(), 1);
}

#[test]
fn truncated_items_are_removed() {
	let manager = manager();
	let mutations = run(&manager, &list(&["a", "b", "c"]), &list(&["a"]));
	assert_eq!(
		mutations,
		vec![(MutationKind::RemoveSubtree, "k01".to_string()), (MutationKind::RemoveSubtree, "k02".to_string())]
	);
}

#[test]
fn common_items_are_diffed_in_place() {
	let manager = manager();
	let mutations = run(&manager, &list(&["a", "b", "c"]), &list(&["a", "B"]));
	assert_eq!(
		mutations,
		vec![(MutationKind::ReplaceValue, "k010".to_string()), (MutationKind::RemoveSubtree, "k02".to_string())]
	);
}

#[test]
fn key_width_change_replaces_the_group() {
	let manager = manager();
	let thirty: Vec<String> = (0..30).map(|i| i.to_string()).collect();
	let mut thirty_one = thirty.clone();
	thirty_one.push("30".into());
	let mutations = run(&manager, &List(thirty), &List(thirty_one));
	assert_eq!(mutations, vec![(MutationKind::ReplaceSubtree, "k0".to_string())]);
}

struct Texts(Vec<String>);

impl View for Texts {
	fn render(&self, out: &mut dyn Compose) {
		out.begin_range(self.0.len() + 1, self.0.len());
		out.literal("<div>");
		for text in &self.0 {
			out.value(Scalar::from(text.as_str()), None);
			out.literal("<br>");
		}
	}
}

proptest! {
	#[test]
	fn equal_renders_are_clean(texts in prop::collection::vec("[a-z]{0,6}", 0..40)) {
		let manager = manager();
		let before = manager.capture(&Texts(texts.clone())).unwrap();
		let after = manager.capture(&Texts(texts)).unwrap();
		prop_assert!(diff_to_vec(&before, &after, manager.interner().root()).is_empty());
		prop_assert!(diff_to_vec(&after, &after, manager.interner().root()).is_empty());
	}

	#[test]
	fn value_edits_map_one_to_one(
		texts in prop::collection::vec("[a-z]{0,4}", 1..40),
		edits in prop::collection::vec((any::<prop::sample::Index>(), "[a-z]{0,4}"), 0..10),
	) {
		let mut edited = texts.clone();
		for (index, text) in edits {
			let slot = index.index(edited.len());
			edited[slot] = text;
		}
		let manager = manager();
		let before = manager.capture(&Texts(texts.clone())).unwrap();
		let after = manager.capture(&Texts(edited.clone())).unwrap();
		let mutations = diff_to_vec(&before, &after, manager.interner().root());

		let interner = manager.interner();
		let expected: Vec<(MutationKind, String)> = texts
			.iter()
			.zip(&edited)
			.enumerate()
			.filter(|(_, (a, b))| a != b)
			.map(|(i, _)| (MutationKind::ReplaceValue, interner.next_key(interner.root(), i, texts.len()).to_string()))
			.collect();
		prop_assert_eq!(summary(&mutations), expected);
	}

	#[test]
	fn list_resizes_touch_only_the_tail(
		before in prop::collection::vec("[a-c]{1,2}", 0..30),
		after in prop::collection::vec("[a-c]{1,2}", 0..30),
	) {
		let manager = manager();
		let old = manager.capture(&List(before.clone())).unwrap();
		let new = manager.capture(&List(after.clone())).unwrap();
		let mutations = diff_to_vec(&old, &new, manager.interner().root());
		let common = before.len().min(after.len());
		let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
		let inserts = mutations.iter().filter(|m| m.kind() == MutationKind::InsertSubtree).count();
		let removes = mutations.iter().filter(|m| m.kind() == MutationKind::RemoveSubtree).count();
		let values = mutations.iter().filter(|m| m.kind() == MutationKind::ReplaceValue).count();
		prop_assert_eq!(inserts, after.len() - common);
		prop_assert_eq!(removes, before.len() - common);
		prop_assert_eq!(values, changed);
		prop_assert_eq!(mutations.len(), inserts + removes + values);
	}
}
