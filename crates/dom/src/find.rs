//! Handler lookup by re-walking a view.
//!
//! Element-scoped handlers are not stored anywhere between renders; a
//! dispatch re-runs the renderer in a mode that writes nothing, skips every
//! subtree whose key is not an ancestor of the target, and stops as soon as
//! the target key is produced.

use crate::compose::{Target, View, Walker};
use crate::error::Result;
use crate::handler::EventHandler;
use crate::key::{Key, KeyInterner};
use crate::slot::{ChildRange, Slot, SlotKind};

struct Finder<'k> {
	needle: &'k Key,
	next_free: usize,
	found: Option<EventHandler>,
	done: bool,
}

impl Target for Finder<'_> {
	fn reserve(&mut self, len: usize) -> Result<usize> {
		let start = self.next_free;
		self.next_free += len;
		Ok(start)
	}

	fn put(&mut self, _index: usize, slot: Slot) {
		if slot.key() != Some(self.needle) {
			return;
		}
		self.done = true;
		if slot.kind() == SlotKind::Event {
			self.found = slot.handler().cloned();
		}
	}

	fn set_range(&mut self, _index: usize, _range: ChildRange) {}

	fn wants(&self, key: &Key) -> bool {
		key.is_prefix_of(self.needle)
	}

	fn finished(&self) -> bool {
		self.done
	}
}

/// Returns the handler bound at `key` in the current render of `view`.
///
/// `None` when the key is absent, bound to something other than an event,
/// or the render is malformed before reaching it.
pub fn find_handler(view: &dyn View, interner: &KeyInterner, key: &Key) -> Option<EventHandler> {
	let finder = Finder {
		needle: key,
		next_free: 1,
		found: None,
		done: false,
	};
	let (finder, result) = Walker::new(finder, interner).walk(view);
	if let Err(err) = result
		&& !finder.done
	{
		tracing::debug!(%key, %err, "dom.find.render_failed");
	}
	finder.found
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::compose::Compose;
	use crate::handler::{EventArgs, Invocation, Propagation};
	use crate::scalar::Scalar;

	struct Buttons {
		clicks: Arc<AtomicUsize>,
	}

	impl View for Buttons {
		fn render(&self, out: &mut dyn Compose) {
			out.begin_range(3, 2);
			out.literal("<div>");
			out.value(Scalar::from("title"), None);
			out.literal("");
			out.each(3, None, &mut |i: usize, out: &mut dyn Compose| {
				let clicks = Arc::clone(&self.clicks);
				out.begin_range(2, 1);
				out.literal("<button");
				out.event(
					"click",
					EventHandler::action(move || {
						clicks.fetch_add(i + 1, Ordering::SeqCst);
						Ok(())
					}),
				);
				out.literal(">+</button>");
			});
			out.literal("</div>");
		}
	}

	#[test]
	fn finds_item_handler_by_key() {
		let clicks = Arc::new(AtomicUsize::new(0));
		let view = Buttons {
			clicks: Arc::clone(&clicks),
		};
		let interner = KeyInterner::new();
		let group = interner.next_key(interner.root(), 1, 2);
		let item = interner.next_key(&group, 2, 3);
		let key = interner.next_key(&item, 0, 1);
		assert_eq!(key.as_str(), "k120");

		let handler = find_handler(&view, &interner, &key).unwrap();
		let args = EventArgs::new(serde_json::Value::Null, 1, 0, Arc::new(Propagation::default()));
		assert!(matches!(handler.invoke(args), Invocation::Done(Ok(()))));
		assert_eq!(clicks.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn non_event_keys_yield_nothing() {
		let view = Buttons {
			clicks: Arc::new(AtomicUsize::new(0)),
		};
		let interner = KeyInterner::new();
		let value = interner.next_key(interner.root(), 0, 2);
		assert!(find_handler(&view, &interner, &value).is_none());
		let missing = interner.next_key(interner.root(), 5, 30);
		assert!(find_handler(&view, &interner, &missing).is_none());
	}
}
