//! Window and document scoped handlers.
//!
//! Unlike element handlers these are not part of the rendered tree, so they
//! live in an append-only table and are addressed as `g<index>`. The prefix
//! lies outside the minted key space.

use keyhole_dom::EventHandler;
use parking_lot::RwLock;

/// Key prefix of top-level handlers.
pub const TOP_LEVEL_PREFIX: char = 'g';

/// One registered top-level binding.
#[derive(Debug, Clone)]
pub struct WindowBinding {
	/// Wire key, `g<index>`.
	pub key: String,
	/// DOM event name the remote side listens for.
	pub event: &'static str,
}

#[derive(Debug, Default)]
pub struct TopLevelHandlers {
	entries: RwLock<Vec<(&'static str, EventHandler)>>,
}

impl TopLevelHandlers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a handler and returns its key.
	pub fn register(&self, event: &'static str, handler: EventHandler) -> String {
		let mut entries = self.entries.write();
		let key = format!("{TOP_LEVEL_PREFIX}{}", entries.len());
		entries.push((event, handler));
		tracing::debug!(%key, event, "live.window.registered");
		key
	}

	/// Looks up a `g<index>` key. Anything else resolves to `None`.
	pub fn resolve(&self, key: &str) -> Option<EventHandler> {
		let digits = key.strip_prefix(TOP_LEVEL_PREFIX)?;
		if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
			return None;
		}
		let index: usize = digits.parse().ok()?;
		self.entries.read().get(index).map(|(_, handler)| handler.clone())
	}

	/// Bindings in registration order, for the initial document.
	pub fn bindings(&self) -> Vec<WindowBinding> {
		self.entries
			.read()
			.iter()
			.enumerate()
			.map(|(index, (event, _))| WindowBinding {
				key: format!("{TOP_LEVEL_PREFIX}{index}"),
				event,
			})
			.collect()
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_follow_registration_order() {
		let table = TopLevelHandlers::new();
		assert_eq!(table.register("resize", EventHandler::action(|| Ok(()))), "g0");
		assert_eq!(table.register("keydown", EventHandler::action(|| Ok(()))), "g1");
		let bindings = table.bindings();
		assert_eq!(bindings.len(), 2);
		assert_eq!((bindings[1].key.as_str(), bindings[1].event), ("g1", "keydown"));
	}

	#[test]
	fn malformed_keys_do_not_resolve() {
		let table = TopLevelHandlers::new();
		table.register("resize", EventHandler::action(|| Ok(())));
		assert!(table.resolve("g0").is_some());
		assert!(table.resolve("g1").is_none());
		assert!(table.resolve("g").is_none());
		assert!(table.resolve("g+0").is_none());
		assert!(table.resolve("k0").is_none());
	}
}
