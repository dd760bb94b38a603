//! Stable path keys for dynamic slots.
//!
//! A key is its parent's key followed by a fixed-width group of base-30
//! digits addressing the slot among its siblings. Every key ever minted is
//! interned in a [`KeyInterner`], so equal keys share one allocation and the
//! set of keys accepted from the wire is exactly the set this process built.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Prefix of every minted key; also the key of the root range.
pub const ROOT_PREFIX: &str = "k";

/// Digit alphabet. No vowels, so echoed keys never spell words.
const ALPHABET: &[u8; 30] = b"0123456789bcdfghjklmnpqrstvwxz";
const BASE: usize = ALPHABET.len();

/// An interned slot identity.
///
/// Equality takes a pointer fast path before comparing text.
#[derive(Clone)]
pub struct Key(Arc<str>);

impl Key {
	/// Key text.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// True when both keys are the same interned allocation.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.0, &b.0)
	}

	/// True when `self` is `other` or one of its ancestors.
	pub fn is_prefix_of(&self, other: &str) -> bool {
		other.starts_with(self.as_str())
	}
}

impl PartialEq for Key {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
	}
}

impl Eq for Key {}

impl Hash for Key {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.hash(state);
	}
}

impl Borrow<str> for Key {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl Deref for Key {
	type Target = str;

	fn deref(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Key({:?})", &*self.0)
	}
}

/// Number of digits needed to address `count` siblings. Never less than one.
pub fn digit_width(count: usize) -> usize {
	let mut width = 1;
	let mut reach = BASE;
	while reach < count {
		width += 1;
		reach = reach.saturating_mul(BASE);
	}
	width
}

/// Process-wide cache of minted keys.
///
/// Shared by reference between snapshot builders and session transports;
/// lookups from untrusted input go through [`KeyInterner::resolve_if_known`],
/// which never inserts.
pub struct KeyInterner {
	root: Key,
	keys: RwLock<FxHashSet<Key>>,
}

impl KeyInterner {
	/// Creates an interner holding only the root key.
	pub fn new() -> Self {
		let root = Key(Arc::from(ROOT_PREFIX));
		let mut keys = FxHashSet::default();
		keys.insert(root.clone());
		Self {
			root,
			keys: RwLock::new(keys),
		}
	}

	/// Key of the root range.
	pub fn root(&self) -> &Key {
		&self.root
	}

	/// Mints (or reuses) the key of sibling `index` out of `count` under `parent`.
	pub fn next_key(&self, parent: &Key, index: usize, count: usize) -> Key {
		let width = digit_width(count);
		let mut buf: SmallVec<[u8; 32]> = SmallVec::new();
		buf.extend_from_slice(parent.as_bytes());
		let start = buf.len();
		buf.resize(start + width, ALPHABET[0]);
		let mut rest = index;
		for pos in (start..start + width).rev() {
			buf[pos] = ALPHABET[rest % BASE];
			rest /= BASE;
		}
		let text = std::str::from_utf8(&buf).expect("key bytes are ASCII");
		self.intern(text)
	}

	fn intern(&self, text: &str) -> Key {
		if let Some(key) = self.keys.read().get(text) {
			return key.clone();
		}
		let mut keys = self.keys.write();
		if let Some(key) = keys.get(text) {
			return key.clone();
		}
		let key = Key(Arc::from(text));
		keys.insert(key.clone());
		tracing::trace!(key = text, "dom.key.minted");
		key
	}

	/// Looks up raw wire bytes. Returns `None` for anything not minted here.
	pub fn resolve_if_known(&self, raw: &[u8]) -> Option<Key> {
		let text = std::str::from_utf8(raw).ok()?;
		self.keys.read().get(text).cloned()
	}

	/// Number of interned keys, root included.
	pub fn len(&self) -> usize {
		self.keys.read().len()
	}

	/// Always false: the root key is interned at construction.
	pub fn is_empty(&self) -> bool {
		false
	}
}

impl Default for KeyInterner {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for KeyInterner {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyInterner").field("keys", &self.len()).finish()
	}
}

/// Position of a walker inside one sibling generation.
///
/// Three values are enough to thread a single walker through nested ranges:
/// the parent key, the next sibling index and the sibling count.
#[derive(Debug, Clone)]
pub struct KeyCursor {
	parent: Key,
	position: usize,
	count: usize,
}

impl KeyCursor {
	/// Cursor over `count` children of `parent`.
	pub fn new(parent: Key, count: usize) -> Self {
		Self {
			parent,
			position: 0,
			count,
		}
	}

	/// Restarts at the root generation with no siblings.
	pub fn reset(&mut self, root: &Key) {
		self.parent = root.clone();
		self.position = 0;
		self.count = 0;
	}

	/// Mints the key at the current position and advances. `None` past the last sibling.
	pub fn next_key(&mut self, interner: &KeyInterner) -> Option<Key> {
		if self.position >= self.count {
			return None;
		}
		let key = interner.next_key(&self.parent, self.position, self.count);
		self.position += 1;
		Some(key)
	}

	/// Switches to the children of `parent`, returning the state to restore afterwards.
	pub fn descend_into(&mut self, parent: Key, child_count: usize) -> KeyCursor {
		std::mem::replace(self, Self::new(parent, child_count))
	}

	/// Restores a generation saved by [`KeyCursor::descend_into`].
	pub fn return_to_parent(&mut self, parent: Key, position: usize, sibling_count: usize) {
		self.parent = parent;
		self.position = position;
		self.count = sibling_count;
	}

	/// Splits into `(parent, position, count)`.
	pub fn into_parts(self) -> (Key, usize, usize) {
		(self.parent, self.position, self.count)
	}

	/// Key of the generation's parent.
	pub fn parent(&self) -> &Key {
		&self.parent
	}
}
