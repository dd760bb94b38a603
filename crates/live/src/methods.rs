//! RPC methods callable by the remote side.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Outcome of an RPC method.
pub type MethodResult = anyhow::Result<Value>;

type MethodFn = dyn Fn(Vec<Value>) -> MethodResult + Send + Sync;

/// Built-in liveness check; answers `"pong"`.
pub const PING: &str = "session.ping";

#[derive(Clone)]
pub struct Method {
	f: Arc<MethodFn>,
	mutating: bool,
}

impl Method {
	/// Whether calling this method may change view state.
	pub fn is_mutating(&self) -> bool {
		self.mutating
	}

	pub fn call(&self, params: Vec<Value>) -> MethodResult {
		(self.f)(params)
	}
}

impl fmt::Debug for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Method").field("mutating", &self.mutating).finish_non_exhaustive()
	}
}

/// Dotted method name to callback.
#[derive(Debug, Clone)]
pub struct MethodTable {
	entries: FxHashMap<String, Method>,
}

impl MethodTable {
	/// A table holding only the built-ins.
	pub fn new() -> Self {
		let mut table = Self {
			entries: FxHashMap::default(),
		};
		table.insert(PING, false, |_| Ok(Value::from("pong")));
		table
	}

	/// Registers `f` under `name`, replacing any previous entry.
	///
	/// Mutating methods are bracketed by invalidate/update like event handlers.
	pub fn insert(&mut self, name: impl Into<String>, mutating: bool, f: impl Fn(Vec<Value>) -> MethodResult + Send + Sync + 'static) {
		let name = name.into();
		if self
			.entries
			.insert(
				name.clone(),
				Method {
					f: Arc::new(f),
					mutating,
				},
			)
			.is_some()
		{
			tracing::debug!(method = %name, "live.method.replaced");
		}
	}

	pub fn get(&self, name: &str) -> Option<&Method> {
		self.entries.get(name)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl Default for MethodTable {
	fn default() -> Self {
		Self::new()
	}
}
