/// Execution classes used for spawned session work and its log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Event handler work that directly affects what the remote renderer shows next.
	Interactive,
	/// Connection plumbing and RPC methods that can lag behind interactive work.
	Background,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}
