//! Live sessions: keep a remote copy of a [`keyhole_dom::View`] in sync.
//!
//! * [`Session`]: per-connection transport, event dispatch and RPC methods
//! * [`Scheduler`]: invalidate/update bracketing and rate-limited reconciliation
//! * [`MutationBatch`]: diff output framed as one JSON-RPC notification array
//! * [`LiveConfig`]: TOML-loadable tunables

pub mod batch;
pub mod config;
mod error;
pub mod handlers;
pub mod methods;
pub mod scheduler;
pub mod session;

pub use batch::MutationBatch;
pub use config::{LiveConfig, OverflowPolicy, SnapshotPolicy};
pub use error::{LiveError, Result};
pub use handlers::{TopLevelHandlers, WindowBinding};
pub use methods::{MethodResult, MethodTable};
pub use scheduler::{Phase, ReconcileOutcome, Scheduler};
pub use session::{DISPATCH_SUFFIX, Session, SessionBuilder};
