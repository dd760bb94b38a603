//! Flat render snapshots and their reconciliation.
//!
//! A [`View`] is rendered through the [`Compose`] visitor into a [`Snapshot`]:
//! one contiguous arena of [`Slot`]s where every sub-range is addressed by
//! `(start, len)` and every dynamic position carries a stable path [`Key`]
//! minted by a shared [`KeyInterner`]. Two snapshots of the same view are
//! compared by [`diff()`], which reports the minimal [`Mutation`]s needed to
//! bring a remote copy of the first up to date with the second.

pub mod compose;
pub mod diff;
pub mod error;
mod find;
pub mod handler;
pub mod html;
pub mod key;
pub mod scalar;
pub mod slot;
pub mod snapshot;

pub use compose::{Compose, View};
pub use diff::{Fragment, Mutation, MutationKind, PatchSink, diff, diff_to_vec};
pub use error::{DomError, Result};
pub use find::find_handler;
pub use handler::{BoxFutureSend, EventArgs, EventHandler, HandlerResult, Invocation, Propagation};
pub use key::{Key, KeyCursor, KeyInterner};
pub use scalar::{Scalar, ScalarKind};
pub use slot::{ChildRange, Slot, SlotKind};
pub use snapshot::{PoolLimits, SlotPool, Snapshot, SnapshotManager};
