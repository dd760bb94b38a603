//! Reconcile scheduler.
//!
//! Handlers bracket every model change with [`Scheduler::invalidate`] and
//! [`Scheduler::update`]. The loop in [`Scheduler::run`] waits out the
//! reconcile interval, then waits for a pending update, then runs one
//! reconciliation: capture "after", diff against "before", queue the batch.
//!
//! ```text
//! Idle --invalidate--> Invalidated --reconcile--> Reconciling --> Idle
//!                                                   |  ^
//!                          invalidate while running +--+ (next cycle due)
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use keyhole_dom::{Snapshot, SnapshotManager, View, diff, html};
use keyhole_rpc::Frame;
use keyhole_worker::{MailboxSendError, MailboxSendOutcome, MailboxSender};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::batch::MutationBatch;
use crate::config::SnapshotPolicy;
use crate::error::Result;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// Nothing changed since the last cycle.
	Idle,
	/// A change is in flight or done and not yet reconciled.
	Invalidated,
	/// A cycle is running.
	Reconciling,
}

/// What one call to [`Scheduler::reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
	/// No invalidation since the last cycle.
	Skipped,
	/// The view re-rendered identically.
	Clean,
	/// One batch was queued.
	Sent {
		/// Mutations in the batch.
		mutations: usize,
	},
	/// Rendering failed or the batch could not be queued.
	Dropped,
}

struct State {
	phase: Phase,
	/// Invalidated while reconciling.
	redirty: bool,
	/// A batch was lost and the next cycle has not been armed yet.
	retry: bool,
	/// The peer's copy is unknown until a full replace lands.
	resync: bool,
	/// What the remote side currently shows, when known.
	before: Option<Snapshot>,
}

struct Shared {
	view: Arc<dyn View>,
	snapshots: SnapshotManager,
	policy: SnapshotPolicy,
	interval: Duration,
	outbound: MailboxSender<Frame>,
	state: Mutex<State>,
	pending: Notify,
	reconciliations: AtomicU64,
}

/// Drives reconciliation of one view towards one remote peer.
#[derive(Clone)]
pub struct Scheduler {
	shared: Arc<Shared>,
}

impl Scheduler {
	pub fn new(view: Arc<dyn View>, snapshots: SnapshotManager, policy: SnapshotPolicy, interval: Duration, outbound: MailboxSender<Frame>) -> Self {
		Self {
			shared: Arc::new(Shared {
				view,
				snapshots,
				policy,
				interval,
				outbound,
				state: Mutex::new(State {
					phase: Phase::Idle,
					redirty: false,
					retry: false,
					resync: false,
					before: None,
				}),
				pending: Notify::new(),
				reconciliations: AtomicU64::new(0),
			}),
		}
	}

	pub fn phase(&self) -> Phase {
		self.shared.state.lock().phase
	}

	pub fn policy(&self) -> SnapshotPolicy {
		self.shared.policy
	}

	/// Cycles that rendered, whatever their outcome.
	pub fn reconciliations(&self) -> u64 {
		self.shared.reconciliations.load(Ordering::Relaxed)
	}

	/// Marks the view as about to change.
	///
	/// Under [`SnapshotPolicy::Recapture`] this renders the "before" snapshot
	/// on the caller, so it must run before the model is touched. Nothing is
	/// captured while a full resync is pending.
	pub fn invalidate(&self) {
		let capture = {
			let mut state = self.shared.state.lock();
			match state.phase {
				Phase::Idle => state.phase = Phase::Invalidated,
				Phase::Invalidated => {}
				Phase::Reconciling => state.redirty = true,
			}
			self.shared.policy == SnapshotPolicy::Recapture && state.before.is_none() && !state.resync
		};
		if !capture {
			return;
		}
		match self.shared.snapshots.capture(self.shared.view.as_ref()) {
			Ok(snapshot) => {
				let mut state = self.shared.state.lock();
				if state.before.is_none() && !state.resync {
					state.before = Some(snapshot);
				}
			}
			Err(err) => tracing::warn!(%err, "live.invalidate.capture_failed"),
		}
	}

	/// Signals that a reconciliation is due. Calls coalesce until the loop
	/// picks the signal up.
	pub fn update(&self) {
		self.shared.pending.notify_one();
	}

	/// Renders the full initial document.
	///
	/// Under [`SnapshotPolicy::Retain`] the rendered snapshot becomes the
	/// "before" of the next cycle.
	pub fn render_initial(&self) -> Result<String> {
		let snapshot = self.shared.snapshots.capture(self.shared.view.as_ref())?;
		let document = html::render_document(&snapshot, self.shared.snapshots.interner().root());
		tracing::debug!(slots = snapshot.len(), bytes = document.len(), "live.initial_document");
		if self.shared.policy == SnapshotPolicy::Retain {
			self.shared.state.lock().before = Some(snapshot);
		}
		Ok(document)
	}

	/// Runs reconcile cycles at most once per interval until `cancel` fires.
	///
	/// A cycle that has started runs to completion before the loop stops.
	pub async fn run(&self, cancel: CancellationToken) {
		let mut next_allowed = Instant::now();
		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep_until(next_allowed) => {}
			}
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = self.shared.pending.notified() => {}
			}
			let started = Instant::now();
			let outcome = self.reconcile().await;
			tracing::trace!(?outcome, "live.reconcile.cycle");
			next_allowed = started + self.shared.interval;
		}
		tracing::debug!(reconciliations = self.reconciliations(), "live.scheduler.stopped");
	}

	/// Runs one cycle now, regardless of the interval.
	pub async fn reconcile(&self) -> ReconcileOutcome {
		let before = {
			let mut state = self.shared.state.lock();
			if state.phase != Phase::Invalidated {
				tracing::debug!(phase = ?state.phase, "live.reconcile.skipped");
				return ReconcileOutcome::Skipped;
			}
			state.phase = Phase::Reconciling;
			state.redirty = false;
			let before = state.before.take();
			if state.resync { None } else { before }
		};

		let outcome = self.cycle(before).await;
		self.shared.reconciliations.fetch_add(1, Ordering::Relaxed);

		let mut state = self.shared.state.lock();
		let due = std::mem::take(&mut state.redirty) | std::mem::take(&mut state.retry);
		if due {
			state.phase = Phase::Invalidated;
			drop(state);
			self.shared.pending.notify_one();
		} else {
			state.phase = Phase::Idle;
		}
		outcome
	}

	async fn cycle(&self, before: Option<Snapshot>) -> ReconcileOutcome {
		let snapshots = &self.shared.snapshots;
		let after = match snapshots.capture(self.shared.view.as_ref()) {
			Ok(after) => after,
			Err(err) => {
				tracing::error!(%err, "live.reconcile.render_failed");
				let mut state = self.shared.state.lock();
				state.before = state.before.take().or(before);
				return ReconcileOutcome::Dropped;
			}
		};

		let fallback;
		let previous = match &before {
			Some(before) => before,
			None => {
				fallback = snapshots.acquire();
				&fallback
			}
		};
		let mut batch = MutationBatch::new();
		if let Err(err) = diff(previous, &after, snapshots.interner().root(), &mut batch) {
			tracing::error!(%err, "live.reconcile.encode_failed");
			let mut state = self.shared.state.lock();
			state.before = state.before.take().or(before);
			return ReconcileOutcome::Dropped;
		}
		drop(before);

		let mutations = batch.len();
		let Some(frame) = batch.commit() else {
			tracing::trace!("live.reconcile.clean");
			self.retain(after);
			return ReconcileOutcome::Clean;
		};

		match self.shared.outbound.send(frame).await {
			Ok(MailboxSendOutcome::Enqueued) => {
				tracing::debug!(mutations, "live.reconcile.sent");
				self.shared.state.lock().resync = false;
				self.retain(after);
				ReconcileOutcome::Sent { mutations }
			}
			Ok(MailboxSendOutcome::DroppedNewest) => {
				// The peer never sees this batch; only a full replace can resync it.
				tracing::warn!(mutations, dropped = self.shared.outbound.dropped(), "live.reconcile.frame_dropped");
				let mut state = self.shared.state.lock();
				state.before = None;
				state.retry = true;
				state.resync = true;
				ReconcileOutcome::Dropped
			}
			Err(MailboxSendError::Closed | MailboxSendError::Full) => {
				tracing::debug!(mutations, "live.reconcile.outbound_closed");
				ReconcileOutcome::Dropped
			}
		}
	}

	fn retain(&self, after: Snapshot) {
		if self.shared.policy == SnapshotPolicy::Retain {
			self.shared.state.lock().before = Some(after);
		}
	}
}

impl fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scheduler")
			.field("phase", &self.phase())
			.field("policy", &self.shared.policy)
			.field("interval", &self.shared.interval)
			.field("reconciliations", &self.reconciliations())
			.finish()
	}
}
