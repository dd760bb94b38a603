//! Bounded FIFO mailbox with an explicit overflow policy.
//!
//! Session outbound queues use this so a slow remote peer never grows memory
//! without bound: either senders wait ([`MailboxPolicy::Backpressure`]) or the
//! incoming item is discarded ([`MailboxPolicy::DropNewest`]).

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify};

/// Overflow policy for a bounded mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxPolicy {
	/// Wait for capacity when full.
	Backpressure,
	/// Drop the newest message when full.
	DropNewest,
}

/// Outcome from enqueueing a mailbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendOutcome {
	/// Message was enqueued.
	Enqueued,
	/// Message was dropped because policy is drop-newest and queue was full.
	DroppedNewest,
}

/// Mailbox send error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendError {
	/// Mailbox is closed.
	Closed,
	/// Queue is full and non-blocking send was used.
	Full,
}

struct MailboxState<T> {
	queue: VecDeque<T>,
	closed: bool,
}

struct MailboxInner<T> {
	capacity: usize,
	policy: MailboxPolicy,
	dropped: AtomicU64,
	state: Mutex<MailboxState<T>>,
	notify_recv: Notify,
	notify_send: Notify,
}

/// Multi-producer mailbox sender.
pub struct MailboxSender<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Mailbox receiver.
pub struct MailboxReceiver<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Bounded mailbox primitive.
pub struct Mailbox<T> {
	inner: Arc<MailboxInner<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Clone for MailboxReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Mailbox<T> {
	/// Creates a bounded mailbox.
	pub fn new(capacity: usize, policy: MailboxPolicy) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		Self {
			inner: Arc::new(MailboxInner {
				capacity,
				policy,
				dropped: AtomicU64::new(0),
				state: Mutex::new(MailboxState {
					queue: VecDeque::with_capacity(capacity),
					closed: false,
				}),
				notify_recv: Notify::new(),
				notify_send: Notify::new(),
			}),
		}
	}

	/// Returns a sender handle.
	pub fn sender(&self) -> MailboxSender<T> {
		MailboxSender {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Returns a receiver handle.
	pub fn receiver(&self) -> MailboxReceiver<T> {
		MailboxReceiver {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Returns mailbox policy.
	pub fn policy(&self) -> MailboxPolicy {
		self.inner.policy
	}
}

impl<T> MailboxSender<T> {
	/// Requests mailbox closure. Receivers drain existing items then return `None`.
	pub async fn close(&self) {
		let mut state = self.inner.state.lock().await;
		state.closed = true;
		drop(state);
		self.inner.notify_recv.notify_waiters();
		self.inner.notify_send.notify_waiters();
	}

	/// Non-blocking enqueue.
	pub async fn try_send(&self, msg: T) -> Result<MailboxSendOutcome, MailboxSendError> {
		let mut state = self.inner.state.lock().await;
		enqueue_with_policy(&self.inner, &mut state, msg)
	}

	/// Enqueue honoring policy (`Backpressure` waits for capacity).
	pub async fn send(&self, msg: T) -> Result<MailboxSendOutcome, MailboxSendError> {
		if self.inner.policy == MailboxPolicy::Backpressure {
			loop {
				// Register before checking capacity so a pop between unlock and await is not lost.
				let notified = self.inner.notify_send.notified();

				let mut state = self.inner.state.lock().await;
				if state.closed {
					return Err(MailboxSendError::Closed);
				}
				if state.queue.len() < self.inner.capacity {
					state.queue.push_back(msg);
					self.inner.notify_recv.notify_one();
					return Ok(MailboxSendOutcome::Enqueued);
				}
				drop(state);
				notified.await;
			}
		}

		let mut state = self.inner.state.lock().await;
		enqueue_with_policy(&self.inner, &mut state, msg)
	}

	/// Returns current queue length.
	pub async fn len(&self) -> usize {
		self.inner.state.lock().await.queue.len()
	}

	/// Returns queue capacity.
	pub fn capacity(&self) -> usize {
		self.inner.capacity
	}

	/// Total number of messages discarded by the drop-newest policy.
	pub fn dropped(&self) -> u64 {
		self.inner.dropped.load(Ordering::Relaxed)
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives one message. Returns `None` once mailbox is closed and drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let notified = self.inner.notify_recv.notified();
			let mut state = self.inner.state.lock().await;
			if let Some(msg) = state.queue.pop_front() {
				drop(state);
				self.inner.notify_send.notify_one();
				return Some(msg);
			}
			if state.closed {
				return None;
			}
			drop(state);
			notified.await;
		}
	}

	/// Returns current queue length.
	pub async fn len(&self) -> usize {
		self.inner.state.lock().await.queue.len()
	}
}

fn enqueue_with_policy<T>(inner: &MailboxInner<T>, state: &mut MailboxState<T>, msg: T) -> Result<MailboxSendOutcome, MailboxSendError> {
	if state.closed {
		return Err(MailboxSendError::Closed);
	}

	if state.queue.len() < inner.capacity {
		state.queue.push_back(msg);
		inner.notify_recv.notify_one();
		return Ok(MailboxSendOutcome::Enqueued);
	}

	match inner.policy {
		MailboxPolicy::Backpressure => Err(MailboxSendError::Full),
		MailboxPolicy::DropNewest => {
			inner.dropped.fetch_add(1, Ordering::Relaxed);
			Ok(MailboxSendOutcome::DroppedNewest)
		}
	}
}
