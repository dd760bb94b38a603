//! Event handler callbacks and DOM-style propagation state.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Outcome of a handler body.
pub type HandlerResult = anyhow::Result<()>;

/// Boxed `Send` future returned by async handlers.
pub type BoxFutureSend<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type ActionFn = dyn Fn() -> HandlerResult + Send + Sync;
type EventFn = dyn Fn(&EventArgs) -> HandlerResult + Send + Sync;
type TaskFn = dyn Fn() -> BoxFutureSend<HandlerResult> + Send + Sync;
type EventTaskFn = dyn Fn(EventArgs) -> BoxFutureSend<HandlerResult> + Send + Sync;

/// A callback bound to an event slot or a top-level event.
#[derive(Clone)]
pub enum EventHandler {
	/// Synchronous, ignores the event.
	Action(Arc<ActionFn>),
	/// Synchronous, reads the event.
	Event(Arc<EventFn>),
	/// Asynchronous, ignores the event.
	Task(Arc<TaskFn>),
	/// Asynchronous, owns the event.
	EventTask(Arc<EventTaskFn>),
}

impl EventHandler {
	pub fn action(f: impl Fn() -> HandlerResult + Send + Sync + 'static) -> Self {
		Self::Action(Arc::new(f))
	}

	pub fn event(f: impl Fn(&EventArgs) -> HandlerResult + Send + Sync + 'static) -> Self {
		Self::Event(Arc::new(f))
	}

	pub fn task<F, Fut>(f: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		Self::Task(Arc::new(move || Box::pin(f()) as BoxFutureSend<HandlerResult>))
	}

	pub fn event_task<F, Fut>(f: F) -> Self
	where
		F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		Self::EventTask(Arc::new(move |args| Box::pin(f(args)) as BoxFutureSend<HandlerResult>))
	}

	/// True for the variants that return a future.
	pub fn is_async(&self) -> bool {
		matches!(self, Self::Task(_) | Self::EventTask(_))
	}

	/// Calls the handler. Sync variants run to completion here; async ones
	/// hand back their future unpolled.
	pub fn invoke(&self, args: EventArgs) -> Invocation {
		match self {
			Self::Action(f) => Invocation::Done(f()),
			Self::Event(f) => Invocation::Done(f(&args)),
			Self::Task(f) => Invocation::Pending(f()),
			Self::EventTask(f) => Invocation::Pending(f(args)),
		}
	}
}

impl fmt::Debug for EventHandler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Action(_) => "Action",
			Self::Event(_) => "Event",
			Self::Task(_) => "Task",
			Self::EventTask(_) => "EventTask",
		};
		write!(f, "EventHandler::{name}")
	}
}

/// Result of [`EventHandler::invoke`].
pub enum Invocation {
	/// The handler already ran.
	Done(HandlerResult),
	/// The handler's future, to be driven by the caller.
	Pending(BoxFutureSend<HandlerResult>),
}

/// Arguments delivered with one dispatched event.
#[derive(Debug, Clone)]
pub struct EventArgs {
	/// Event payload as sent by the remote side.
	pub payload: Value,
	/// Remote-assigned event id, shared by every dispatch of one event.
	pub event_id: u64,
	/// Bubbling depth of this dispatch.
	pub level: u32,
	propagation: Arc<Propagation>,
}

impl EventArgs {
	pub fn new(payload: Value, event_id: u64, level: u32, propagation: Arc<Propagation>) -> Self {
		Self {
			payload,
			event_id,
			level,
			propagation,
		}
	}

	/// Stops dispatches of this event at deeper levels.
	pub fn stop_propagation(&self) {
		self.propagation.stop(self.event_id, self.level);
	}

	/// Stops every further dispatch of this event.
	pub fn stop_immediate_propagation(&self) {
		self.propagation.stop_immediate(self.event_id);
	}
}

/// Per-session suppression record.
///
/// Holds at most one `(event_id, level)` pair; dispatches of that event at
/// or past the recorded level are dropped.
#[derive(Debug, Default)]
pub struct Propagation {
	suppressed: Mutex<Option<(u64, u32)>>,
}

impl Propagation {
	pub fn stop(&self, event_id: u64, level: u32) {
		*self.suppressed.lock() = Some((event_id, level.saturating_add(1)));
	}

	pub fn stop_immediate(&self, event_id: u64) {
		*self.suppressed.lock() = Some((event_id, 0));
	}

	pub fn is_suppressed(&self, event_id: u64, level: u32) -> bool {
		matches!(*self.suppressed.lock(), Some((id, from)) if id == event_id && level >= from)
	}
}
