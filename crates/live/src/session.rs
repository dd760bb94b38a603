//! Session transport: one remote peer bound to one view.
//!
//! [`Session::run`] drives three loops over a duplex byte stream:
//! * read: parses inbound frames, dispatches events and RPC methods
//! * reconcile: [`Scheduler::run`]
//! * write: drains the outbound mailbox into `Content-Length` frames
//!
//! Inbound EOF or cancellation stops the scheduler, which closes the mailbox;
//! the writer flushes whatever is still queued and shuts the stream down.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use keyhole_dom::{EventArgs, EventHandler, Invocation, KeyInterner, Propagation, SlotPool, SnapshotManager, View, find_handler};
use keyhole_rpc::{ErrorCode, Frame, InboundMessage, JsonRpcProtocol, Protocol, RequestId, Response, ResponseError};
use keyhole_worker::{Mailbox, MailboxSendError, MailboxSendOutcome, TaskClass, join_error_panic_message, panic_message};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::handlers::{TOP_LEVEL_PREFIX, TopLevelHandlers, WindowBinding};
use crate::methods::{MethodResult, MethodTable};
use crate::scheduler::Scheduler;

/// Suffix of inbound event dispatch methods: `<key>.dispatchEvent`.
pub const DISPATCH_SUFFIX: &str = ".dispatchEvent";

/// Configures a [`Session`] before it starts.
pub struct SessionBuilder {
	view: Arc<dyn View>,
	interner: Arc<KeyInterner>,
	config: LiveConfig,
	pool: Option<Arc<SlotPool>>,
	window: TopLevelHandlers,
	methods: MethodTable,
}

impl SessionBuilder {
	/// Shares a slot pool with other sessions instead of creating one.
	pub fn pool(mut self, pool: Arc<SlotPool>) -> Self {
		self.pool = Some(pool);
		self
	}

	/// Binds a window-level event handler.
	pub fn on_window(self, event: &'static str, handler: EventHandler) -> Self {
		self.window.register(event, handler);
		self
	}

	/// Registers an RPC method that may change view state.
	pub fn method(mut self, name: impl Into<String>, f: impl Fn(Vec<Value>) -> MethodResult + Send + Sync + 'static) -> Self {
		self.methods.insert(name, true, f);
		self
	}

	/// Registers a read-only RPC method.
	pub fn query(mut self, name: impl Into<String>, f: impl Fn(Vec<Value>) -> MethodResult + Send + Sync + 'static) -> Self {
		self.methods.insert(name, false, f);
		self
	}

	pub fn build(self) -> Result<Session> {
		self.config.validate()?;
		let pool = self.pool.unwrap_or_else(|| Arc::new(SlotPool::new(self.config.pool_limits())));
		let mailbox = Mailbox::new(self.config.outbound.capacity, self.config.mailbox_policy());
		let scheduler = Scheduler::new(
			Arc::clone(&self.view),
			SnapshotManager::new(pool, Arc::clone(&self.interner)),
			self.config.snapshot_policy,
			self.config.reconcile_interval(),
			mailbox.sender(),
		);
		Ok(Session {
			inner: Arc::new(Inner {
				view: self.view,
				interner: self.interner,
				scheduler,
				window: self.window,
				methods: self.methods,
				propagation: Arc::new(Propagation::default()),
				mailbox,
				max_frame_bytes: self.config.inbound.max_frame_bytes,
			}),
		})
	}
}

struct Inner {
	view: Arc<dyn View>,
	interner: Arc<KeyInterner>,
	scheduler: Scheduler,
	window: TopLevelHandlers,
	methods: MethodTable,
	propagation: Arc<Propagation>,
	mailbox: Mailbox<Frame>,
	max_frame_bytes: usize,
}

/// One connection's worth of state. Cheap to clone.
#[derive(Clone)]
pub struct Session {
	inner: Arc<Inner>,
}

impl Session {
	pub fn builder(view: Arc<dyn View>, interner: Arc<KeyInterner>, config: LiveConfig) -> SessionBuilder {
		SessionBuilder {
			view,
			interner,
			config,
			pool: None,
			window: TopLevelHandlers::new(),
			methods: MethodTable::new(),
		}
	}

	pub fn scheduler(&self) -> &Scheduler {
		&self.inner.scheduler
	}

	/// Full document for the first response of the connection.
	pub fn initial_document(&self) -> Result<String> {
		self.inner.scheduler.render_initial()
	}

	/// Window-level bindings the remote side has to install.
	pub fn window_bindings(&self) -> Vec<WindowBinding> {
		self.inner.window.bindings()
	}

	/// Binds a window-level handler after the session was built.
	pub fn on_window(&self, event: &'static str, handler: EventHandler) -> String {
		self.inner.window.register(event, handler)
	}

	/// Serves one connection until the peer disconnects or `cancel` fires.
	///
	/// A session serves a single connection: the outbound queue is closed
	/// when this returns.
	pub async fn run<R, W>(&self, input: R, output: W, cancel: CancellationToken) -> Result<()>
	where
		R: AsyncBufRead + Unpin + Send,
		W: AsyncWrite + Unpin + Send,
	{
		let stop = cancel.child_token();
		let mut reader = JsonRpcProtocol::new(self.inner.max_frame_bytes);
		let writer = reader.clone();
		let sender = self.inner.mailbox.sender();
		let receiver = self.inner.mailbox.receiver();
		tracing::debug!("live.session.started");

		let read = async {
			let mut input = input;
			let result = loop {
				let message = tokio::select! {
					biased;
					_ = stop.cancelled() => break Ok(()),
					message = reader.read_message(&mut input) => message,
				};
				match message {
					Ok(message) => self.handle_message(message).await,
					Err(err) if JsonRpcProtocol::is_disconnect(&err) => {
						tracing::debug!(%err, "live.session.read.disconnected");
						break Ok(());
					}
					Err(err) if JsonRpcProtocol::is_recoverable(&err) => {
						tracing::warn!(%err, "live.session.read.frame_dropped");
					}
					Err(err) => {
						tracing::error!(%err, "live.session.read.failed");
						break Err(LiveError::from(err));
					}
				}
			};
			stop.cancel();
			result
		};

		let reconcile = async {
			self.inner.scheduler.run(stop.clone()).await;
			sender.close().await;
		};

		let write = async {
			let mut output = output;
			let mut result = Ok(());
			while let Some(frame) = receiver.recv().await {
				if let Err(err) = writer.write_frame(&mut output, &frame).await {
					if JsonRpcProtocol::is_disconnect(&err) {
						tracing::debug!(%err, "live.session.write.disconnected");
					} else {
						tracing::error!(%err, "live.session.write.failed");
						result = Err(LiveError::from(err));
					}
					stop.cancel();
					sender.close().await;
					break;
				}
			}
			if let Err(err) = output.shutdown().await {
				tracing::debug!(%err, "live.session.write.shutdown_failed");
			}
			result
		};

		let (read, (), write) = tokio::join!(read, reconcile, write);
		tracing::debug!(dropped = sender.dropped(), "live.session.stopped");
		read.and(write)
	}

	/// Handles one decoded inbound message, queueing a response when it has an id.
	pub async fn handle_message(&self, message: InboundMessage) {
		let id = message.id;
		let response = match message.method.strip_suffix(DISPATCH_SUFFIX) {
			Some(target) => {
				self.dispatch_event(target, &message.params);
				id.map(|id| Response::ok(id, Value::Null))
			}
			None => self.call_method(&message.method, message.params, id),
		};
		if let Some(response) = response {
			self.respond(response).await;
		}
	}

	/// Dispatches `[payload, eventId, level?]` to the handler bound at `target`.
	///
	/// Returns whether a handler was invoked. Suppressed dispatches and
	/// unknown keys are logged and ignored.
	pub fn dispatch_event(&self, target: &str, params: &[Value]) -> bool {
		let payload = params.first().cloned().unwrap_or(Value::Null);
		let event_id = params.get(1).and_then(Value::as_u64).unwrap_or(0);
		let level = params.get(2).and_then(Value::as_u64).and_then(|level| u32::try_from(level).ok()).unwrap_or(0);

		if self.inner.propagation.is_suppressed(event_id, level) {
			tracing::debug!(key = target, event_id, level, "live.session.dispatch.suppressed");
			return false;
		}
		let Some(handler) = self.resolve_handler(target) else {
			tracing::warn!(key = target, event_id, "live.session.dispatch.unknown_key");
			return false;
		};
		tracing::trace!(key = target, event_id, level, ?handler, "live.session.dispatch");
		self.invoke(handler, EventArgs::new(payload, event_id, level, Arc::clone(&self.inner.propagation)));
		true
	}

	/// Looks a wire key up in the top-level table or the current render.
	pub fn resolve_handler(&self, target: &str) -> Option<EventHandler> {
		if target.starts_with(TOP_LEVEL_PREFIX) {
			return self.inner.window.resolve(target);
		}
		let key = self.inner.interner.resolve_if_known(target.as_bytes())?;
		find_handler(self.inner.view.as_ref(), &self.inner.interner, &key)
	}

	fn invoke(&self, handler: EventHandler, args: EventArgs) {
		let scheduler = self.inner.scheduler.clone();
		scheduler.invalidate();
		match catch_unwind(AssertUnwindSafe(|| handler.invoke(args))) {
			Ok(Invocation::Done(result)) => {
				if let Err(err) = result {
					tracing::warn!(error = %format!("{err:#}"), "live.session.handler.failed");
				}
				scheduler.update();
			}
			Ok(Invocation::Pending(task)) => {
				keyhole_worker::spawn(TaskClass::Interactive, async move {
					match keyhole_worker::spawn(TaskClass::Interactive, task).await {
						Ok(Ok(())) => {}
						Ok(Err(err)) => tracing::warn!(error = %format!("{err:#}"), "live.session.handler.failed"),
						Err(err) => {
							if let Some(message) = join_error_panic_message(err) {
								tracing::warn!(panic = %message, "live.session.handler.panicked");
							}
						}
					}
					scheduler.update();
				});
			}
			Err(payload) => {
				tracing::warn!(panic = %panic_message(payload.as_ref()), "live.session.handler.panicked");
				scheduler.update();
			}
		}
	}

	/// Calls an RPC method. `None` for notifications.
	pub fn call_method(&self, name: &str, params: Vec<Value>, id: Option<RequestId>) -> Option<Response> {
		let Some(method) = self.inner.methods.get(name) else {
			tracing::warn!(method = name, "live.session.method.unknown");
			return id.map(|id| Response::err(id, ResponseError::new(ErrorCode::METHOD_NOT_FOUND, format!("unknown method {name}"))));
		};

		let mutating = method.is_mutating();
		if mutating {
			self.inner.scheduler.invalidate();
		}
		let outcome = catch_unwind(AssertUnwindSafe(|| method.call(params)));
		if mutating {
			self.inner.scheduler.update();
		}

		let result = match outcome {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err)) => {
				tracing::warn!(method = name, error = %format!("{err:#}"), "live.session.method.failed");
				Err(ResponseError::new(ErrorCode::INTERNAL_ERROR, format!("{err:#}")))
			}
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				tracing::warn!(method = name, panic = %message, "live.session.method.panicked");
				Err(ResponseError::new(ErrorCode::INTERNAL_ERROR, message))
			}
		};
		id.map(|id| match result {
			Ok(value) => Response::ok(id, value),
			Err(error) => Response::err(id, error),
		})
	}

	async fn respond(&self, response: Response) {
		let body = match serde_json::to_vec(&response) {
			Ok(body) => body,
			Err(err) => {
				tracing::error!(%err, id = %response.id, "live.session.response.encode_failed");
				return;
			}
		};
		match self.inner.mailbox.sender().send(Frame::single(body)).await {
			Ok(MailboxSendOutcome::Enqueued) => {}
			Ok(MailboxSendOutcome::DroppedNewest) => tracing::warn!(id = %response.id, "live.session.response.dropped"),
			Err(MailboxSendError::Closed | MailboxSendError::Full) => tracing::debug!(id = %response.id, "live.session.response.closed"),
		}
	}
}

#[cfg(test)]
mod tests;
