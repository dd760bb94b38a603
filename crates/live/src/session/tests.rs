use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use keyhole_dom::{Compose, Scalar};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::scheduler::Phase;

#[derive(Default)]
struct Model {
	clicks: AtomicUsize,
}

fn button(model: &Arc<Model>) -> Arc<dyn View> {
	let model = Arc::clone(model);
	Arc::new(move |out: &mut dyn Compose| {
		out.begin_range(3, 2);
		out.literal("<button");
		let clicked = Arc::clone(&model);
		out.event(
			"click",
			EventHandler::action(move || {
				clicked.clicks.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}),
		);
		out.literal(">");
		out.value(Scalar::from(model.clicks.load(Ordering::SeqCst)), None);
		out.literal("</button>");
	})
}

fn session(model: &Arc<Model>) -> SessionBuilder {
	Session::builder(button(model), Arc::new(KeyInterner::new()), LiveConfig::default())
}

#[test]
fn initial_document_exposes_event_keys() {
	let model = Arc::new(Model::default());
	let session = session(&model).build().unwrap();
	assert_eq!(
		session.initial_document().unwrap(),
		"<!--k--><button data-kh-onclick=\"k0\"><!--k1-->0<!--/k1--></button><!--/k-->"
	);
}

#[test]
fn element_dispatch_invokes_bound_handler() {
	let model = Arc::new(Model::default());
	let session = session(&model).build().unwrap();
	session.initial_document().unwrap();

	assert!(session.dispatch_event("k0", &[json!({"type": "click"}), json!(1)]));
	assert_eq!(model.clicks.load(Ordering::SeqCst), 1);
	assert_eq!(session.scheduler().phase(), Phase::Invalidated);
}

#[test]
fn unknown_and_non_event_keys_are_ignored() {
	let model = Arc::new(Model::default());
	let session = session(&model).build().unwrap();
	session.initial_document().unwrap();

	assert!(!session.dispatch_event("k9", &[json!(null), json!(1)]));
	assert!(!session.dispatch_event("k1", &[json!(null), json!(2)]));
	assert!(!session.dispatch_event("g0", &[json!(null), json!(3)]));
	assert!(!session.dispatch_event("", &[]));
	assert_eq!(model.clicks.load(Ordering::SeqCst), 0);
	assert_eq!(session.scheduler().phase(), Phase::Idle);
}

#[derive(Clone, Default)]
struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

impl io::Write for Captured {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

#[test]
fn dispatch_events_log_under_the_crate_prefix() {
	let model = Arc::new(Model::default());
	let session = session(&model).build().unwrap();
	let captured = Captured::default();
	let subscriber = tracing_subscriber::fmt()
		.with_ansi(false)
		.with_writer({
			let captured = captured.clone();
			move || captured.clone()
		})
		.finish();

	tracing::subscriber::with_default(subscriber, || {
		assert!(!session.dispatch_event("k9", &[json!(null), json!(1)]));
	});

	let logs = String::from_utf8(captured.0.lock().clone()).unwrap();
	assert!(logs.contains("live.session.dispatch.unknown_key"), "{logs}");
}

#[test]
fn stop_propagation_suppresses_deeper_dispatch() {
	let model = Arc::new(Model::default());
	let calls = Arc::new(AtomicUsize::new(0));
	let session = session(&model)
		.on_window("click", {
			let calls = Arc::clone(&calls);
			EventHandler::event(move |args| {
				calls.fetch_add(1, Ordering::SeqCst);
				args.stop_propagation();
				Ok(())
			})
		})
		.build()
		.unwrap();

	assert!(session.dispatch_event("g0", &[json!(null), json!(5), json!(0)]));
	assert!(!session.dispatch_event("g0", &[json!(null), json!(5), json!(1)]));
	assert!(session.dispatch_event("g0", &[json!(null), json!(6), json!(1)]));
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_and_panicking_handlers_still_schedule_an_update() {
	let model = Arc::new(Model::default());
	let session = session(&model)
		.on_window("resize", EventHandler::action(|| bail!("resize failed")))
		.on_window("scroll", EventHandler::action(|| panic!("scroll exploded")))
		.build()
		.unwrap();

	assert!(session.dispatch_event("g0", &[json!(null), json!(1)]));
	assert_eq!(session.scheduler().phase(), Phase::Invalidated);
	assert!(session.dispatch_event("g1", &[json!(null), json!(2)]));
	assert_eq!(session.scheduler().phase(), Phase::Invalidated);
}

#[tokio::test]
async fn async_handlers_run_detached() {
	let model = Arc::new(Model::default());
	let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
	let session = session(&model)
		.on_window(
			"keydown",
			EventHandler::event_task(move |args| {
				let tx = tx.clone();
				async move {
					tx.send(args.payload).ok();
					Ok(())
				}
			}),
		)
		.build()
		.unwrap();

	assert!(session.dispatch_event("g0", &[json!({"key": "a"}), json!(1)]));
	assert_eq!(rx.recv().await, Some(json!({"key": "a"})));
}

#[test]
fn methods_answer_requests_only() {
	let model = Arc::new(Model::default());
	let session = session(&model)
		.query("math.double", |params| Ok(json!(params.first().and_then(Value::as_i64).unwrap_or(0) * 2)))
		.method("model.fail", |_| bail!("no model"))
		.build()
		.unwrap();

	let response = session.call_method("math.double", vec![json!(21)], Some(RequestId::Number(1))).unwrap();
	assert_eq!(serde_json::to_value(&response).unwrap(), json!({"jsonrpc": "2.0", "result": 42, "id": 1}));
	assert!(session.call_method("math.double", vec![json!(1)], None).is_none());
	assert_eq!(session.scheduler().phase(), Phase::Idle);

	let response = session.call_method("model.fail", Vec::new(), Some(RequestId::Number(2))).unwrap();
	assert_eq!(response.error.unwrap().code, ErrorCode::INTERNAL_ERROR);
	assert_eq!(session.scheduler().phase(), Phase::Invalidated);

	let response = session.call_method("nope", Vec::new(), Some(RequestId::String("x".into()))).unwrap();
	assert_eq!(
		serde_json::to_value(&response).unwrap(),
		json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "unknown method nope"}, "id": "x"})
	);
	assert!(session.call_method("nope", Vec::new(), None).is_none());
}

#[test]
fn invalid_configuration_is_rejected_at_build() {
	let model = Arc::new(Model::default());
	let mut config = LiveConfig::default();
	config.outbound.capacity = 0;
	let result = Session::builder(button(&model), Arc::new(KeyInterner::new()), config).build();
	assert!(matches!(result, Err(LiveError::Config(_))));
}
