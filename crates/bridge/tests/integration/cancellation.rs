//! Cancellable commands: every race with `cancel` still completes exactly once.

use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use pretty_assertions::assert_eq;
use serde_json::json;
use vellum_bridge::BridgeError;

use crate::common::{StubView, TIMEOUT, start, three_matches};

fn search_args() -> [serde_json::Value; 3] {
	[json!("foo"), json!(false), json!(false)]
}

#[test]
fn cancel_before_start_prevents_the_operation() {
	let dispatcher = start();
	let view = StubView::with_matches(three_matches());
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let gate = view.page_gate.arm();
	let blocker = dispatcher.dispatch(1, "getPageCount", &[]);
	gate.wait_entered();

	let pending = dispatcher.dispatch_cancellable(1, "search", &search_args());
	pending.cancel.cancel();
	gate.open();

	assert_eq!(blocker.wait(), Ok(json!(10)));
	assert_eq!(pending.completion.wait(), Err(BridgeError::Cancelled));
	assert_eq!(view.search_calls(), 0);
	dispatcher.shutdown();
}

#[test]
fn cancel_in_flight_yields_cancelled() {
	let dispatcher = start();
	let view = StubView::with_matches(three_matches());
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let gate = view.work_gate.arm();
	let pending = dispatcher.dispatch_cancellable(1, "search", &search_args());
	gate.wait_entered();
	pending.cancel.cancel();
	gate.open();

	assert_eq!(pending.completion.wait(), Err(BridgeError::Cancelled));
	assert_eq!(view.search_calls(), 1);
	dispatcher.shutdown();
}

#[test]
fn view_finishing_before_it_sees_the_cancel_keeps_its_result() {
	let dispatcher = start();
	let view = StubView::finishing(three_matches());
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let gate = view.work_gate.arm();
	let pending = dispatcher.dispatch_cancellable(1, "search", &search_args());
	gate.wait_entered();
	pending.cancel.cancel();
	gate.open();

	let value = pending.completion.wait().unwrap();
	assert_eq!(value, serde_json::to_value(three_matches()).unwrap());
	assert!(pending.cancel.is_cancelled());
	assert_eq!(view.search_calls(), 1);
	dispatcher.shutdown();
}

#[test]
fn cancel_after_completion_is_a_no_op() {
	let dispatcher = start();
	let view = StubView::with_pages(3);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let pending = dispatcher.dispatch_cancellable(1, "getThumbnail", &[json!(2)]);
	let cancel = pending.cancel.clone();
	let result = pending.completion.wait().unwrap();
	cancel.cancel();
	cancel.cancel();

	assert_eq!(result, json!(BASE64_STANDARD.encode(b"thumb-2")));
	assert!(cancel.is_cancelled());
	dispatcher.shutdown();
}

#[test]
fn cancel_racing_execution_always_completes() {
	let dispatcher = start();
	let view = StubView::with_matches(three_matches());
	dispatcher.attach(1, view.handle()).wait().unwrap();

	for delay_ms in [0, 1, 3, 10, 40, 150] {
		let pending = dispatcher.dispatch_cancellable(1, "search", &search_args());
		let cancel = pending.cancel.clone();
		let canceller = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(delay_ms));
			cancel.cancel();
		});

		match pending.completion.wait() {
			Ok(value) => assert_eq!(value.as_array().map(Vec::len), Some(3)),
			Err(err) => assert_eq!(err, BridgeError::Cancelled),
		}
		canceller.join().unwrap();
	}
	dispatcher.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_search_does_not_hang() {
	let dispatcher = start();
	let view = StubView::with_matches(three_matches());
	dispatcher.attach(1, view.handle()).await.unwrap();

	let pending = dispatcher.dispatch_cancellable(1, "search", &search_args());
	pending.cancel.cancel();
	let outcome = tokio::time::timeout(TIMEOUT, pending.completion).await.expect("completion did not hang");
	assert!(matches!(outcome, Ok(_) | Err(BridgeError::Cancelled)));
	tokio::task::spawn_blocking(move || dispatcher.shutdown()).await.unwrap();
}

#[test]
fn cancellable_command_on_unknown_tag_is_view_not_found() {
	let dispatcher = start();
	let pending = dispatcher.dispatch_cancellable(4, "getThumbnail", &[json!(1)]);
	assert!(matches!(pending.completion.wait(), Err(BridgeError::ViewNotFound { .. })));
	dispatcher.shutdown();
}

#[test]
fn cancelled_command_on_unknown_tag_is_still_view_not_found() {
	let dispatcher = start();
	let view = StubView::with_pages(1);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let gate = view.page_gate.arm();
	let blocker = dispatcher.dispatch(1, "getPageCount", &[]);
	gate.wait_entered();

	let pending = dispatcher.dispatch_cancellable(4, "search", &search_args());
	pending.cancel.cancel();
	gate.open();

	assert_eq!(blocker.wait(), Ok(json!(1)));
	assert!(matches!(pending.completion.wait(), Err(BridgeError::ViewNotFound { .. })));
	dispatcher.shutdown();
}
