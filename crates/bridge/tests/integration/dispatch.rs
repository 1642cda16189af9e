//! Tag resolution, ordering and attach/detach interleaving.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use vellum_bridge::{BridgeError, Tag};

use crate::common::{StubView, start, three_matches};

fn view_not_found(operation: &str, tag: i32) -> BridgeError {
	BridgeError::ViewNotFound {
		operation: operation.to_string(),
		tag: Tag::new(tag),
	}
}

#[test]
fn page_count_resolves_until_detach() {
	let dispatcher = start();
	let view = StubView::with_pages(10);
	dispatcher.attach(5, view.handle()).wait().unwrap();

	assert_eq!(dispatcher.dispatch(5, "getPageCount", &[]).wait(), Ok(json!(10)));
	assert_eq!(dispatcher.dispatch(6, "getPageCount", &[]).wait(), Err(view_not_found("getPageCount", 6)));

	assert_eq!(dispatcher.detach(5).wait(), Ok(true));
	assert_eq!(dispatcher.dispatch(5, "getPageCount", &[]).wait(), Err(view_not_found("getPageCount", 5)));
	assert_eq!(view.page_count_calls(), 1);
	dispatcher.shutdown();
}

#[test]
fn unknown_tag_never_invokes_any_view() {
	let dispatcher = start();
	let view = StubView::with_pages(3);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	for tag in [2, 3, -1] {
		assert_eq!(dispatcher.dispatch(tag, "getPageCount", &[]).wait(), Err(view_not_found("getPageCount", tag)));
	}
	assert_eq!(view.page_count_calls(), 0);
	dispatcher.shutdown();
}

#[test]
fn command_queued_after_detach_observes_view_not_found() {
	let dispatcher = start();
	let view = StubView::with_pages(4);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	// No waits in between: ordering comes from the shared queue alone.
	let before = dispatcher.dispatch(1, "getPageCount", &[]);
	let detach = dispatcher.detach(1);
	let after = dispatcher.dispatch(1, "getPageCount", &[]);
	let reattach = dispatcher.attach(1, view.handle());
	let resurrected = dispatcher.dispatch(1, "getPageCount", &[]);

	assert_eq!(before.wait(), Ok(json!(4)));
	assert_eq!(detach.wait(), Ok(true));
	assert_eq!(after.wait(), Err(view_not_found("getPageCount", 1)));
	assert!(reattach.wait().unwrap().is_none());
	assert_eq!(resurrected.wait(), Ok(json!(4)));
	dispatcher.shutdown();
}

#[test]
fn dropped_view_behaves_as_detached() {
	let dispatcher = start();
	let view = StubView::with_pages(4);
	dispatcher.attach(8, view.handle()).wait().unwrap();
	drop(view);

	assert_eq!(dispatcher.dispatch(8, "getPageCount", &[]).wait(), Err(view_not_found("getPageCount", 8)));

	let replacement = StubView::with_pages(2);
	assert!(dispatcher.attach(8, replacement.handle()).wait().unwrap().is_none());
	assert_eq!(dispatcher.dispatch(8, "getPageCount", &[]).wait(), Ok(json!(2)));
	dispatcher.shutdown();
}

#[test]
fn same_tag_commands_run_in_submission_order() {
	let dispatcher = start();
	let view = StubView::with_pages(40);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let completions: Vec<_> = (1..=30)
		.flat_map(|page| {
			[
				dispatcher.dispatch(1, "setCurrentPage", &[json!(page)]),
				dispatcher.dispatch(1, "currentPage", &[]),
			]
		})
		.collect();
	let observed: Vec<_> = completions.into_iter().map(|c| c.wait().unwrap()).collect();

	let expected: Vec<_> = (1..=30).flat_map(|page| [json!(page != 1), json!(page)]).collect();
	assert_eq!(observed, expected);
	dispatcher.shutdown();
}

#[test]
fn commands_from_many_threads_each_complete_once() {
	let dispatcher = Arc::new(start());
	let view = StubView::with_pages(12);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let workers: Vec<_> = (0..8)
		.map(|_| {
			let dispatcher = Arc::clone(&dispatcher);
			std::thread::spawn(move || {
				(0..25)
					.map(|_| dispatcher.dispatch(1, "getPageCount", &[]))
					.map(|completion| completion.wait())
					.filter(|result| *result == Ok(json!(12)))
					.count()
			})
		})
		.collect();
	let resolved: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

	assert_eq!(resolved, 200);
	assert_eq!(view.page_count_calls(), 200);
	let Ok(dispatcher) = Arc::try_unwrap(dispatcher) else {
		panic!("dispatcher still shared");
	};
	assert_eq!(dispatcher.shutdown().handled(), 201);
}

#[test]
fn view_failures_are_forwarded_verbatim() {
	let dispatcher = start();
	let view = StubView::with_pages(3);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	assert_eq!(
		dispatcher.dispatch(1, "setCurrentPage", &[json!(9)]).wait(),
		Err(BridgeError::OperationFailed {
			code: "pageOutOfRange".into(),
			message: "page 9 of 3".into(),
		})
	);
	assert_eq!(
		dispatcher.dispatch(1, "getOutline", &[]).wait(),
		Err(BridgeError::OperationFailed {
			code: "unsupported".into(),
			message: "getOutline is not supported by this view".into(),
		})
	);
	dispatcher.shutdown();
}

#[test]
fn search_results_keep_view_order() {
	let dispatcher = start();
	let view = StubView::with_matches(three_matches());
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let result = dispatcher.dispatch(1, "search", &[json!("foo"), json!(false), json!(false)]).wait().unwrap();
	assert_eq!(
		result,
		json!([
			{"page": 7, "text": "foo", "bounds": [10.0, 20.0, 30.0, 40.0]},
			{"page": 2, "text": "Foo", "bounds": [1.0, 2.0, 3.0, 4.0]},
			{"page": 5, "text": "foo", "bounds": [5.0, 6.0, 7.0, 8.0]},
		])
	);
	dispatcher.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn completions_are_awaitable() {
	let dispatcher = start();
	let view = StubView::with_pages(6);
	dispatcher.attach(2, view.handle()).await.unwrap();

	let (count, missing) = tokio::join!(dispatcher.dispatch(2, "getPageCount", &[]), dispatcher.dispatch(3, "getPageCount", &[]));
	assert_eq!(count, Ok(json!(6)));
	assert_eq!(missing, Err(view_not_found("getPageCount", 3)));
	tokio::task::spawn_blocking(move || dispatcher.shutdown()).await.unwrap();
}
