//! Lifecycle delivery through the affinity thread.

use pretty_assertions::assert_eq;
use serde_json::json;
use vellum_bridge::{ActivityResultRouter, DeliveryReport, LifecycleEvent, Tag};

use crate::common::{StubView, start};

fn pick_result() -> LifecycleEvent {
	LifecycleEvent {
		request_code: 10_001,
		result_code: -1,
		payload: json!({"uri": "content://picked.pdf"}),
	}
}

#[test]
fn delivery_reaches_every_view_despite_a_failing_hook() {
	let dispatcher = start();
	let router = ActivityResultRouter::new(&dispatcher);
	let first = StubView::with_pages(1);
	let failing = StubView::failing_hook();
	let last = StubView::with_pages(1);
	dispatcher.attach(1, first.handle()).wait().unwrap();
	dispatcher.attach(2, failing.handle()).wait().unwrap();
	dispatcher.attach(3, last.handle()).wait().unwrap();

	let report = router.deliver(pick_result()).wait().unwrap();
	assert_eq!(
		report,
		DeliveryReport {
			delivered: 2,
			failed: vec![Tag::new(2)],
		}
	);
	assert_eq!(*first.events.lock(), vec![pick_result()]);
	assert_eq!(*last.events.lock(), vec![pick_result()]);
	dispatcher.shutdown();
}

#[test]
fn delivery_skips_detached_views() {
	let dispatcher = start();
	let router = ActivityResultRouter::new(&dispatcher);
	let kept = StubView::with_pages(1);
	let detached = StubView::with_pages(1);
	dispatcher.attach(1, kept.handle()).wait().unwrap();
	dispatcher.attach(2, detached.handle()).wait().unwrap();

	let detach = dispatcher.detach(2);
	let report = router.clone().deliver(pick_result()).wait().unwrap();
	assert_eq!(detach.wait(), Ok(true));

	assert_eq!(report.delivered, 1);
	assert!(detached.events.lock().is_empty());
	dispatcher.shutdown();
}

#[test]
fn router_is_usable_from_other_threads() {
	let dispatcher = start();
	let router = ActivityResultRouter::new(&dispatcher);
	let view = StubView::with_pages(1);
	dispatcher.attach(1, view.handle()).wait().unwrap();

	let reports: Vec<_> = (0..4)
		.map(|_| {
			let router = router.clone();
			std::thread::spawn(move || router.deliver(pick_result()).wait().unwrap())
		})
		.collect::<Vec<_>>()
		.into_iter()
		.map(|handle| handle.join().unwrap())
		.collect();

	assert!(reports.iter().all(|report| report.delivered == 1));
	assert_eq!(view.events.lock().len(), 4);
	dispatcher.shutdown();
}
