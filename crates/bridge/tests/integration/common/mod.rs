//! Shared stub views and helpers for bridge integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use vellum_bridge::{
	BridgeConfig, CancelToken, CommandDispatcher, DocumentView, LifecycleEvent, SearchMatch, SearchQuery, ViewError, ViewHandle,
	ViewResult,
};

/// How long a test waits on a signal before declaring a hang.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Starts a dispatcher with a small queue and test logging.
pub fn start() -> CommandDispatcher {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	CommandDispatcher::start(BridgeConfig::default().with_queue_capacity(64)).expect("start dispatcher")
}

/// Rendezvous that parks the affinity thread inside a view call.
#[derive(Default)]
pub struct Gate {
	entered: Mutex<Option<mpsc::Sender<()>>>,
	release: Mutex<Option<mpsc::Receiver<()>>>,
}

/// Test-side control of a [`Gate`].
pub struct GateControl {
	entered: mpsc::Receiver<()>,
	release: mpsc::Sender<()>,
}

impl Gate {
	/// Arms the gate; the next [`Gate::pass`] blocks until released.
	pub fn arm(&self) -> GateControl {
		let (entered_tx, entered) = mpsc::channel();
		let (release, release_rx) = mpsc::channel();
		*self.entered.lock() = Some(entered_tx);
		*self.release.lock() = Some(release_rx);
		GateControl { entered, release }
	}

	/// Signals entry and blocks until released. Passes straight through when unarmed.
	pub fn pass(&self) {
		if let Some(entered) = self.entered.lock().take() {
			let _ = entered.send(());
		}
		let release = self.release.lock().take();
		if let Some(release) = release {
			let _ = release.recv_timeout(TIMEOUT);
		}
	}
}

impl GateControl {
	/// Waits until the affinity thread is parked in the gate.
	pub fn wait_entered(&self) {
		self.entered.recv_timeout(TIMEOUT).expect("affinity thread entered the gate");
	}

	/// Lets the parked call continue.
	pub fn open(&self) {
		let _ = self.release.send(());
	}
}

/// Configurable in-memory view.
#[derive(Default)]
pub struct StubView {
	pub pages: u32,
	pub matches: Vec<SearchMatch>,
	pub fail_hook: bool,
	/// `search` runs to completion without polling its cancel token.
	pub ignores_cancel: bool,
	/// Gate passed at the start of `getPageCount`.
	pub page_gate: Gate,
	/// Gate passed at the start of `search` and `getThumbnail`.
	pub work_gate: Gate,
	pub page_count_calls: AtomicUsize,
	pub search_calls: AtomicUsize,
	pub current: Mutex<u32>,
	pub events: Mutex<Vec<LifecycleEvent>>,
}

impl StubView {
	pub fn with_pages(pages: u32) -> Arc<Self> {
		Arc::new(Self {
			pages,
			current: Mutex::new(1),
			..Self::default()
		})
	}

	pub fn with_matches(matches: Vec<SearchMatch>) -> Arc<Self> {
		Arc::new(Self {
			pages: 10,
			matches,
			..Self::default()
		})
	}

	/// Like [`StubView::with_matches`], but the search never checks for cancellation.
	pub fn finishing(matches: Vec<SearchMatch>) -> Arc<Self> {
		Arc::new(Self {
			pages: 10,
			matches,
			ignores_cancel: true,
			..Self::default()
		})
	}

	pub fn failing_hook() -> Arc<Self> {
		Arc::new(Self {
			fail_hook: true,
			..Self::default()
		})
	}

	pub fn handle(self: &Arc<Self>) -> ViewHandle {
		ViewHandle::new(self)
	}

	pub fn page_count_calls(&self) -> usize {
		self.page_count_calls.load(Ordering::SeqCst)
	}

	pub fn search_calls(&self) -> usize {
		self.search_calls.load(Ordering::SeqCst)
	}

	/// Polls `cancel` until it fires or the work window passes.
	fn cooperative_work(cancel: &CancelToken) -> ViewResult<()> {
		for _ in 0..50 {
			if cancel.is_cancelled() {
				return Err(ViewError::Stopped);
			}
			std::thread::sleep(Duration::from_millis(2));
		}
		Ok(())
	}
}

impl DocumentView for StubView {
	fn page_count(&self) -> ViewResult<u32> {
		self.page_count_calls.fetch_add(1, Ordering::SeqCst);
		self.page_gate.pass();
		Ok(self.pages)
	}

	fn current_page(&self) -> ViewResult<u32> {
		Ok(*self.current.lock())
	}

	fn set_current_page(&self, page: u32) -> ViewResult<bool> {
		if page > self.pages {
			return Err(ViewError::failed("pageOutOfRange", format!("page {page} of {}", self.pages)));
		}
		let mut current = self.current.lock();
		let changed = *current != page;
		*current = page;
		Ok(changed)
	}

	fn search(&self, _query: &SearchQuery, cancel: &CancelToken) -> ViewResult<Vec<SearchMatch>> {
		self.search_calls.fetch_add(1, Ordering::SeqCst);
		self.work_gate.pass();
		if !self.ignores_cancel {
			Self::cooperative_work(cancel)?;
		}
		Ok(self.matches.clone())
	}

	fn thumbnail(&self, page: u32, cancel: &CancelToken) -> ViewResult<Vec<u8>> {
		self.work_gate.pass();
		Self::cooperative_work(cancel)?;
		Ok(format!("thumb-{page}").into_bytes())
	}

	fn on_activity_result(&self, event: &LifecycleEvent) -> ViewResult<()> {
		if self.fail_hook {
			return Err(ViewError::failed("hook", "refused"));
		}
		self.events.lock().push(event.clone());
		Ok(())
	}
}

/// Three search matches in a deliberately unsorted order.
pub fn three_matches() -> Vec<SearchMatch> {
	vec![
		SearchMatch {
			page: 7,
			text: "foo".into(),
			bounds: [10.0, 20.0, 30.0, 40.0],
		},
		SearchMatch {
			page: 2,
			text: "Foo".into(),
			bounds: [1.0, 2.0, 3.0, 4.0],
		},
		SearchMatch {
			page: 5,
			text: "foo".into(),
			bounds: [5.0, 6.0, 7.0, 8.0],
		},
	]
}
