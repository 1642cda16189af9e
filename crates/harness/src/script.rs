//! Scripted host sessions.
//!
//! A script is a JSON array of steps. The session plays the UI layer: it owns
//! every [`MemoryView`] it attaches and drops them on detach, while commands
//! and deliveries go through the dispatcher exactly as a host binding would
//! send them. Each step prints one JSON line.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Value, json};
use vellum_bridge::{ActivityResultRouter, BridgeError, CommandDispatcher, LifecycleEvent, Tag, ViewHandle};

use crate::memory_view::MemoryView;

/// One script step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub enum Step {
	/// Creates an in-memory document and attaches it.
	Attach(AttachStep),
	/// Detaches a tag and drops the session's view.
	Detach(Tag),
	/// Drops the session's view without detaching, as a UI teardown race would.
	DropView(Tag),
	/// Dispatches a command and prints its outcome.
	Call(CallStep),
	/// Dispatches a fire-and-forget command.
	Post(CallStep),
	/// Routes a lifecycle result to every attached view.
	Deliver(LifecycleEvent),
	/// Prints the state of the session's view for a tag.
	Inspect(Tag),
}

/// Parameters of [`Step::Attach`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttachStep {
	/// Tag to attach under.
	pub tag: Tag,
	/// Page count.
	pub pages: u32,
	/// Per-page text; missing pages read as `Page N`.
	#[serde(default)]
	pub text: Vec<String>,
	/// Document path reported by the view.
	#[serde(default)]
	pub path: Option<String>,
}

/// Parameters of [`Step::Call`] and [`Step::Post`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallStep {
	/// Target tag.
	pub tag: Tag,
	/// Operation wire name.
	pub op: String,
	/// Positional arguments.
	#[serde(default)]
	pub args: Vec<Value>,
	/// Dispatch as cancellable and cancel after this many milliseconds.
	#[serde(default)]
	pub cancel_after_ms: Option<u64>,
}

/// Reads a script file.
pub fn load(path: &Path) -> anyhow::Result<Vec<Step>> {
	let input = std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
	serde_json::from_str(&input).with_context(|| format!("parsing script {}", path.display()))
}

/// Plays steps against one dispatcher.
pub struct Session<'a> {
	dispatcher: &'a CommandDispatcher,
	router: ActivityResultRouter,
	views: HashMap<Tag, Arc<MemoryView>>,
}

impl<'a> Session<'a> {
	pub fn new(dispatcher: &'a CommandDispatcher) -> Self {
		Self {
			dispatcher,
			router: ActivityResultRouter::new(dispatcher),
			views: HashMap::new(),
		}
	}

	/// Runs every step, writing one JSON line per step to `out`.
	pub fn run(&mut self, steps: &[Step], out: &mut impl Write) -> anyhow::Result<()> {
		for (index, step) in steps.iter().enumerate() {
			let mut line = self.step(step);
			line["step"] = json!(index);
			writeln!(out, "{line}").context("writing session output")?;
		}
		Ok(())
	}

	fn step(&mut self, step: &Step) -> Value {
		match step {
			Step::Attach(attach) => self.attach(attach),
			Step::Detach(tag) => {
				let outcome = self.dispatcher.detach(*tag).wait();
				self.views.remove(tag);
				outcome_line("detach", Some(*tag), None, outcome.map(|removed| json!({ "removed": removed })))
			}
			Step::DropView(tag) => {
				let dropped = self.views.remove(tag).is_some();
				outcome_line("dropView", Some(*tag), None, Ok(json!({ "dropped": dropped })))
			}
			Step::Call(call) => self.call(call),
			Step::Post(call) => {
				self.dispatcher.post(call.tag, &call.op, &call.args);
				outcome_line("post", Some(call.tag), Some(&call.op), Ok(Value::Null))
			}
			Step::Deliver(event) => {
				let outcome = self.router.deliver(event.clone()).wait();
				outcome_line("deliver", None, None, outcome.map(|report| json!(report)))
			}
			Step::Inspect(tag) => {
				let outcome = self
					.views
					.get(tag)
					.map(|view| view.summary())
					.ok_or_else(|| BridgeError::InvalidArgument(format!("session holds no view for tag {tag}")));
				outcome_line("inspect", Some(*tag), None, outcome)
			}
		}
	}

	fn attach(&mut self, attach: &AttachStep) -> Value {
		let path = attach.path.clone().unwrap_or_else(|| format!("memory://{}.pdf", attach.tag));
		let view = Arc::new(MemoryView::new(path, attach.pages, attach.text.clone()));
		let outcome = self.dispatcher.attach(attach.tag, ViewHandle::new(&view)).wait();
		let outcome = outcome.map(|displaced| {
			self.views.insert(attach.tag, view);
			json!({ "displaced": displaced.is_some() })
		});
		outcome_line("attach", Some(attach.tag), None, outcome)
	}

	fn call(&mut self, call: &CallStep) -> Value {
		let outcome = match call.cancel_after_ms {
			None => self.dispatcher.dispatch(call.tag, &call.op, &call.args).wait(),
			Some(delay) => {
				let pending = self.dispatcher.dispatch_cancellable(call.tag, &call.op, &call.args);
				let cancel = pending.cancel.clone();
				std::thread::spawn(move || {
					std::thread::sleep(Duration::from_millis(delay));
					cancel.cancel();
				});
				pending.completion.wait()
			}
		};
		outcome_line("call", Some(call.tag), Some(&call.op), outcome)
	}
}

fn outcome_line(action: &str, tag: Option<Tag>, op: Option<&str>, outcome: Result<Value, BridgeError>) -> Value {
	let mut line = json!({ "action": action });
	if let Some(tag) = tag {
		line["tag"] = json!(tag);
	}
	if let Some(op) = op {
		line["op"] = json!(op);
	}
	match outcome {
		Ok(value) => line["ok"] = value,
		Err(error) => {
			tracing::debug!(action, %error, "harness.step.failed");
			line["error"] = json!({ "kind": error.kind(), "message": error.to_string() });
		}
	}
	line
}
