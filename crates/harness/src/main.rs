//! Vellum harness binary.
//!
//! Plays a scripted host session against in-memory documents through a real
//! command dispatcher and prints one JSON line per step.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use vellum_bridge::{BridgeConfig, CommandDispatcher};

mod memory_view;
mod script;

/// Harness command line arguments.
#[derive(Parser, Debug)]
#[command(name = "vellum-harness")]
#[command(about = "Run a scripted session against the vellum command bridge")]
struct Args {
	/// JSON script of session steps
	#[arg(short, long, value_name = "PATH")]
	script: PathBuf,

	/// Bridge configuration (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => BridgeConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
		None => BridgeConfig::default(),
	};
	let steps = script::load(&args.script)?;
	info!(steps = steps.len(), script = %args.script.display(), "harness.script_loaded");

	let dispatcher = CommandDispatcher::start(config).context("starting dispatcher")?;
	let result = {
		let mut stdout = std::io::stdout().lock();
		script::Session::new(&dispatcher).run(&steps, &mut stdout)
	};

	let report = dispatcher.shutdown();
	info!(handled = report.handled(), dropped = report.dropped(), "harness.finished");
	if let Some(panic) = report.panic() {
		anyhow::bail!("affinity thread panicked: {panic}");
	}
	result
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("VELLUM_LOG").unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("vellum_bridge=trace,vellum_worker=debug,debug")
			} else {
				EnvFilter::new("vellum_bridge=info,warn")
			}
		})
	};

	if let Some(log_dir) = std::env::var("VELLUM_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("vellum-harness.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(std::sync::Mutex::new(file))
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			info!(path = ?log_path, "harness tracing initialized");
			return;
		}
	}

	// stdout carries session output
	tracing_subscriber::fmt()
		.with_env_filter(filter())
		.with_writer(std::io::stderr)
		.init();
}
