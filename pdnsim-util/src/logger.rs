//! Logger

// Imports
use {
	std::{
		fs,
		path::Path,
		sync::{Arc, Mutex},
	},
	tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer},
};

/// Pre-initialization logging.
///
/// Messages emitted before [`init`] is called are buffered and
/// re-emitted through `tracing` once the subscriber exists.
pub mod pre_init {
	use super::PRE_INIT_MESSAGES;

	/// Buffers a debug message until the logger is initialized
	pub fn debug(msg: String) {
		let mut messages = PRE_INIT_MESSAGES.lock().expect("Poisoned pre-init message buffer");
		messages.push(msg);
	}
}

/// Messages buffered before initialization
static PRE_INIT_MESSAGES: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Initializes the logger.
///
/// Logs to stderr, filtered by `RUST_LOG`. If `log_file` is given, additionally
/// performs verbose logging to it, filtered by `RUST_LOG_FILE` (defaulting to
/// `trace`), either truncating or appending according to `log_file_append`.
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	let stderr_layer = tracing_fmt::layer()
		.with_writer(std::io::stderr)
		.with_filter(EnvFilter::from_default_env());

	let file_layer = log_file.map(|path| {
		let file = fs::File::options()
			.create(true)
			.append(log_file_append)
			.truncate(!log_file_append)
			.write(true)
			.open(path)
			.expect("Unable to open log file");

		let filter = EnvFilter::try_from_env("RUST_LOG_FILE").unwrap_or_else(|_| EnvFilter::new("trace"));
		tracing_fmt::layer()
			.with_writer(Arc::new(file))
			.with_ansi(false)
			.with_filter(filter)
	});

	tracing_subscriber::registry()
		.with(stderr_layer)
		.with(file_layer)
		.init();

	// Then flush any buffered pre-init messages
	let mut messages = PRE_INIT_MESSAGES.lock().expect("Poisoned pre-init message buffer");
	for msg in messages.drain(..) {
		tracing::debug!(target: "pdnsim::pre_init", "{msg}");
	}
}
