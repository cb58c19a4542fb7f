use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter(verbose: bool) -> EnvFilter {
	// RUST_LOG wins; otherwise the verbose flag picks the level
	let default_level = if verbose { "debug" } else { "info" };
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(verbose: bool) -> impl tracing::Subscriber + Send + Sync + 'static {
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter(verbose))
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.finish()
}

/// Installs the global stderr subscriber. Panics if one is already set.
pub fn init_logging(verbose: bool) {
	subscriber(verbose).init();
}

/// Like [`init_logging`], but returns false instead of panicking when a
/// subscriber is already installed.
pub fn try_init_logging(verbose: bool) -> bool {
	subscriber(verbose).try_init().is_ok()
}
