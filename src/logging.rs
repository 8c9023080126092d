use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

// RUST_LOG wins over the configured filter; a second call is a no-op
pub fn init(config: &Config) {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.log_filter))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
