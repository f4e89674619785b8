use tracing_subscriber::EnvFilter;

/// Initialize structured logging for embedding programs.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. A `.env`
/// file in the working directory is loaded first so provider keys and
/// overrides are visible. Safe to call more than once.
pub fn init_tracing(default_level: &str) {
    let _ = dotenvy::dotenv();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
