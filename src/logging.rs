use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout carries only console output. `RUST_LOG` wins
/// over both `default_level` and `verbose`.
pub fn init(default_level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { default_level };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
