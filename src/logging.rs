use tracing_subscriber::EnvFilter;

/// Framework crates are noisy at info level; keep them to warnings and errors.
const QUIET_DEPENDENCIES: &str = "burn=warn,burn_train=warn,cubecl=error,wgpu=error";

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tidymypics={},{}", level, QUIET_DEPENDENCIES)));

    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
