use log::{info, log_enabled, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `info`. Frame dumps
/// are under the `velbus::frame` target at `debug`.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    // A second init (tests, embedding hosts) keeps the first logger.
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
