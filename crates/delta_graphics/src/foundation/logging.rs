//! Logging utilities and structured logging support
//!
//! The crate logs through the `log` facade. Applications pick the backend;
//! [`init`] wires up `env_logger` for tools and tests.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with an explicit filter such as `"delta_graphics=debug"`.
///
/// `RUST_LOG` still overrides the filter when set. Safe to call more than
/// once; later calls are ignored.
pub fn init_with_filter(filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .try_init();
}
