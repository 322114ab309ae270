//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Only the first call
/// in a process installs anything; later calls return `false`.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_second_call_returns_false() {
        init("debug");
        assert!(!init("info"));
    }
}
