//! Tracing setup for binaries and tests that embed the store.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with an env-driven filter.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` is used
/// (for example `"convo_mirror=debug"`). Safe to call more than once.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_tracing("convo_mirror=debug");
        init_tracing("convo_mirror=trace");
        tracing::debug!("tracing initialized twice");
    }
}
