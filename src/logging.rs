// ABOUTME: Structured logging setup built on tracing and tracing-subscriber
// ABOUTME: Provides EnvFilter-driven initialization for services embedding this crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging with an `EnvFilter`
///
/// Reads `RUST_LOG` when set, falling back to the provided default
/// directive. Safe to call once per process; repeated calls are ignored.
pub fn init_logging(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // try_init: embedding services may have installed their own subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("info");
        init_logging("debug");
    }
}
