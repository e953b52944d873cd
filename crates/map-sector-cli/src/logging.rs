//! Tracing subscriber setup
//!
//! With the `profiling` feature a Chrome trace layer is attached next to the console output.
//! The returned guard flushes the trace file when dropped, so keep it alive until exit.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[cfg(feature = "profiling")]
pub type ProfilingGuard = Option<tracing_chrome::FlushGuard>;

#[cfg(not(feature = "profiling"))]
pub type ProfilingGuard = ();

/// Initialize logging, defaulting `RUST_LOG` when it is not set
pub fn setup_logging() -> ProfilingGuard {
    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var("RUST_LOG", "debug");
            } else {
                std::env::set_var("RUST_LOG", "info");
            }
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    #[cfg(feature = "profiling")]
    let guard = {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .include_args(true)
            .build();
        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();
        Some(guard)
    };

    #[cfg(not(feature = "profiling"))]
    tracing_subscriber::registry().with(fmt_layer).init();

    if defaulted {
        tracing::debug!(
            "RUST_LOG set to default: {}",
            std::env::var("RUST_LOG").unwrap_or_default()
        );
    }

    #[cfg(feature = "profiling")]
    return guard;
}
