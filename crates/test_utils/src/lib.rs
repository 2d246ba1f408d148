#![deny(missing_docs)]
//! Test utilities for rpc_cache.

pub mod fetcher;
pub mod locator;

/// Enable tracing with the RUST_LOG environment variable.
///
/// This is intended to be used in tests, so it defaults to DEBUG level.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .try_init();
}

/// Repeatedly run a check until it breaks out of the loop, panicking if
/// that does not happen in time.
///
/// - `iter_check!(timeout_ms, sleep_ms, { .. })`
/// - `iter_check!(timeout_ms, { .. })` sleeps 1 ms between checks
/// - `iter_check!({ .. })` times out after 1 s
///
/// Time is tokio time, so this also works in tests with paused time.
#[macro_export]
macro_rules! iter_check {
    ($timeout_ms:expr, $sleep_ms:expr, $code:block) => {
        tokio::time::timeout(
            std::time::Duration::from_millis($timeout_ms),
            async {
                loop {
                    $code
                    tokio::time::sleep(std::time::Duration::from_millis(
                        $sleep_ms,
                    ))
                    .await;
                }
            },
        )
        .await
        .expect("iter_check timed out");
    };
    ($timeout_ms:expr, $code:block) => {
        $crate::iter_check!($timeout_ms, 1, $code)
    };
    ($code:block) => {
        $crate::iter_check!(1000, $code)
    };
}
