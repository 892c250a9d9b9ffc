//! Provider teardown.
//!
//! Every provider created during init registers a shutdown callback here.
//! Teardown is best-effort: all callbacks run regardless of individual
//! failures, and failures are folded into a single logged message rather
//! than surfaced to the caller.

/// Error produced by a single shutdown callback.
pub type ShutdownError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type ShutdownFn = Box<dyn FnOnce() -> Result<(), ShutdownError> + Send + Sync>;

/// Guard owning the shutdown callbacks of every provider created during
/// init.
///
/// Call [`shutdown`](TelemetryGuard::shutdown) once the providers are no
/// longer in use, after in-flight work has drained. Dropping the guard
/// shuts down as well, so pending telemetry is flushed even on early exit.
#[must_use = "dropping the guard shuts telemetry down immediately"]
pub struct TelemetryGuard {
    callbacks: Vec<ShutdownFn>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl TelemetryGuard {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, callback: ShutdownFn) {
        self.callbacks.push(callback);
    }

    /// Shut down every provider, flushing pending telemetry.
    ///
    /// Runs all registered callbacks even when some fail and logs one
    /// aggregate message for the failures. Calling this a second time is a
    /// no-op.
    pub fn shutdown(&mut self) {
        let mut failures = Vec::new();
        for callback in self.callbacks.drain(..) {
            if let Err(e) = callback() {
                failures.push(e.to_string());
            }
        }

        if !failures.is_empty() {
            tracing::warn!(
                "error shutting down telemetry providers: {}",
                failures.join("; ")
            );
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
