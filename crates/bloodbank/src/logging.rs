//! Diagnostic output for the `bloodbank` binary.
//!
//! Log lines go to stderr so tables and JSON on stdout stay clean. `RUST_LOG`,
//! when set, replaces the filter chosen by `-q` / `-v`.

use tracing_subscriber::EnvFilter;

/// How much the binary reports about what it is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings such as rejected transactions.
    #[default]
    Normal,
    /// One line per completed action.
    Verbose,
    /// Every store call.
    Trace,
}

impl Verbosity {
    /// Filter directive for this crate's targets.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "bloodbank=error",
            Self::Normal => "bloodbank=warn",
            Self::Verbose => "bloodbank=info",
            Self::Trace => "bloodbank=debug",
        }
    }
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Route log output through the test harness.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bloodbank=debug")
        .with_test_writer()
        .try_init();
}
