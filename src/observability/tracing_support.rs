//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};
use tracing_subscriber::EnvFilter;

/// Configuration for the log subscriber installed by [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is unset.
    pub level: Level,
    /// Extra filter directives, e.g. `"padflow::probes=trace"`.
    pub directives: Vec<String>,
    /// Include thread ids in log lines.
    pub thread_ids: bool,
    /// Include thread names in log lines.
    pub thread_names: bool,
    /// Include the log target in log lines.
    pub target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            thread_ids: false,
            thread_names: true,
            target: true,
        }
    }
}

impl TracingConfig {
    /// Verbose config for debugging scheduling problems.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            thread_ids: true,
            ..Self::default()
        }
    }

    /// Config for tests: warnings only, unless `RUST_LOG` says otherwise.
    pub fn test() -> Self {
        Self {
            level: Level::WARN,
            thread_names: false,
            ..Self::default()
        }
    }

    /// Add a filter directive.
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy();
        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => eprintln!("ignoring invalid log directive {directive:?}: {err}"),
            }
        }
        filter
    }
}

/// Install a global `fmt` subscriber.
///
/// Returns `false` if a global subscriber was already installed, which is
/// expected when several tests call this.
pub fn init_tracing(config: &TracingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_thread_ids(config.thread_ids)
        .with_thread_names(config.thread_names)
        .with_target(config.target)
        .try_init()
        .is_ok()
}

/// Create a span for work done on behalf of a pad.
///
/// # Example
///
/// ```rust
/// use padflow::observability::span_pad;
///
/// let span = span_pad("decoder", "src");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_pad(node: &str, pad: &str) -> Span {
    span!(Level::DEBUG, "pad", node = %node, pad = %pad)
}

/// Enter a pad span, returning the guard.
pub fn instrument_pad(node: &str, pad: &str) -> tracing::span::EnteredSpan {
    span_pad(node, pad).entered()
}
