//! Logging setup for the runtime, built on `tracing` and
//! `tracing-subscriber`.
//!
//! `RUST_LOG` always wins; otherwise the level comes from
//! `ILLIXR_LOG_LEVEL`. Setting `ILLIXR_ENABLE_VERBOSE_ERRORS` additionally
//! includes file/line locations in log output and floors the level at debug.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// A builder for configuring the runtime's logging.
///
/// # Example
///
/// ```rust,ignore
/// LoggingBuilder::new()
///     .level("debug")
///     .with_thread_ids(true)
///     .init();
/// ```
#[derive(Default)]
pub struct LoggingBuilder {
    level: Option<String>,
    directives: Vec<String>,
    with_target: bool,
    with_thread_ids: bool,
    with_location: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base level (`trace`, `debug`, `info`, `warn`, `error`).
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Adds a filter directive, e.g. `"rotor_core=debug"`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Includes the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Includes thread IDs in log output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Includes file names and line numbers in log output.
    pub fn with_location(mut self, enabled: bool) -> Self {
        self.with_location = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = self.level.as_deref().unwrap_or("info").to_string();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
        for directive in &self.directives {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
        filter
    }

    /// Initializes the logging system.
    ///
    /// # Panics
    ///
    /// Panics if a subscriber has already been set; use
    /// [`try_init`](Self::try_init) when that is a possibility.
    pub fn init(self) {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_location)
                    .with_line_number(self.with_location),
            )
            .with(filter)
            .init();
    }

    /// Initializes the logging system, returning an error instead of
    /// panicking when a subscriber already exists.
    pub fn try_init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_location)
                    .with_line_number(self.with_location),
            )
            .with(filter)
            .try_init()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

fn truthy(value: &str) -> bool {
    value
        .parse::<i64>()
        .map(|n| n > 0)
        .unwrap_or_else(|_| matches!(value.to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "on"))
}

/// Initializes logging from the runtime's environment variables.
pub fn init_from_env() {
    let verbose = std::env::var("ILLIXR_ENABLE_VERBOSE_ERRORS")
        .map(|v| truthy(&v))
        .unwrap_or(false);

    let level = std::env::var("ILLIXR_LOG_LEVEL").unwrap_or_else(|_| {
        if verbose { "debug" } else { "info" }.to_string()
    });

    let _ = LoggingBuilder::new()
        .level(level)
        .with_location(verbose)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_accepts_integers_and_affirmatives() {
        assert!(truthy("1"));
        assert!(truthy("yes"));
        assert!(truthy("TRUE"));
        assert!(!truthy("0"));
        assert!(!truthy("off"));
        assert!(!truthy(""));
    }

    #[test]
    fn init_is_safe_to_call_twice() {
        init_from_env();
        init_from_env();
    }
}
