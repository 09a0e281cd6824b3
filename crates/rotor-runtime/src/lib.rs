//! # rotor-runtime
//!
//! The driver that turns the [`rotor-core`](rotor_core) fabric into a running
//! process: it loads plugin shared objects, constructs and registers the
//! fabric services, drives the stoplight through ready / should-stop /
//! shutdown-complete, and owns the default record sinks.
//!
//! Ships the `rotor` binary and a C embedding surface
//! ([`runtime_factory`](runtime::runtime_factory) and friends) for
//! compositors that host the runtime in-process.

pub mod loader;
pub mod logging;
pub mod runtime;
pub mod sink;

pub use loader::{DynamicLib, LoadError};
pub use logging::LoggingBuilder;
pub use runtime::{DisplayHandle, Runtime, RuntimeError};
pub use sink::{CsvRecordLogger, MetricsTap};
