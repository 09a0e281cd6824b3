//! # Rotor
//!
//! An extensible XR research runtime. Independently developed perception,
//! rendering, and display plugins compose into one low-latency pipeline over
//! a small coordination fabric:
//!
//! ```text
//! ┌──────────┐ load_so  ┌─────────┐ put/get  ┌─────────┐
//! │ Runtime  │─────────▶│ Plugin  │◀────────▶│   Bus   │ topics
//! │ (driver) │          │ Plugin  │          └─────────┘
//! └────┬─────┘          │ Plugin  │◀────────▶┌─────────┐
//!      │ ready/stop     └─────────┘  lookup  │Services │
//!      ▼                                     └─────────┘
//! ┌──────────┐
//! │Stoplight │  one clock, one lifecycle, N plugins
//! └──────────┘
//! ```
//!
//! - **Runtime** loads plugin shared objects and drives the lifecycle.
//! - **Bus** carries typed events between plugins: latest-value reads,
//!   lossless buffered reads, and per-subscriber callback threads.
//! - **Services** let plugins share long-lived capabilities by interface
//!   type.
//! - **Stoplight** synchronizes startup and shutdown across every thread.
//!
//! ## A minimal plugin
//!
//! ```rust,ignore
//! use rotor::prelude::*;
//!
//! struct TickSource {
//!     base: PluginBase,
//! }
//!
//! impl TickSource {
//!     fn new(name: &str, services: Arc<ServiceDirectory>) -> Self {
//!         let bus = services.lookup_impl::<Bus>();
//!         let writer = bus.get_writer::<u64>("tick");
//!         // schedule callbacks, spawn thread loops, register services...
//!         Self { base: PluginBase::new(name, services) }
//!     }
//! }
//!
//! impl Plugin for TickSource {
//!     fn base(&self) -> &PluginBase {
//!         &self.base
//!     }
//! }
//!
//! export_plugin!(TickSource);
//! ```
//!
//! Build as a `cdylib` and hand the path to the `rotor` binary (or
//! `ILLIXR_PLUGINS`).

pub use rotor_core::*;

pub use rotor_runtime;

/// Everything a plugin crate usually needs.
pub mod prelude {
    pub use std::sync::Arc;

    pub use rotor_core::bus::{BufferedReader, Bus, NetworkWriter, Reader, Writer};
    pub use rotor_core::clock::{RelativeClock, TimePoint, freq_to_period};
    pub use rotor_core::export_plugin;
    pub use rotor_core::plugin::{Plugin, PluginBase, PluginId};
    pub use rotor_core::services::ServiceDirectory;
    pub use rotor_core::stoplight::Stoplight;
    pub use rotor_core::threadloop::{LoopBody, LoopControl, SkipOption, ThreadLoop};

    pub use rotor_runtime::runtime::Runtime;
}
