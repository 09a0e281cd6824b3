//! # rotor-core
//!
//! The coordination fabric of the Rotor XR runtime: everything independently
//! developed perception, rendering, and display plugins need to find each
//! other and cooperate, and nothing else.
//!
//! - [`services`]: the [`ServiceDirectory`](services::ServiceDirectory),
//!   locating shared collaborators by interface identity.
//! - [`bus`]: typed named topics with latest-value, buffered, and scheduled
//!   delivery, plus the process-wide env cache.
//! - [`plugin`] / [`threadloop`]: the dynamically-loadable unit and its
//!   reusable loop shape.
//! - [`stoplight`]: the ready / should-stop / shutdown-complete lifecycle
//!   barrier.
//! - [`clock`]: the single monotonic time authority.
//! - [`record`]: schema'd record logging and unique-ID allocation.
//! - [`net`]: the pluggable transport contract for cross-process topics.
//!
//! The fabric schedules nothing itself: plugins own their threads, the OS
//! schedules them, and the stoplight is the only global synchronization.

pub mod bus;
pub mod clock;
pub mod net;
pub mod plugin;
pub mod record;
pub mod services;
pub mod stoplight;
pub mod thread;
pub mod threadloop;

pub use bus::{BufferedReader, Bus, BusError, Event, NetworkWriter, Reader, Writer};
pub use clock::{RelativeClock, TimePoint, freq_to_period};
pub use net::{NetworkBackend, NetworkError, SerializationMethod, TopicConfig, WireEvent};
pub use plugin::{Plugin, PluginBase, PluginFactory, PluginHandle, PluginId};
pub use record::{GenGuid, Record, RecordCoalescer, RecordHeader, RecordLogger, Value, ValueKind};
pub use services::ServiceDirectory;
pub use stoplight::{Flag, Stoplight};
pub use threadloop::{LoopBody, LoopControl, SkipOption, ThreadLoop};
