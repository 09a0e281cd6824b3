//! Publishes a `u64` sequence on the "tick" topic at 120 Hz.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use rotor_core::bus::{Bus, Writer};
use rotor_core::clock::freq_to_period;
use rotor_core::export_plugin;
use rotor_core::services::ServiceDirectory;
use rotor_core::threadloop::{LoopBody, LoopControl, SkipOption, ThreadLoop};

const DEFAULT_TICK_RATE_HZ: f64 = 120.0;

pub struct TickBody {
    writer: Writer<u64>,
    rate_hz: f64,
    sequence: u64,
    next_due: Option<Instant>,
}

impl LoopBody for TickBody {
    fn thread_setup(&mut self, _control: &LoopControl) {
        self.next_due = Some(Instant::now());
    }

    fn should_skip(&mut self, _control: &LoopControl) -> SkipOption {
        let due = self.next_due.expect("set in thread_setup");
        if Instant::now() < due {
            return SkipOption::SkipAndYield;
        }
        self.next_due = Some(due + freq_to_period(self.rate_hz));
        SkipOption::Run
    }

    fn one_iteration(&mut self, _control: &LoopControl) {
        self.sequence += 1;
        self.writer.put(self.writer.allocate(self.sequence));
        debug!(sequence = self.sequence, "tick");
    }
}

pub struct TickSource;

impl TickSource {
    pub fn new(name: &str, services: Arc<ServiceDirectory>) -> ThreadLoop<TickBody> {
        let bus = services.lookup_impl::<Bus>();
        let writer = bus.get_writer::<u64>("tick");
        let rate_hz = bus.get_env_double("ILLIXR_TICK_RATE", DEFAULT_TICK_RATE_HZ);
        ThreadLoop::new(
            name,
            services,
            TickBody {
                writer,
                rate_hz,
                sequence: 0,
                next_due: None,
            },
        )
    }
}

export_plugin!(TickSource);
