//! Watches the "tick" topic: a scheduled callback logs every tick, and a
//! latest-value reader reports the freshest tick at shutdown.

use std::sync::Arc;

use tracing::info;

use rotor_core::bus::{Bus, Reader};
use rotor_core::export_plugin;
use rotor_core::plugin::{Plugin, PluginBase};
use rotor_core::services::ServiceDirectory;

pub struct TickMonitor {
    base: PluginBase,
    latest: Reader<u64>,
}

impl TickMonitor {
    pub fn new(name: &str, services: Arc<ServiceDirectory>) -> Self {
        let bus = services.lookup_impl::<Bus>();
        let latest = bus.get_reader::<u64>("tick");
        Self {
            base: PluginBase::new(name, services),
            latest,
        }
    }
}

impl Plugin for TickMonitor {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn start(&mut self) {
        self.base.emit_start_record();
        let bus = self.base.services().lookup_impl::<Bus>();
        bus.schedule::<u64, _>(self.base.id(), "tick", |tick, iteration| {
            if iteration % 120 == 0 {
                info!(tick = *tick, iteration, "tick observed");
            }
        });
    }

    fn stop(&mut self) {
        match self.latest.get() {
            Some(tick) => info!(tick = *tick, "final tick"),
            None => info!("no tick was ever published"),
        }
    }
}

export_plugin!(TickMonitor);
