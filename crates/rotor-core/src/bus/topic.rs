//! A single named, typed event stream.

use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::event::ErasedEvent;
use super::subscription::{ErasedCallback, Subscription};
use crate::clock::RelativeClock;
use crate::net::NetworkError;
use crate::plugin::PluginId;
use crate::record::RecordLogger;
use crate::stoplight::Stoplight;

/// Capacity of the latest-value ring.
pub(crate) const LATEST_RING_CAPACITY: usize = 256;

pub(crate) type Decoder = Box<dyn Fn(&[u8]) -> Result<ErasedEvent, NetworkError> + Send + Sync>;

#[derive(Default)]
struct Fanout {
    subscriptions: Vec<Subscription>,
    buffers: Vec<Sender<ErasedEvent>>,
}

/// A topic: latest-value ring plus subscriber and buffered-reader fanout.
///
/// Topics are type-erased so the bus can hold them homogeneously; the
/// runtime type tag set at creation is checked against every later typed
/// handle.
pub(crate) struct Topic {
    name: String,
    tag: TypeId,
    type_name: &'static str,
    logger: Option<Arc<dyn RecordLogger>>,
    clock: Option<Arc<RelativeClock>>,
    stoplight: Option<Arc<Stoplight>>,
    // Publish counter; the slot at `latest_index % capacity` holds the most
    // recent event. Grows without bound.
    latest_index: AtomicUsize,
    ring: Vec<Mutex<Option<ErasedEvent>>>,
    fanout: RwLock<Fanout>,
    decoder: Mutex<Option<Decoder>>,
}

impl Topic {
    pub(crate) fn new(
        name: String,
        tag: TypeId,
        type_name: &'static str,
        logger: Option<Arc<dyn RecordLogger>>,
        clock: Option<Arc<RelativeClock>>,
        stoplight: Option<Arc<Stoplight>>,
    ) -> Self {
        Self {
            name,
            tag,
            type_name,
            logger,
            clock,
            stoplight,
            latest_index: AtomicUsize::new(0),
            ring: (0..LATEST_RING_CAPACITY).map(|_| Mutex::new(None)).collect(),
            fanout: RwLock::new(Fanout::default()),
            decoder: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Verifies that a handle requested with type `requested` matches this
    /// topic's tag.
    ///
    /// # Panics
    ///
    /// Panics on a mismatch. A topic's type is fixed by whichever handle
    /// factory reaches it first; disagreement is a build integration bug.
    pub(crate) fn check_type(&self, requested: TypeId, requested_name: &'static str) {
        assert!(
            self.tag == requested,
            "topic '{}' holds events of type {}, but the caller used type {}",
            self.name,
            self.type_name,
            requested_name,
        );
    }

    /// Publishes an event: write the ring slot, bump the counter, fan out to
    /// every subscription queue and buffered reader.
    ///
    /// The slot becomes observable before the counter increment commits; a
    /// slightly stale latest-value read is tolerated by design.
    pub(crate) fn put(&self, event: ErasedEvent) {
        assert!(
            Arc::strong_count(&event) <= 2,
            "event published to '{}' still has outstanding handles",
            self.name,
        );

        let slot = (self.latest_index.load(Ordering::Relaxed) + 1) % LATEST_RING_CAPACITY;
        *self.ring[slot].lock() = Some(event.clone());
        self.latest_index.fetch_add(1, Ordering::Release);

        let fanout = self.fanout.read();
        for subscription in &fanout.subscriptions {
            subscription.enqueue(event.clone());
        }
        for buffer in &fanout.buffers {
            let _ = buffer.send(event.clone());
        }
    }

    /// The most recently published event, if any.
    pub(crate) fn get(&self) -> Option<ErasedEvent> {
        let slot = self.latest_index.load(Ordering::Acquire) % LATEST_RING_CAPACITY;
        self.ring[slot].lock().clone()
    }

    /// Appends a subscription and starts its worker thread.
    pub(crate) fn schedule(&self, plugin_id: PluginId, callback: ErasedCallback) {
        let subscription = Subscription::spawn(
            self.name.clone(),
            plugin_id,
            callback,
            self.logger.clone(),
            self.clock.clone(),
            self.stoplight.clone(),
        );
        self.fanout.write().subscriptions.push(subscription);
    }

    /// Attaches a new buffered-reader queue and returns its receiving end.
    pub(crate) fn buffer(&self) -> Receiver<ErasedEvent> {
        debug!(topic = %self.name, "topic buffer created");
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.fanout.write().buffers.push(sender);
        receiver
    }

    /// Installs the wire decoder used by [`deserialize_and_put`].
    ///
    /// [`deserialize_and_put`]: Self::deserialize_and_put
    pub(crate) fn set_decoder(&self, decoder: Decoder) {
        *self.decoder.lock() = Some(decoder);
    }

    /// Reconstructs an event from wire bytes and publishes it locally. Called
    /// by network backends on the receive side.
    pub(crate) fn deserialize_and_put(&self, bytes: &[u8]) -> Result<(), NetworkError> {
        let decoder = self.decoder.lock();
        let decoder = decoder.as_ref().ok_or_else(|| NetworkError::NoDecoder {
            topic: self.name.clone(),
        })?;
        let event = decoder(bytes)?;
        self.put(event);
        Ok(())
    }

    /// Stops and removes every subscription worker and disconnects every
    /// buffered reader. The ring stays in place so existing reader handles
    /// keep working.
    pub(crate) fn stop(&self) {
        let mut fanout = self.fanout.write();
        fanout.subscriptions.clear();
        fanout.buffers.clear();
    }
}
