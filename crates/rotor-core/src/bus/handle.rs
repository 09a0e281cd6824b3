//! Typed reader and writer handles over a topic.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::Receiver;
use thiserror::Error;
use tracing::warn;

use super::event::{ErasedEvent, Event};
use super::topic::Topic;
use crate::net::{
    NetworkBackend, NetworkError, SerializationMethod, TopicConfig, WireEvent, encode_event,
};

/// Errors surfaced by handles for expected-absence conditions.
#[derive(Debug, Error)]
pub enum BusError {
    /// No event has been published on the topic yet.
    #[error("no event on topic '{topic}'")]
    NoEvent { topic: String },
}

fn downcast<T: Event>(topic: &Topic, event: ErasedEvent) -> Arc<T> {
    event.downcast::<T>().unwrap_or_else(|_| {
        panic!(
            "topic '{}' delivered an event that is not the registered type",
            topic.name(),
        )
    })
}

/// A handle that reads the latest value on a topic.
///
/// Readers are non-owning: dropping one does not affect the topic.
pub struct Reader<T: Event> {
    topic: Arc<Topic>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Event> Reader<T> {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        Self {
            topic,
            _marker: PhantomData,
        }
    }

    /// The most recently published event, or `None` if nothing has been
    /// published yet.
    pub fn get(&self) -> Option<Arc<T>> {
        self.topic.get().map(|event| downcast(&self.topic, event))
    }

    /// The most recently published event; errs when the topic is still
    /// empty. For consumers that cannot proceed without a value.
    pub fn get_required(&self) -> Result<Arc<T>, BusError> {
        self.get().ok_or_else(|| BusError::NoEvent {
            topic: self.topic.name().to_string(),
        })
    }
}

impl<T: Event + Clone> Reader<T> {
    /// An owned, mutable copy of the latest value.
    pub fn get_cloned(&self) -> Option<T> {
        self.get().map(|event| (*event).clone())
    }
}

/// A handle that publishes events to a topic.
pub struct Writer<T: Event> {
    topic: Arc<Topic>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Event> Writer<T> {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        Self {
            topic,
            _marker: PhantomData,
        }
    }

    pub fn topic_name(&self) -> &str {
        self.topic.name()
    }

    /// Wraps a value in a shareable event handle.
    pub fn allocate(&self, value: T) -> Arc<T> {
        Arc::new(value)
    }

    /// Publishes `event` to the topic.
    ///
    /// The publisher surrenders its handle; at most one additional read-only
    /// copy may remain on the publishing side. Holding more is a build
    /// integration bug: published events are shared immutably with every
    /// subscriber.
    pub fn put(&self, event: Arc<T>) {
        assert!(
            Arc::strong_count(&event) <= 2,
            "event published to '{}' still has outstanding handles",
            self.topic.name(),
        );
        self.topic.put(event as ErasedEvent);
    }
}

/// A handle attached to a topic that never misses an event.
///
/// Where a [`Reader`] is lossy by design, a buffered reader owns an unbounded
/// FIFO queue fed by every publish. The consumer blocks in
/// [`dequeue`](Self::dequeue) until an event arrives or the topic is stopped.
pub struct BufferedReader<T: Event> {
    topic: Arc<Topic>,
    receiver: Receiver<ErasedEvent>,
    serial_no: AtomicUsize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Event> BufferedReader<T> {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        let receiver = topic.buffer();
        Self {
            topic,
            receiver,
            serial_no: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Number of events currently waiting in the queue.
    pub fn size(&self) -> usize {
        self.receiver.len()
    }

    /// Number of events dequeued so far.
    pub fn serial_no(&self) -> usize {
        self.serial_no.load(Ordering::Relaxed)
    }

    /// Blocks until the next event, returning `None` once the topic has been
    /// stopped and the queue is drained.
    pub fn dequeue(&self) -> Option<Arc<T>> {
        match self.receiver.recv() {
            Ok(event) => {
                self.serial_no.fetch_add(1, Ordering::Relaxed);
                Some(downcast(&self.topic, event))
            }
            Err(_) => None,
        }
    }
}

/// A writer that mirrors publishes to other processes when the topic is
/// networked.
///
/// When the backend claims the topic, the event is serialized per the topic's
/// [`TopicConfig`] and sent through the transport; the local publish then
/// happens on the receive side via the backend's loopback. A backend failure
/// is logged and the publish falls back to the in-process path, so local
/// subscribers never starve.
pub struct NetworkWriter<T: WireEvent> {
    writer: Writer<T>,
    backend: Arc<dyn NetworkBackend>,
    config: TopicConfig,
}

impl<T: WireEvent> NetworkWriter<T> {
    pub(crate) fn new(topic: Arc<Topic>, backend: Arc<dyn NetworkBackend>, config: TopicConfig) -> Self {
        Self {
            writer: Writer::new(topic),
            backend,
            config,
        }
    }

    pub fn topic_name(&self) -> &str {
        self.writer.topic_name()
    }

    /// Wraps a value in a shareable event handle.
    pub fn allocate(&self, value: T) -> Arc<T> {
        self.writer.allocate(value)
    }

    /// Publishes `event`, routing through the network backend when the topic
    /// is networked.
    pub fn put(&self, event: Arc<T>) {
        if self.backend.is_topic_networked(self.writer.topic_name()) {
            match self.serialize(&event) {
                Ok(payload) => match self.backend.topic_send(self.writer.topic_name(), payload) {
                    Ok(()) => return,
                    Err(err) => warn!(
                        topic = self.writer.topic_name(),
                        error = %err,
                        "network send failed; publishing in-process only"
                    ),
                },
                Err(err) => warn!(
                    topic = self.writer.topic_name(),
                    error = %err,
                    "event serialization failed; publishing in-process only"
                ),
            }
        }
        self.writer.put(event);
    }

    fn serialize(&self, event: &Arc<T>) -> Result<Vec<u8>, NetworkError> {
        match self.config.serialization {
            SerializationMethod::Typed => encode_event(&**event),
            SerializationMethod::Raw => {
                let payload = (event.as_ref() as &dyn Any)
                    .downcast_ref::<String>()
                    .expect("raw-serialized topics carry String events");
                Ok(payload.clone().into_bytes())
            }
        }
    }
}
