//! The publishable-value contract.

use std::any::Any;
use std::sync::Arc;

/// A value that can be published on a topic.
///
/// Blanket-implemented: any `'static + Send + Sync` type qualifies. Once
/// published an event is immutable, shared by reference counting between the
/// latest-value ring and every subscriber queue.
pub trait Event: Any + Send + Sync {}

impl<T: Any + Send + Sync> Event for T {}

/// Type-erased shared event handle. Topics hold all events in this form and
/// the typed handles downcast at the edge.
pub(crate) type ErasedEvent = Arc<dyn Any + Send + Sync>;
