//! Per-subscription worker threads.

use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use super::event::ErasedEvent;
use crate::clock::{RelativeClock, TimePoint};
use crate::plugin::PluginId;
use crate::record::{Record, RecordCoalescer, RecordHeader, RecordLogger, Value, ValueKind};
use crate::stoplight::Stoplight;
use crate::thread::{ManagedThread, thread_cpu_time};

/// How long a worker blocks on its queue before re-checking its stop flag.
pub(crate) const QUEUE_TIMEOUT: Duration = Duration::from_millis(100);

pub(crate) type ErasedCallback = Box<dyn Fn(ErasedEvent, usize) + Send + Sync>;

static CALLBACK_HEADER: LazyLock<Arc<RecordHeader>> = LazyLock::new(|| {
    Arc::new(RecordHeader::new(
        "switchboard_callback",
        &[
            ("plugin_id", ValueKind::Int),
            ("topic_name", ValueKind::Str),
            ("iteration_no", ValueKind::Int),
            ("cpu_time_start", ValueKind::DurationNs),
            ("cpu_time_stop", ValueKind::DurationNs),
            ("wall_time_start", ValueKind::TimePoint),
            ("wall_time_stop", ValueKind::TimePoint),
        ],
    ))
});

static TOPIC_STOP_HEADER: LazyLock<Arc<RecordHeader>> = LazyLock::new(|| {
    Arc::new(RecordHeader::new(
        "switchboard_topic_stop",
        &[
            ("plugin_id", ValueKind::Int),
            ("topic_name", ValueKind::Str),
            ("enqueued", ValueKind::Int),
            ("dequeued", ValueKind::Int),
            ("idle_cycles", ValueKind::Int),
        ],
    ))
});

/// One scheduled callback on a topic: an unbounded FIFO queue drained by a
/// dedicated worker thread.
///
/// The worker holds at the stoplight's `ready` barrier (responsively to its
/// own stop flag), then loops on a timed dequeue: events invoke the user
/// callback and produce a timing record; timeouts bump the idle counter. On
/// stop the remaining backlog is discarded and a summary record is emitted.
pub(crate) struct Subscription {
    sender: Sender<ErasedEvent>,
    enqueued: Arc<AtomicUsize>,
    worker: ManagedThread,
}

impl Subscription {
    pub(crate) fn spawn(
        topic_name: String,
        plugin_id: PluginId,
        callback: ErasedCallback,
        logger: Option<Arc<dyn RecordLogger>>,
        clock: Option<Arc<RelativeClock>>,
        stoplight: Option<Arc<Stoplight>>,
    ) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<ErasedEvent>();
        let enqueued = Arc::new(AtomicUsize::new(0));

        let worker_enqueued = Arc::clone(&enqueued);
        let worker_name = format!("sub-{topic_name}");
        let worker = ManagedThread::spawn(worker_name, move |stop| {
            if let Some(stoplight) = &stoplight {
                while !stop.is_stop_requested() && !stoplight.wait_for_ready_timeout(QUEUE_TIMEOUT)
                {
                }
            }

            let now = |clock: &Option<Arc<RelativeClock>>| {
                clock
                    .as_ref()
                    .filter(|c| c.is_started())
                    .map(|c| c.now())
                    .unwrap_or(TimePoint::ZERO)
            };

            let mut callback_log = RecordCoalescer::new(logger.clone());
            let mut dequeued = 0usize;
            let mut idle_cycles = 0usize;

            while !stop.is_stop_requested() {
                match receiver.recv_timeout(QUEUE_TIMEOUT) {
                    Ok(event) => {
                        dequeued += 1;
                        let cpu_start = thread_cpu_time();
                        let wall_start = now(&clock);
                        callback(event, dequeued);
                        callback_log.log(Record::new(
                            CALLBACK_HEADER.clone(),
                            vec![
                                Value::from(plugin_id),
                                Value::from(topic_name.as_str()),
                                Value::from(dequeued),
                                Value::from(cpu_start),
                                Value::from(thread_cpu_time()),
                                Value::from(wall_start),
                                Value::from(now(&clock)),
                            ],
                        ));
                    }
                    Err(RecvTimeoutError::Timeout) => idle_cycles += 1,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            // Discard the backlog; these events were published but will never
            // reach the callback.
            while receiver.try_recv().is_ok() {}
            callback_log.flush();

            if let Some(logger) = &logger {
                logger.log(Record::new(
                    TOPIC_STOP_HEADER.clone(),
                    vec![
                        Value::from(plugin_id),
                        Value::from(topic_name.as_str()),
                        Value::from(worker_enqueued.load(Ordering::Acquire)),
                        Value::from(dequeued),
                        Value::from(idle_cycles),
                    ],
                ));
            }
        })
        .expect("failed to spawn subscription worker");

        Self {
            sender,
            enqueued,
            worker,
        }
    }

    /// Hands `event` to this subscriber. Thread-safe; called by the topic
    /// under its fanout lock.
    pub(crate) fn enqueue(&self, event: ErasedEvent) {
        if self.worker.is_running() && self.sender.send(event).is_ok() {
            self.enqueued.fetch_add(1, Ordering::Release);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Stop the worker before the sender goes away so the backlog is
        // discarded rather than processed to exhaustion.
        self.worker.stop();
    }
}
