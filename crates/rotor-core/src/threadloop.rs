//! A reusable thread loop for plugins.
//!
//! Many plugins are "one long-running loop": poll a sensor, render a frame,
//! drain an encoder. [`ThreadLoop`] factors that shape out: a plugin that
//! owns one thread which waits at the stoplight's `ready` barrier, then runs
//! a [`LoopBody`] iteration gated by [`LoopBody::should_skip`] until the
//! runtime stops or the body terminates itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::error;

use crate::plugin::{Plugin, PluginBase};
use crate::services::ServiceDirectory;
use crate::stoplight::Stoplight;

const READY_POLL: Duration = Duration::from_millis(100);

/// What the loop should do with the upcoming iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOption {
    /// Run the iteration now.
    Run,
    /// Give up a scheduling quantum, then ask again. Kinder to the rest of
    /// the system; the quantum is OS-determined, usually 1-10 ms.
    SkipAndYield,
    /// Retry immediately (busy wait).
    SkipAndSpin,
    /// Terminate the loop.
    Stop,
}

/// The per-plugin computation driven by a [`ThreadLoop`].
pub trait LoopBody: Send + 'static {
    /// Runs once on the loop thread after `ready`, before the first
    /// iteration.
    fn thread_setup(&mut self, _control: &LoopControl) {}

    /// Gates each iteration. Called in a tight loop.
    fn should_skip(&mut self, _control: &LoopControl) -> SkipOption {
        SkipOption::Run
    }

    /// One iteration of the plugin's work.
    fn one_iteration(&mut self, control: &LoopControl);
}

/// Shared state between a running loop and everyone observing it.
#[derive(Debug, Default)]
pub struct LoopControl {
    internal_stop: AtomicBool,
    iteration_no: AtomicUsize,
    skip_no: AtomicUsize,
}

impl LoopControl {
    /// Requests self-termination, independent of the global stoplight. For
    /// bodies that run out of data.
    pub fn stop(&self) {
        self.internal_stop.store(true, Ordering::Release);
    }

    /// Whether self-termination was requested. Long-running iterations
    /// should poll this to stay responsive.
    pub fn should_terminate(&self) -> bool {
        self.internal_stop.load(Ordering::Acquire)
    }

    /// Completed iterations.
    pub fn iteration_no(&self) -> usize {
        self.iteration_no.load(Ordering::Relaxed)
    }

    /// Consecutive skips since the last run iteration.
    pub fn skip_no(&self) -> usize {
        self.skip_no.load(Ordering::Relaxed)
    }
}

/// A plugin owning one long-running loop thread.
///
/// Composed with a [`LoopBody`] carrying the plugin-specific state:
///
/// ```rust,ignore
/// struct CameraPoll { camera: Camera, frames: Writer<Frame> }
///
/// impl LoopBody for CameraPoll {
///     fn one_iteration(&mut self, _control: &LoopControl) {
///         let frame = self.camera.grab();
///         self.frames.put(self.frames.allocate(frame));
///     }
/// }
///
/// let plugin = ThreadLoop::new("camera", services, CameraPoll { .. });
/// ```
pub struct ThreadLoop<B: LoopBody> {
    base: PluginBase,
    stoplight: Arc<Stoplight>,
    control: Arc<LoopControl>,
    body: Option<B>,
    handle: Option<JoinHandle<()>>,
}

impl<B: LoopBody> ThreadLoop<B> {
    /// # Panics
    ///
    /// Panics if the [`Stoplight`] service is not registered.
    pub fn new(name: impl Into<String>, services: Arc<ServiceDirectory>, body: B) -> Self {
        let stoplight = services.lookup_impl::<Stoplight>();
        Self {
            base: PluginBase::new(name, services),
            stoplight,
            control: Arc::new(LoopControl::default()),
            body: Some(body),
            handle: None,
        }
    }

    /// The shared loop state, for observers and for bodies that hand the
    /// self-terminate hook to their callbacks.
    pub fn control(&self) -> Arc<LoopControl> {
        Arc::clone(&self.control)
    }
}

impl<B: LoopBody> Plugin for ThreadLoop<B> {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    /// Spawns the loop thread. The thread holds at the `ready` barrier, so
    /// starting is cheap and ordered with the rest of startup.
    fn start(&mut self) {
        self.base.emit_start_record();
        assert!(
            !self.stoplight.check_should_stop(),
            "thread loop '{}' started after shutdown began",
            self.base.name(),
        );

        let mut body = self
            .body
            .take()
            .unwrap_or_else(|| panic!("thread loop '{}' started twice", self.base.name()));
        let stoplight = Arc::clone(&self.stoplight);
        let control = Arc::clone(&self.control);
        let thread_name = self.base.name().to_string();

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                // Hold at the barrier, but bail out if shutdown begins before
                // the runtime ever reaches ready.
                while !stoplight.check_should_stop()
                    && !stoplight.wait_for_ready_timeout(READY_POLL)
                {
                }
                if stoplight.check_should_stop() {
                    return;
                }

                body.thread_setup(&control);

                while !stoplight.check_should_stop() && !control.should_terminate() {
                    match body.should_skip(&control) {
                        SkipOption::Run => {
                            body.one_iteration(&control);
                            control.iteration_no.fetch_add(1, Ordering::Relaxed);
                            control.skip_no.store(0, Ordering::Relaxed);
                        }
                        SkipOption::SkipAndYield => {
                            std::thread::yield_now();
                            control.skip_no.fetch_add(1, Ordering::Relaxed);
                        }
                        SkipOption::SkipAndSpin => {
                            std::hint::spin_loop();
                            control.skip_no.fetch_add(1, Ordering::Relaxed);
                        }
                        SkipOption::Stop => break,
                    }
                }
            })
            .expect("failed to spawn thread loop");
        self.handle = Some(handle);
    }

    /// Joins the loop thread. `should_stop` must already be signalled.
    fn stop(&mut self) {
        assert!(
            self.stoplight.check_should_stop(),
            "thread loop '{}' stopped before should_stop was signalled",
            self.base.name(),
        );
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(plugin = self.base.name(), "thread loop panicked; aborting");
                std::process::abort();
            }
        }
    }
}
