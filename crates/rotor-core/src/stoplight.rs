//! Lifecycle synchronization: the [`Flag`] condition and the three-phase
//! [`Stoplight`] barrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A boolean condition-variable.
///
/// Inspired by `threading.Event` from the Python standard library: a flag
/// that threads can wait on, woken by broadcast when the value transitions
/// from false to true.
#[derive(Default)]
pub struct Flag {
    state: Mutex<bool>,
    condvar: Condvar,
    // Mirrors `state` so is_set() never takes the lock.
    value: AtomicBool,
}

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag to `new_value`, waking all waiters on a false-to-true
    /// transition.
    pub fn set(&self, new_value: bool) {
        {
            let mut state = self.state.lock();
            *state = new_value;
            self.value.store(new_value, Ordering::Release);
        }
        if new_value {
            self.condvar.notify_all();
        }
    }

    /// Clears the flag.
    pub fn clear(&self) {
        self.set(false);
    }

    /// Tests the flag without blocking.
    pub fn is_set(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    /// Waits indefinitely for the flag to become set.
    pub fn wait(&self) {
        if self.is_set() {
            return;
        }
        let mut state = self.state.lock();
        while !*state {
            self.condvar.wait(&mut state);
        }
    }

    /// Waits for the flag to become set, up to `timeout`.
    ///
    /// Returns whether the flag was actually set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !*state {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                return *state;
            }
        }
        true
    }
}

impl std::fmt::Debug for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flag").field("set", &self.is_set()).finish()
    }
}

/// Start/stop synchronization for the whole runtime.
///
/// Worker threads should:
/// 1. Do initialization actions.
/// 2. Wait for `ready`.
/// 3. Do their main work in a loop until `should_stop`.
/// 4. Do their shutdown actions.
///
/// The driver's main thread should:
/// 1. Construct and start all plugins and construct all services.
/// 2. Signal `ready`.
/// 3. Wait for `should_stop`, tear everything down, signal
///    `shutdown_complete`.
///
/// Each phase transitions from false to true exactly once; clearing is not
/// exposed. A thread returning from [`wait_for_ready`](Self::wait_for_ready)
/// observes every service registration and every schedule call made before
/// the driver signalled `ready`.
#[derive(Debug, Default)]
pub struct Stoplight {
    ready: Flag,
    should_stop: Flag,
    shutdown_complete: Flag,
}

impl Stoplight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_ready(&self) {
        self.ready.set(true);
    }

    pub fn check_ready(&self) -> bool {
        self.ready.is_set()
    }

    pub fn wait_for_ready(&self) {
        self.ready.wait();
    }

    /// Bounded wait used by workers that must stay responsive to their own
    /// stop flag while the runtime is still starting up.
    pub fn wait_for_ready_timeout(&self, timeout: Duration) -> bool {
        self.ready.wait_timeout(timeout)
    }

    pub fn signal_should_stop(&self) {
        self.should_stop.set(true);
    }

    pub fn check_should_stop(&self) -> bool {
        self.should_stop.is_set()
    }

    pub fn wait_for_should_stop(&self) {
        self.should_stop.wait();
    }

    pub fn wait_for_should_stop_timeout(&self, timeout: Duration) -> bool {
        self.should_stop.wait_timeout(timeout)
    }

    pub fn signal_shutdown_complete(&self) {
        self.shutdown_complete.set(true);
    }

    pub fn check_shutdown_complete(&self) -> bool {
        self.shutdown_complete.is_set()
    }

    pub fn wait_for_shutdown_complete(&self) {
        self.shutdown_complete.wait();
    }
}
