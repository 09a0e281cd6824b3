//! Worker-thread plumbing shared by the bus and the plugin model.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Cooperative stop request shared between a [`ManagedThread`] and its body.
#[derive(Debug, Default)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// An owned OS thread that is stopped and joined when asked, or when the
/// owner is dropped.
///
/// The body receives the shared [`StopFlag`] and is expected to poll it at
/// its suspension points; there is no hard cancellation. Stopping a thread
/// whose body ignores the flag will block the caller in `join`.
pub struct ManagedThread {
    flag: Arc<StopFlag>,
    handle: Option<JoinHandle<()>>,
}

impl ManagedThread {
    /// Spawns a named thread running `body`.
    pub fn spawn<F>(name: impl Into<String>, body: F) -> io::Result<Self>
    where
        F: FnOnce(&StopFlag) + Send + 'static,
    {
        let flag = Arc::new(StopFlag::default());
        let thread_flag = Arc::clone(&flag);
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || body(&thread_flag))?;
        Ok(Self {
            flag,
            handle: Some(handle),
        })
    }

    /// Whether the thread has neither been stopped nor finished joining.
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.flag.is_stop_requested()
    }

    /// The shared stop flag, for handing to collaborators.
    pub fn stop_flag(&self) -> Arc<StopFlag> {
        Arc::clone(&self.flag)
    }

    /// Requests a stop and joins the thread.
    ///
    /// A panic that escaped the body aborts the process: the fabric does not
    /// catch worker failures.
    pub fn stop(&mut self) {
        self.flag.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked; aborting");
                std::process::abort();
            }
        }
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// CPU time consumed by the calling thread.
///
/// Used for per-callback accounting records; wall time alone cannot
/// distinguish compute from blocking.
#[cfg(unix)]
pub fn thread_cpu_time() -> Duration {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return Duration::ZERO;
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

#[cfg(not(unix))]
pub fn thread_cpu_time() -> Duration {
    Duration::ZERO
}
