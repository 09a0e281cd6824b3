//! The process-wide monotonic time authority.
//!
//! Every timestamp exchanged between components derives from a single
//! [`RelativeClock`], started exactly once by the runtime driver after all
//! plugins are constructed and before `ready` is signalled. Decoupling from
//! wall-clock time keeps timestamps comparable across plugins without any
//! coordination, and allows deterministic replay from recorded datasets.

use std::ops::{Add, AddAssign, Sub};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// An instant on the [`RelativeClock`]: nanoseconds since the clock was
/// started.
///
/// This mimics `std::time::Instant` but is anchored to the runtime's own
/// origin rather than an arbitrary system epoch, so values from different
/// plugins are directly comparable. Differences between two `TimePoint`s
/// yield a [`Duration`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(Duration);

impl TimePoint {
    /// The clock's own origin.
    pub const ZERO: TimePoint = TimePoint(Duration::ZERO);

    /// Creates a time point from a duration since the clock start.
    pub const fn from_duration(since_start: Duration) -> Self {
        TimePoint(since_start)
    }

    /// Creates a time point from whole nanoseconds since the clock start.
    pub const fn from_nanos(nanos: u64) -> Self {
        TimePoint(Duration::from_nanos(nanos))
    }

    /// Elapsed time between the clock start and this point.
    pub const fn since_start(&self) -> Duration {
        self.0
    }

    /// Nanoseconds since the clock start.
    pub fn as_nanos(&self) -> i64 {
        self.0.as_nanos() as i64
    }

    /// Elapsed time since an earlier point.
    ///
    /// # Panics
    ///
    /// Panics if `earlier` is later than `self`.
    pub fn duration_since(&self, earlier: TimePoint) -> Duration {
        self.0
            .checked_sub(earlier.0)
            .expect("supplied TimePoint is later than self")
    }
}

impl Sub for TimePoint {
    type Output = Duration;

    fn sub(self, rhs: TimePoint) -> Duration {
        self.duration_since(rhs)
    }
}

impl Add<Duration> for TimePoint {
    type Output = TimePoint;

    fn add(self, rhs: Duration) -> TimePoint {
        TimePoint(self.0 + rhs)
    }
}

impl AddAssign<Duration> for TimePoint {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

/// The single relative monotonic clock shared by the whole runtime.
///
/// Registered as a service in the [`ServiceDirectory`] by the runtime driver,
/// which is the only component allowed to call [`start`](Self::start).
///
/// [`ServiceDirectory`]: crate::services::ServiceDirectory
///
/// # Example
///
/// ```rust,ignore
/// let clock: Arc<RelativeClock> = services.lookup_impl();
/// let t0 = clock.now();
/// // ... work ...
/// let elapsed = clock.now() - t0;
/// ```
#[derive(Debug, Default)]
pub struct RelativeClock {
    // Monotonic origin paired with the wall clock at the same moment,
    // the latter only for absolute_ns correlation.
    origin: OnceLock<(Instant, SystemTime)>,
}

impl RelativeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock. All times are relative to this point.
    ///
    /// The contract is "call exactly once, by the runtime driver, after all
    /// plugins are constructed, before `ready` is signalled". A second call
    /// is ignored; the first origin wins.
    pub fn start(&self) {
        let _ = self.origin.set((Instant::now(), SystemTime::now()));
    }

    /// Whether [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.origin.get().is_some()
    }

    /// The current time on this clock.
    ///
    /// # Panics
    ///
    /// Panics if the clock has not been started. Calling `now()` before the
    /// driver signals `ready` is a build integration bug, not a runtime
    /// condition to recover from.
    pub fn now(&self) -> TimePoint {
        let (origin, _) = self
            .origin
            .get()
            .expect("RelativeClock::now() called before the clock was started");
        TimePoint(origin.elapsed())
    }

    /// The start of the clock, which is the zero point of every [`TimePoint`].
    pub fn start_time(&self) -> TimePoint {
        TimePoint::ZERO
    }

    /// Converts a relative time point to absolute wall-clock nanoseconds
    /// since the unix epoch, for correlating with external records.
    ///
    /// # Panics
    ///
    /// Panics if the clock has not been started.
    pub fn absolute_ns(&self, relative: TimePoint) -> i64 {
        let (_, wall) = self
            .origin
            .get()
            .expect("RelativeClock::absolute_ns() called before the clock was started");
        let wall_ns = wall
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos() as i64;
        wall_ns + relative.as_nanos()
    }
}

/// Converts a rate in Hz to the period between iterations.
///
/// Useful for rate-gated thread loops: a 144 Hz display yields a period of
/// ~6.9 ms.
pub fn freq_to_period(hz: f64) -> Duration {
    Duration::from_nanos((1_000_000_000.0 / hz) as u64)
}
