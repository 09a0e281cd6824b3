//! The runtime driver: the only component that drives the stoplight and the
//! clock.
//!
//! Startup: construct and register the fabric services, load each configured
//! plugin shared object and `start()` it, start the clock, signal `ready`.
//! Shutdown (triggered by Ctrl-C, the run-duration timer, or any plugin
//! signalling `should_stop`): stop and drop plugins in reverse construction
//! order, stop the bus, signal `shutdown_complete`. Libraries are closed
//! after all plugins are gone.

use std::ffi::{CStr, c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use rotor_core::bus::Bus;
use rotor_core::clock::RelativeClock;
use rotor_core::plugin::{Plugin, PluginFactory};
use rotor_core::record::{GenGuid, RecordLogger};
use rotor_core::services::ServiceDirectory;
use rotor_core::stoplight::Stoplight;

use crate::loader::{DynamicLib, LoadError};
use crate::sink::{CsvRecordLogger, MetricsTap};

/// Where the default CSV record sink writes its tables.
const METRICS_DIR: &str = "metrics";

/// How long `ILLIXR_ENABLE_PRE_SLEEP` pauses startup, for attaching
/// debuggers or profilers before the pipeline starts moving.
const PRE_SLEEP: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to create the record sink: {0}")]
    Sink(#[from] std::io::Error),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// An opaque window-system handle passed in by an embedder, exposed to
/// display plugins as a service.
pub struct DisplayHandle(usize);

impl DisplayHandle {
    pub fn new(raw: *mut c_void) -> Self {
        Self(raw as usize)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

/// The runtime: fabric services plus the plugins loaded into this process.
pub struct Runtime {
    services: Arc<ServiceDirectory>,
    clock: Arc<RelativeClock>,
    stoplight: Arc<Stoplight>,
    bus: Arc<Bus>,
    // Plugins are declared before libraries so they are dropped first; a
    // library must outlive everything it vended.
    plugins: Vec<Box<dyn Plugin>>,
    libraries: Vec<DynamicLib>,
}

impl Runtime {
    /// A runtime with the default CSV record sink (tapped for stdout metrics
    /// when `ILLIXR_STDOUT_METRICS` is set).
    pub fn new() -> Result<Self, RuntimeError> {
        let csv = Arc::new(CsvRecordLogger::new(METRICS_DIR)?);
        // The bus does not exist yet; driver-level switches read the process
        // environment directly.
        let stdout_metrics = std::env::var("ILLIXR_STDOUT_METRICS")
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);
        let logger: Arc<dyn RecordLogger> = if stdout_metrics {
            Arc::new(MetricsTap::new(csv))
        } else {
            csv
        };
        Ok(Self::with_record_logger(logger))
    }

    /// A runtime writing records to the given sink. Used by embedders and
    /// tests that substitute their own sink.
    pub fn with_record_logger(logger: Arc<dyn RecordLogger>) -> Self {
        let services = Arc::new(ServiceDirectory::new());
        services.register_impl::<dyn RecordLogger>(logger);
        services.register_impl(Arc::new(GenGuid::new()));

        let clock = Arc::new(RelativeClock::new());
        services.register_impl(Arc::clone(&clock));

        let stoplight = Arc::new(Stoplight::new());
        services.register_impl(Arc::clone(&stoplight));

        let bus = Arc::new(Bus::new(Some(Arc::clone(&services))));
        services.register_impl(Arc::clone(&bus));

        Self {
            services,
            clock,
            stoplight,
            bus,
            plugins: Vec::new(),
            libraries: Vec::new(),
        }
    }

    pub fn services(&self) -> &Arc<ServiceDirectory> {
        &self.services
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn stoplight(&self) -> &Arc<Stoplight> {
        &self.stoplight
    }

    // ─── Plugin loading ──────────────────────────────────────────────────────

    /// Loads one plugin shared object and constructs its plugin.
    pub fn load_so(&mut self, path: &str) -> Result<(), RuntimeError> {
        let library = DynamicLib::open(path)?;
        let factory = library.plugin_factory()?;
        // SAFETY: the factory symbol honors the plugin ABI, and the library
        // outlives the plugin because `libraries` is dropped after `plugins`.
        unsafe { self.load_plugin_factory(factory) };
        self.libraries.push(library);
        Ok(())
    }

    /// Loads a colon-separated list of shared objects, in order.
    pub fn load_so_list(&mut self, list: &str) -> Result<(), RuntimeError> {
        for path in list.split(':').filter(|path| !path.is_empty()) {
            self.load_so(path)?;
        }
        Ok(())
    }

    /// Constructs a plugin from an already-resolved factory.
    ///
    /// # Safety
    ///
    /// `factory` must honor the plugin ABI and must not outlive the code it
    /// points into.
    pub unsafe fn load_plugin_factory(&mut self, factory: PluginFactory) {
        let raw = unsafe { factory(&raw const self.services) };
        assert!(!raw.is_null(), "plugin factory returned null");
        let handle = unsafe { Box::from_raw(raw) };
        let plugin = handle.into_inner();
        info!(plugin = plugin.name(), id = plugin.id(), "constructed plugin");
        self.plugins.push(plugin);
    }

    /// Constructs an in-process plugin (built-ins, tests, embedders).
    pub fn load_plugin<F>(&mut self, build: F)
    where
        F: FnOnce(Arc<ServiceDirectory>) -> Box<dyn Plugin>,
    {
        let plugin = build(Arc::clone(&self.services));
        info!(plugin = plugin.name(), id = plugin.id(), "constructed plugin");
        self.plugins.push(plugin);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Starts every plugin, starts the clock, and signals `ready`.
    ///
    /// A panic out of any plugin's `start()` is fatal: the process exits
    /// with a diagnostic naming the plugin.
    pub fn start(&mut self) {
        for plugin in &mut self.plugins {
            let name = plugin.name().to_string();
            info!(plugin = %name, "starting plugin");
            if catch_unwind(AssertUnwindSafe(|| plugin.start())).is_err() {
                error!(plugin = %name, "plugin start failed; aborting startup");
                std::process::exit(1);
            }
        }

        self.clock.start();

        if self.bus.get_env_bool("ILLIXR_ENABLE_PRE_SLEEP", false) {
            info!(seconds = PRE_SLEEP.as_secs(), "pre-sleep before ready");
            std::thread::sleep(PRE_SLEEP);
        }

        self.stoplight.signal_ready();
        info!(plugins = self.plugins.len(), "runtime ready");

        let run_duration = self.bus.get_env_long("ILLIXR_RUN_DURATION", 0);
        if run_duration > 0 {
            let stoplight = Arc::clone(&self.stoplight);
            let duration = Duration::from_secs(run_duration as u64);
            std::thread::Builder::new()
                .name("run-duration".into())
                .spawn(move || {
                    if !stoplight.wait_for_should_stop_timeout(duration) {
                        info!(seconds = duration.as_secs(), "run duration elapsed");
                        stoplight.signal_should_stop();
                    }
                })
                .expect("failed to spawn run-duration timer");
        }
    }

    /// Runs the full lifecycle: start, wait for `should_stop`, tear down.
    pub fn run(&mut self) {
        let stoplight = Arc::clone(&self.stoplight);
        if let Err(err) = ctrlc::set_handler(move || stoplight.signal_should_stop()) {
            warn!(error = %err, "could not install Ctrl-C handler");
        }

        self.start();
        self.stoplight.wait_for_should_stop();
        self.shutdown();
    }

    /// Stops and drops every plugin in reverse construction order, stops the
    /// bus, and signals `shutdown_complete`.
    ///
    /// A panic out of a plugin's `stop()` is logged; teardown continues.
    pub fn shutdown(&mut self) {
        info!("shutting down");
        while let Some(mut plugin) = self.plugins.pop() {
            let name = plugin.name().to_string();
            info!(plugin = %name, "stopping plugin");
            if catch_unwind(AssertUnwindSafe(|| plugin.stop())).is_err() {
                error!(plugin = %name, "plugin stop panicked; continuing teardown");
            }
        }

        self.bus.stop();
        self.stoplight.signal_shutdown_complete();
        info!("shutdown complete");
    }

    /// Blocks until shutdown has completed.
    pub fn wait(&self) {
        self.stoplight.wait_for_shutdown_complete();
    }
}

// ─── Embedding ABI ───────────────────────────────────────────────────────────

/// Creates a runtime for an embedding compositor. `display_handle` may be
/// null; when present it is registered as a [`DisplayHandle`] service for
/// display plugins. Returns null when construction fails.
#[unsafe(no_mangle)]
pub extern "C" fn runtime_factory(display_handle: *mut c_void) -> *mut Runtime {
    match Runtime::new() {
        Ok(runtime) => {
            if !display_handle.is_null() {
                runtime
                    .services
                    .register_impl(Arc::new(DisplayHandle::new(display_handle)));
            }
            Box::into_raw(Box::new(runtime))
        }
        Err(err) => {
            error!(error = %err, "failed to construct runtime");
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `runtime` must come from [`runtime_factory`]; `path` must be a valid
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn runtime_load_so(runtime: *mut Runtime, path: *const c_char) -> bool {
    let runtime = unsafe { &mut *runtime };
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy();
    match runtime.load_so(&path) {
        Ok(()) => true,
        Err(err) => {
            error!(error = %err, "failed to load plugin library");
            false
        }
    }
}

/// # Safety
///
/// `runtime` must come from [`runtime_factory`]; `list` must be a valid
/// NUL-terminated colon-separated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn runtime_load_so_list(runtime: *mut Runtime, list: *const c_char) -> bool {
    let runtime = unsafe { &mut *runtime };
    let list = unsafe { CStr::from_ptr(list) }.to_string_lossy();
    match runtime.load_so_list(&list) {
        Ok(()) => true,
        Err(err) => {
            error!(error = %err, "failed to load plugin libraries");
            false
        }
    }
}

/// Runs the full lifecycle; blocks until shutdown completes.
///
/// # Safety
///
/// `runtime` must come from [`runtime_factory`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn runtime_run(runtime: *mut Runtime) {
    unsafe { &mut *runtime }.run();
}

/// Blocks until shutdown has completed.
///
/// # Safety
///
/// `runtime` must come from [`runtime_factory`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn runtime_wait(runtime: *const Runtime) {
    unsafe { &*runtime }.wait();
}

/// # Safety
///
/// `runtime` must come from [`runtime_factory`] and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn runtime_destroy(runtime: *mut Runtime) {
    drop(unsafe { Box::from_raw(runtime) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rotor_core::bus::Writer;
    use rotor_core::plugin::PluginBase;
    use rotor_core::record::{Record, Value};
    use rotor_core::threadloop::{LoopBody, LoopControl, ThreadLoop};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CaptureLogger {
        records: Mutex<Vec<Record>>,
    }

    impl RecordLogger for CaptureLogger {
        fn log(&self, record: Record) {
            self.records.lock().push(record);
        }
    }

    /// A service one plugin provides and another consumes.
    struct PoseFeed {
        clock: Arc<RelativeClock>,
    }

    struct FeedProvider {
        base: PluginBase,
    }

    impl FeedProvider {
        fn new(name: &str, services: Arc<ServiceDirectory>) -> Self {
            let clock = services.lookup_impl::<RelativeClock>();
            services.register_impl(Arc::new(PoseFeed { clock }));
            Self {
                base: PluginBase::new(name, services),
            }
        }
    }

    impl Plugin for FeedProvider {
        fn base(&self) -> &PluginBase {
            &self.base
        }
    }

    struct FeedConsumer {
        base: PluginBase,
        feed: Arc<PoseFeed>,
    }

    impl FeedConsumer {
        fn new(name: &str, services: Arc<ServiceDirectory>) -> Self {
            // Constructed after the provider, so the service is present.
            let feed = services.lookup_impl::<PoseFeed>();
            Self {
                base: PluginBase::new(name, services),
                feed,
            }
        }
    }

    impl Plugin for FeedConsumer {
        fn base(&self) -> &PluginBase {
            &self.base
        }

        fn stop(&mut self) {
            // stop() runs after ready, so the provider's clock is live.
            assert!(self.feed.clock.is_started());
            assert!(self.feed.clock.now() >= self.feed.clock.start_time());
        }
    }

    struct TickBody {
        writer: Writer<u64>,
        sequence: u64,
    }

    impl LoopBody for TickBody {
        fn one_iteration(&mut self, _control: &LoopControl) {
            self.sequence += 1;
            self.writer.put(self.writer.allocate(self.sequence));
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn run_to_completion(mut runtime: Runtime, run_for: Duration) -> Runtime {
        let stoplight = Arc::clone(runtime.stoplight());
        let driver = std::thread::spawn(move || {
            runtime.run();
            runtime
        });
        std::thread::sleep(run_for);
        stoplight.signal_should_stop();
        driver.join().expect("driver thread panicked")
    }

    #[test]
    fn full_lifecycle_starts_and_stops_cleanly() {
        let logger = Arc::new(CaptureLogger::default());
        let mut runtime = Runtime::with_record_logger(logger.clone());

        let ticks_seen = Arc::new(AtomicUsize::new(0));

        runtime.load_plugin(|services| Box::new(FeedProvider::new("feed_provider", services)));
        runtime.load_plugin(|services| Box::new(FeedConsumer::new("feed_consumer", services)));
        runtime.load_plugin(|services| {
            let bus = services.lookup_impl::<Bus>();
            let writer = bus.get_writer::<u64>("tick");
            Box::new(ThreadLoop::new(
                "tick_source",
                services,
                TickBody { writer, sequence: 0 },
            ))
        });

        let counter = Arc::clone(&ticks_seen);
        {
            // A consumer scheduled before ready; its callbacks only fire
            // after the driver signals ready.
            let bus = runtime.bus();
            bus.schedule::<u64, _>(0, "tick", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(ticks_seen.load(Ordering::SeqCst), 0);
        }

        let runtime = run_to_completion(runtime, Duration::from_millis(200));

        // Everything observed the full lifecycle.
        assert!(runtime.stoplight().check_shutdown_complete());
        let processed = ticks_seen.load(Ordering::SeqCst);
        assert!(processed > 0, "subscriber never ran");

        // Quiescent after shutdown-complete: no worker or loop still runs.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks_seen.load(Ordering::SeqCst), processed);

        // Each plugin announced itself, in construction order.
        let records = logger.records.lock();
        let started: Vec<String> = records
            .iter()
            .filter(|r| r.header().name() == "plugin_start")
            .map(|r| match r.value(1) {
                Value::Str(name) => name.clone(),
                other => panic!("unexpected plugin name {other:?}"),
            })
            .collect();
        assert_eq!(started, vec!["feed_provider", "feed_consumer", "tick_source"]);
    }

    #[test]
    fn consumer_plugin_holds_the_provider_service_handle() {
        let logger = Arc::new(CaptureLogger::default());
        let mut runtime = Runtime::with_record_logger(logger);

        runtime.load_plugin(|services| Box::new(FeedProvider::new("provider", services)));
        runtime.load_plugin(|services| Box::new(FeedConsumer::new("consumer", services)));

        let registered = runtime.services().lookup_impl::<PoseFeed>();
        let runtime = run_to_completion(runtime, Duration::from_millis(50));

        // Lookup keeps returning the same handle for the whole run, and the
        // consumer's clock works once the driver has started it.
        let again = runtime.services().lookup_impl::<PoseFeed>();
        assert!(Arc::ptr_eq(&registered, &again));
        assert!(registered.clock.now() >= registered.clock.start_time());
    }

    #[test]
    fn stop_panics_do_not_abort_teardown() {
        struct FaultyStop {
            base: PluginBase,
        }

        impl Plugin for FaultyStop {
            fn base(&self) -> &PluginBase {
                &self.base
            }

            fn stop(&mut self) {
                panic!("deliberate stop failure");
            }
        }

        let logger = Arc::new(CaptureLogger::default());
        let mut runtime = Runtime::with_record_logger(logger);
        runtime.load_plugin(|services| {
            Box::new(FaultyStop {
                base: PluginBase::new("faulty", services),
            })
        });
        runtime.load_plugin(|services| Box::new(FeedProvider::new("healthy", services)));

        let runtime = run_to_completion(runtime, Duration::from_millis(50));
        assert!(runtime.stoplight().check_shutdown_complete());
        assert!(runtime.plugins.is_empty());
    }

    #[test]
    fn run_duration_stops_the_runtime() {
        let logger = Arc::new(CaptureLogger::default());
        let mut runtime = Runtime::with_record_logger(logger);
        runtime.bus().set_env("ILLIXR_RUN_DURATION", "1");

        let started = Instant::now();
        runtime.run();
        assert!(runtime.stoplight().check_shutdown_complete());
        assert!(started.elapsed() >= Duration::from_secs(1));

        // Scrub the override so other tests are unaffected.
        runtime.bus().set_env("ILLIXR_RUN_DURATION", "");
    }
}
