//! The dynamically-loadable plugin model.
//!
//! A plugin is a unit of functionality loaded at startup, constructed with
//! its instance name and the [`ServiceDirectory`], and driven through
//! `start()`/`stop()` by the runtime. Plugins may register services, schedule
//! bus callbacks, or own threads; a plain service-registering plugin needs
//! none of the latter.
//!
//! Concrete plugins embed a [`PluginBase`] and implement [`Plugin`]:
//!
//! ```rust,ignore
//! struct PosePublisher {
//!     base: PluginBase,
//! }
//!
//! impl PosePublisher {
//!     fn new(name: &str, services: Arc<ServiceDirectory>) -> Self {
//!         Self { base: PluginBase::new(name, services) }
//!     }
//! }
//!
//! impl Plugin for PosePublisher {
//!     fn base(&self) -> &PluginBase {
//!         &self.base
//!     }
//! }
//!
//! export_plugin!(PosePublisher);
//! ```

use std::sync::{Arc, LazyLock};

use crate::record::{GenGuid, Record, RecordHeader, RecordLogger, Value, ValueKind};
use crate::services::ServiceDirectory;

/// Process-unique plugin identifier, claimed from [`GenGuid`] at
/// construction.
pub type PluginId = usize;

/// Symbol every plugin shared object must export.
pub const PLUGIN_FACTORY_SYMBOL: &[u8] = b"this_plugin_factory";

static PLUGIN_START_HEADER: LazyLock<Arc<RecordHeader>> = LazyLock::new(|| {
    Arc::new(RecordHeader::new(
        "plugin_start",
        &[
            ("plugin_id", ValueKind::Int),
            ("plugin_name", ValueKind::Str),
        ],
    ))
});

/// State shared by every plugin: name, process-unique ID, and handles to the
/// fabric services it claimed them from.
pub struct PluginBase {
    name: String,
    id: PluginId,
    services: Arc<ServiceDirectory>,
    record_logger: Arc<dyn RecordLogger>,
    gen_guid: Arc<GenGuid>,
}

impl PluginBase {
    /// Claims a plugin ID and the logging services from the directory.
    ///
    /// # Panics
    ///
    /// Panics if the record logger or GUID services are missing; the runtime
    /// registers both before any plugin is constructed.
    pub fn new(name: impl Into<String>, services: Arc<ServiceDirectory>) -> Self {
        let record_logger = services.lookup_impl::<dyn RecordLogger>();
        let gen_guid = services.lookup_impl::<GenGuid>();
        let id = gen_guid.get();
        Self {
            name: name.into(),
            id,
            services,
            record_logger,
            gen_guid,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> PluginId {
        self.id
    }

    pub fn services(&self) -> &Arc<ServiceDirectory> {
        &self.services
    }

    pub fn record_logger(&self) -> &Arc<dyn RecordLogger> {
        &self.record_logger
    }

    pub fn gen_guid(&self) -> &Arc<GenGuid> {
        &self.gen_guid
    }

    /// Logs the `plugin_start` record announcing this plugin.
    pub fn emit_start_record(&self) {
        self.record_logger.log(Record::new(
            PLUGIN_START_HEADER.clone(),
            vec![Value::from(self.id), Value::from(self.name.as_str())],
        ));
    }
}

/// Lifecycle hooks every plugin provides.
pub trait Plugin: Send {
    /// The embedded [`PluginBase`].
    fn base(&self) -> &PluginBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn id(&self) -> PluginId {
        self.base().id()
    }

    /// Called by the runtime once all fabric services exist. The default
    /// emits the `plugin_start` record; overriders should do the same via
    /// [`PluginBase::emit_start_record`] before their own setup.
    fn start(&mut self) {
        self.base().emit_start_record();
    }

    /// Called by the runtime before destruction, while the rest of the
    /// plugin is still intact. This is the place to join plugin-owned threads.
    fn stop(&mut self) {}
}

/// FFI-safe box around a plugin, passed across the shared-object boundary.
pub struct PluginHandle {
    plugin: Box<dyn Plugin>,
}

impl PluginHandle {
    pub fn new(plugin: Box<dyn Plugin>) -> Self {
        Self { plugin }
    }

    pub fn into_inner(self) -> Box<dyn Plugin> {
        self.plugin
    }
}

/// The factory every plugin shared object exports under
/// [`PLUGIN_FACTORY_SYMBOL`]. Ownership of the returned handle transfers to
/// the caller.
pub type PluginFactory =
    unsafe extern "C" fn(services: *const Arc<ServiceDirectory>) -> *mut PluginHandle;

/// Exports the C-callable plugin factory for `$plugin`.
///
/// `$plugin` must provide `fn new(name: &str, services: Arc<ServiceDirectory>)
/// -> Self`; the type's own name becomes the plugin instance name.
#[macro_export]
macro_rules! export_plugin {
    ($plugin:ty) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn this_plugin_factory(
            services: *const ::std::sync::Arc<$crate::services::ServiceDirectory>,
        ) -> *mut $crate::plugin::PluginHandle {
            let services = ::std::sync::Arc::clone(unsafe { &*services });
            let plugin = <$plugin>::new(stringify!($plugin), services);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(
                $crate::plugin::PluginHandle::new(::std::boxed::Box::new(plugin)),
            ))
        }
    };
}
