//! The service directory: a threadsafe map from interface identity to a
//! shared, long-lived service instance.
//!
//! Dynamically-loaded plugins cannot statically construct each other's
//! collaborators. Instead, the plugin providing a capability registers an
//! implementation under the capability's type, and any later plugin looks it
//! up by that type without knowing who provided it:
//!
//! ```rust,ignore
//! // Provider (registering a trait interface):
//! services.register_impl::<dyn PosePredictor>(Arc::new(MyPredictor::new()));
//!
//! // Consumer:
//! let predictor = services.lookup_impl::<dyn PosePredictor>();
//! predictor.predict(at);
//! ```
//!
//! Registrations happen at startup; lookups happen anytime, so the registry
//! sits behind a reader-writer lock. The directory shares ownership of each
//! service; a service outlives the directory only if some other owner exists.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

// Stored as Arc<Arc<S>> behind dyn Any so that `S` may itself be unsized
// (`dyn Trait` interface keys).
type StoredService = Arc<dyn Any + Send + Sync>;

/// Type-keyed registry of shared services.
#[derive(Default)]
pub struct ServiceDirectory {
    registry: RwLock<HashMap<TypeId, (StoredService, &'static str)>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `implementation` as *the* instance of `S` for this run.
    ///
    /// `S` is usually a `dyn Trait` interface, but concrete service types
    /// work the same way.
    ///
    /// # Panics
    ///
    /// Panics if an implementation of `S` is already registered. Double
    /// registration is a build integration bug.
    pub fn register_impl<S>(&self, implementation: Arc<S>)
    where
        S: ?Sized + Any + Send + Sync,
    {
        let mut registry = self.registry.write();
        debug!(service = type_name::<S>(), "registering service");
        let previous = registry.insert(
            TypeId::of::<S>(),
            (Arc::new(implementation) as StoredService, type_name::<S>()),
        );
        assert!(
            previous.is_none(),
            "service '{}' registered twice",
            type_name::<S>(),
        );
    }

    /// Looks up the registered implementation of `S`.
    ///
    /// # Panics
    ///
    /// Panics if no implementation of `S` was registered.
    pub fn lookup_impl<S>(&self) -> Arc<S>
    where
        S: ?Sized + Any + Send + Sync,
    {
        self.try_lookup_impl::<S>().unwrap_or_else(|| {
            panic!(
                "looked up unregistered service '{}'",
                type_name::<S>(),
            )
        })
    }

    /// Looks up the registered implementation of `S`, if any.
    pub fn try_lookup_impl<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + Any + Send + Sync,
    {
        let registry = self.registry.read();
        let (stored, name) = registry.get(&TypeId::of::<S>())?;
        let handle = stored
            .downcast_ref::<Arc<S>>()
            .unwrap_or_else(|| panic!("service entry for '{name}' holds an unexpected type"));
        Some(Arc::clone(handle))
    }

    /// Whether an implementation of `S` is registered.
    pub fn has_impl<S>(&self) -> bool
    where
        S: ?Sized + Any + Send + Sync,
    {
        self.registry.read().contains_key(&TypeId::of::<S>())
    }
}

impl std::fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_set()
            .entries(registry.values().map(|(_, name)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct Counter(u32);

    #[test]
    fn register_and_lookup_concrete_type() {
        let services = ServiceDirectory::new();
        services.register_impl(Arc::new(Counter(7)));
        assert!(services.has_impl::<Counter>());
        assert_eq!(services.lookup_impl::<Counter>().0, 7);
    }

    #[test]
    fn register_and_lookup_trait_interface() {
        let services = ServiceDirectory::new();
        services.register_impl::<dyn Greeter>(Arc::new(English));
        let greeter = services.lookup_impl::<dyn Greeter>();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn lookup_returns_the_same_handle() {
        let services = ServiceDirectory::new();
        services.register_impl(Arc::new(Counter(1)));
        let a = services.lookup_impl::<Counter>();
        let b = services.lookup_impl::<Counter>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let services = ServiceDirectory::new();
        services.register_impl(Arc::new(Counter(1)));
        services.register_impl(Arc::new(Counter(2)));
    }

    #[test]
    #[should_panic(expected = "unregistered service")]
    fn lookup_of_absent_service_panics() {
        let services = ServiceDirectory::new();
        let _ = services.lookup_impl::<Counter>();
    }

    #[test]
    fn try_lookup_of_absent_service_is_none() {
        let services = ServiceDirectory::new();
        assert!(services.try_lookup_impl::<Counter>().is_none());
        assert!(!services.has_impl::<Counter>());
    }
}
