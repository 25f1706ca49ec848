//! Type-indexed table of active services.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::handle::ServiceHandle;

/// Bound for anything that can occupy a service slot.
///
/// Usually a `dyn Trait` service interface; the concrete implementation sits
/// behind the `Arc` and is never used as the lookup key.
pub trait Service: Send + Sync + 'static {}

impl<T: ?Sized + Send + Sync + 'static> Service for T {}

/// Bare type name of a service: module path and `dyn ` stripped.
pub fn service_name<S: ?Sized + 'static>() -> &'static str {
    let full = std::any::type_name::<S>();
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Another instance of this service type is already registered.
    AlreadyActive { service: &'static str },
    /// The instance being unregistered is not the active one.
    NotActive { service: &'static str },
    /// The handle has no running instance.
    NotStarted { service: &'static str },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::AlreadyActive { service } => write!(
                f,
                "Registering service '{}', when another is already registered",
                service
            ),
            ServiceError::NotActive { service } => write!(
                f,
                "Unregistering service '{}' different from the one registered",
                service
            ),
            ServiceError::NotStarted { service } => {
                write!(f, "Service '{}' has not been started", service)
            }
        }
    }
}

impl std::error::Error for ServiceError {}

struct Slot {
    name: &'static str,
    /// Always an `Arc<S>` for the `S` whose `TypeId` keys this slot.
    instance: Box<dyn Any + Send + Sync>,
}

/// One active instance per service type.
///
/// Owned by the composition root and shared as `Arc<ServiceRegistry>`; there
/// is no process-wide global. Lookups take a read lock that is only ever
/// contended during start/stop.
#[derive(Default)]
pub struct ServiceRegistry {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` as the active `S`.
    pub fn register<S: ?Sized + Service>(&self, instance: Arc<S>) -> Result<(), ServiceError> {
        let name = service_name::<S>();
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&TypeId::of::<S>()) {
            return Err(ServiceError::AlreadyActive { service: name });
        }
        slots.insert(
            TypeId::of::<S>(),
            Slot {
                name,
                instance: Box::new(instance),
            },
        );
        log::debug!(target: "service", "registered {}", name);
        Ok(())
    }

    /// Unregister `instance`. Fails unless it is the currently active `S`.
    pub fn unregister<S: ?Sized + Service>(&self, instance: &Arc<S>) -> Result<(), ServiceError> {
        let name = service_name::<S>();
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let is_ours = slots
            .get(&TypeId::of::<S>())
            .and_then(|slot| slot.instance.downcast_ref::<Arc<S>>())
            .is_some_and(|active| same_instance(active, instance));
        if !is_ours {
            return Err(ServiceError::NotActive { service: name });
        }
        slots.remove(&TypeId::of::<S>());
        log::debug!(target: "service", "unregistered {}", name);
        Ok(())
    }

    /// The active `S`, if any. Never blocks on anything but a start/stop in flight.
    pub fn lookup<S: ?Sized + Service>(&self) -> Option<Arc<S>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&TypeId::of::<S>())
            .and_then(|slot| slot.instance.downcast_ref::<Arc<S>>())
            .cloned()
    }

    pub fn is_active<S: ?Sized + Service>(&self) -> bool {
        self.is_active_id(TypeId::of::<S>())
    }

    pub(crate) fn is_active_id(&self, id: TypeId) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.contains_key(&id)
    }

    /// Names of all active services, sorted.
    pub fn active_services(&self) -> Vec<&'static str> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = slots.values().map(|slot| slot.name).collect();
        names.sort_unstable();
        names
    }

    /// Create an unstarted handle for `S`.
    pub fn handle<S, F>(self: &Arc<Self>, constructor: F) -> ServiceHandle<S>
    where
        S: ?Sized + Service,
        F: Fn(&Arc<ServiceRegistry>) -> Arc<S> + Send + 'static,
    {
        ServiceHandle::new(Arc::clone(self), constructor)
    }

    /// Construct and register an `S`. Panics if one is already active.
    #[must_use = "the returned handle manages the lifetime of the service"]
    pub fn start<S, F>(self: &Arc<Self>, constructor: F) -> ServiceHandle<S>
    where
        S: ?Sized + Service,
        F: Fn(&Arc<ServiceRegistry>) -> Arc<S> + Send + 'static,
    {
        let mut handle = self.handle(constructor);
        handle.start();
        handle
    }
}

/// Address identity, ignoring trait-object metadata.
pub(crate) fn same_instance<S: ?Sized>(a: &Arc<S>, b: &Arc<S>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> u32;
    }

    struct Four;

    impl Greeter for Four {
        fn greet(&self) -> u32 {
            4
        }
    }

    #[test]
    fn register_lookup_unregister() {
        let registry = ServiceRegistry::new();
        assert!(registry.lookup::<dyn Greeter>().is_none());

        let instance: Arc<dyn Greeter> = Arc::new(Four);
        registry.register(Arc::clone(&instance)).unwrap();
        let found = registry.lookup::<dyn Greeter>().unwrap();
        assert!(same_instance(&found, &instance));
        assert_eq!(found.greet(), 4);

        registry.unregister(&instance).unwrap();
        assert!(registry.lookup::<dyn Greeter>().is_none());
    }

    #[test]
    fn second_instance_is_rejected() {
        let registry = ServiceRegistry::new();
        let first: Arc<dyn Greeter> = Arc::new(Four);
        let second: Arc<dyn Greeter> = Arc::new(Four);
        registry.register(first).unwrap();
        assert_eq!(
            registry.register(second),
            Err(ServiceError::AlreadyActive { service: "Greeter" })
        );
    }

    #[test]
    fn unregistering_a_stranger_fails() {
        let registry = ServiceRegistry::new();
        let active: Arc<dyn Greeter> = Arc::new(Four);
        let stranger: Arc<dyn Greeter> = Arc::new(Four);
        registry.register(Arc::clone(&active)).unwrap();
        assert_eq!(
            registry.unregister(&stranger),
            Err(ServiceError::NotActive { service: "Greeter" })
        );
        assert!(registry.is_active::<dyn Greeter>());
    }

    #[test]
    fn concrete_and_interface_slots_are_distinct() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Four)).unwrap();
        assert!(registry.is_active::<Four>());
        assert!(!registry.is_active::<dyn Greeter>());
    }

    #[test]
    fn names() {
        assert_eq!(service_name::<dyn Greeter>(), "Greeter");
        assert_eq!(service_name::<Four>(), "Four");
        assert_eq!(service_name::<u32>(), "u32");

        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Four)).unwrap();
        let greeter: Arc<dyn Greeter> = Arc::new(Four);
        registry.register(greeter).unwrap();
        assert_eq!(registry.active_services(), vec!["Four", "Greeter"]);
    }
}
