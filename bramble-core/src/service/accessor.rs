use std::any::TypeId;
use std::sync::Arc;

use super::registry::{service_name, Service, ServiceRegistry};

/// Capability bundle for components that depend on services.
///
/// Declared services are looked up on every access, so the accessor always
/// sees the currently active instance and never caches a stopped one.
#[derive(Clone)]
pub struct ServiceAccessor {
    registry: Arc<ServiceRegistry>,
    required: Vec<(TypeId, &'static str)>,
}

impl ServiceAccessor {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            required: Vec::new(),
        }
    }

    /// Declare a dependency on `S`. Warns if `S` is not active yet; the
    /// component may legitimately be built before its dependencies start.
    pub fn require<S: ?Sized + Service>(mut self) -> Self {
        let name = service_name::<S>();
        if !self.registry.is_active::<S>() {
            log::warn!(target: "service", "ServiceAccessor constructed with no service {} available", name);
        }
        self.required.push((TypeId::of::<S>(), name));
        self
    }

    /// The active `S`. Panics if none is registered.
    pub fn service<S: ?Sized + Service>(&self) -> Arc<S> {
        debug_assert!(
            self.declares::<S>(),
            "service '{}' accessed without being required",
            service_name::<S>()
        );
        match self.registry.lookup::<S>() {
            Some(service) => service,
            None => panic!(
                "Tried to access service '{}' with none registered",
                service_name::<S>()
            ),
        }
    }

    /// The active `S`, or None. For components that outlive their dependencies.
    pub fn try_service<S: ?Sized + Service>(&self) -> Option<Arc<S>> {
        self.registry.lookup::<S>()
    }

    /// Required services that are not active right now.
    pub fn missing(&self) -> Vec<&'static str> {
        self.required
            .iter()
            .filter(|(id, _)| !self.registry.is_active_id(*id))
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    fn declares<S: ?Sized + Service>(&self) -> bool {
        self.required.iter().any(|(id, _)| *id == TypeId::of::<S>())
    }
}
