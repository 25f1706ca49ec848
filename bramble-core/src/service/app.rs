//! Composition root: owns the registry and the handles of every started service.

use std::sync::Arc;

use super::accessor::ServiceAccessor;
use super::handle::ServiceHandle;
use super::registry::{service_name, Service, ServiceRegistry};
use super::runtime::Runtime;

/// Type-erased view of a started handle so services of different types can
/// be stopped in one pass.
trait RunningService {
    fn name(&self) -> &'static str;
    fn stop_if_started(&mut self);
}

impl<S: ?Sized + Service> RunningService for ServiceHandle<S> {
    fn name(&self) -> &'static str {
        ServiceHandle::name(self)
    }

    fn stop_if_started(&mut self) {
        if self.started() {
            self.stop();
        }
    }
}

/// Starts services in order, stops them in reverse.
///
/// A `Runtime` is always the first service, so every loop started later can
/// watch the same stop flag.
pub struct Application {
    registry: Arc<ServiceRegistry>,
    runtime: Arc<Runtime>,
    services: Vec<Box<dyn RunningService>>,
}

impl Application {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ServiceRegistry::new()))
    }

    pub fn with_registry(registry: Arc<ServiceRegistry>) -> Self {
        let runtime_handle = registry.start(|_: &Arc<ServiceRegistry>| Arc::new(Runtime::new()));
        let runtime = Arc::clone(runtime_handle.service());
        Self {
            registry,
            runtime,
            services: vec![Box::new(runtime_handle)],
        }
    }

    /// Start `S` and keep its handle. Panics if an `S` is already active.
    pub fn start<S, F>(&mut self, constructor: F) -> Arc<S>
    where
        S: ?Sized + Service,
        F: Fn(&Arc<ServiceRegistry>) -> Arc<S> + Send + 'static,
    {
        let handle = self.registry.start(constructor);
        let service = Arc::clone(handle.service());
        self.services.push(Box::new(handle));
        service
    }

    /// The active `S`. Panics if none is registered.
    pub fn service<S: ?Sized + Service>(&self) -> Arc<S> {
        match self.registry.lookup::<S>() {
            Some(service) => service,
            None => panic!(
                "Tried to access service '{}' with none registered",
                service_name::<S>()
            ),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn accessor(&self) -> ServiceAccessor {
        ServiceAccessor::new(Arc::clone(&self.registry))
    }

    /// Request a runtime stop, then stop every service in reverse start order.
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        if self.services.is_empty() {
            return;
        }
        self.runtime.request_stop();
        log::info!(
            target: "service::app",
            "shutting down: {}",
            self.registry.active_services().join(", ")
        );
        while let Some(mut service) = self.services.pop() {
            log::debug!(target: "service::app", "stopping {}", service.name());
            service.stop_if_started();
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.stop();
    }
}
