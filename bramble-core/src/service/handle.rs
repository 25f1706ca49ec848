use std::sync::Arc;

use super::registry::{same_instance, service_name, Service, ServiceError, ServiceRegistry};

type Constructor<S> = Box<dyn Fn(&Arc<ServiceRegistry>) -> Arc<S> + Send>;

/// Owns a service's constructor and, once started, its instance.
///
/// While started, the instance is the registry's active `S`. Dropping a
/// started handle unregisters it, so a registration can never outlive the
/// instance behind it.
pub struct ServiceHandle<S: ?Sized + Service> {
    registry: Arc<ServiceRegistry>,
    constructor: Constructor<S>,
    service: Option<Arc<S>>,
}

impl<S: ?Sized + Service> ServiceHandle<S> {
    pub fn new<F>(registry: Arc<ServiceRegistry>, constructor: F) -> Self
    where
        F: Fn(&Arc<ServiceRegistry>) -> Arc<S> + Send + 'static,
    {
        Self {
            registry,
            constructor: Box::new(constructor),
            service: None,
        }
    }

    /// Construct the instance and register it. Panics if an `S` is already active.
    pub fn start(&mut self) -> &mut Self {
        if let Err(e) = self.try_start() {
            panic!("{}", e);
        }
        self
    }

    pub fn try_start(&mut self) -> Result<(), ServiceError> {
        // Checked before construction so a doomed constructor never runs.
        if self.started() || self.registry.is_active::<S>() {
            return Err(ServiceError::AlreadyActive {
                service: service_name::<S>(),
            });
        }
        let instance = (self.constructor)(&self.registry);
        self.registry.register(Arc::clone(&instance))?;
        self.service = Some(instance);
        log::info!(target: "service", "started {}", service_name::<S>());
        Ok(())
    }

    /// Unregister and drop the instance. Panics if it is not the active `S`.
    pub fn stop(&mut self) {
        if let Err(e) = self.try_stop() {
            panic!("{}", e);
        }
    }

    pub fn try_stop(&mut self) -> Result<(), ServiceError> {
        let Some(instance) = self.service.as_ref() else {
            return Err(ServiceError::NotStarted {
                service: service_name::<S>(),
            });
        };
        self.registry.unregister(instance)?;
        self.service = None;
        log::info!(target: "service", "stopped {}", service_name::<S>());
        Ok(())
    }

    pub fn started(&self) -> bool {
        self.service.is_some()
    }

    /// The running instance. Panics if the handle is not started.
    pub fn service(&self) -> &Arc<S> {
        match &self.service {
            Some(instance) => instance,
            None => panic!("{}", ServiceError::NotStarted { service: service_name::<S>() }),
        }
    }

    /// The running instance, if started.
    pub fn get(&self) -> Option<&Arc<S>> {
        self.service.as_ref()
    }

    pub fn name(&self) -> &'static str {
        service_name::<S>()
    }

    /// Whether the registry's active `S` is this handle's instance.
    pub fn is_active(&self) -> bool {
        match (&self.service, self.registry.lookup::<S>()) {
            (Some(ours), Some(active)) => same_instance(ours, &active),
            _ => false,
        }
    }
}

impl<S: ?Sized + Service> Drop for ServiceHandle<S> {
    fn drop(&mut self) {
        if self.started() {
            if let Err(e) = self.try_stop() {
                log::error!(target: "service", "failed to stop on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter: Send + Sync {
        fn value(&self) -> u32;
    }

    struct Fixed(u32);

    impl Counter for Fixed {
        fn value(&self) -> u32 {
            self.0
        }
    }

    fn fixed(n: u32) -> impl Fn(&Arc<ServiceRegistry>) -> Arc<dyn Counter> + Send + 'static {
        move |_: &Arc<ServiceRegistry>| -> Arc<dyn Counter> { Arc::new(Fixed(n)) }
    }

    #[test]
    fn drop_unregisters() {
        let registry = Arc::new(ServiceRegistry::new());
        {
            let handle = registry.start(fixed(4));
            assert!(handle.is_active());
            let active = registry.lookup::<dyn Counter>().unwrap();
            assert!(same_instance(&active, handle.service()));
        }
        assert!(registry.lookup::<dyn Counter>().is_none());
    }

    #[test]
    fn restart_after_stop() {
        let registry = Arc::new(ServiceRegistry::new());
        let mut handle = registry.start(fixed(1));
        assert_eq!(handle.get().map(|c| c.value()), Some(1));
        handle.stop();
        assert!(!handle.started());
        assert!(handle.get().is_none());
        assert!(registry.lookup::<dyn Counter>().is_none());

        let other = registry.start(fixed(2));
        assert_eq!(registry.lookup::<dyn Counter>().unwrap().value(), 2);
        drop(other);

        handle.start();
        assert_eq!(registry.lookup::<dyn Counter>().unwrap().value(), 1);
    }

    #[test]
    fn constructor_not_run_when_slot_taken() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let registry = Arc::new(ServiceRegistry::new());
        let _first = registry.start(fixed(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_ctor = Arc::clone(&calls);
        let mut second = registry.handle(move |_: &Arc<ServiceRegistry>| -> Arc<dyn Counter> {
            calls_in_ctor.fetch_add(1, Ordering::SeqCst);
            Arc::new(Fixed(2))
        });
        assert!(second.try_start().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!second.started());
    }

    #[test]
    fn stop_unstarted_is_an_error() {
        let registry = Arc::new(ServiceRegistry::new());
        let mut handle = registry.handle(fixed(1));
        assert_eq!(
            handle.try_stop(),
            Err(ServiceError::NotStarted { service: "Counter" })
        );
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn double_start_panics() {
        let registry = Arc::new(ServiceRegistry::new());
        let _a = registry.start(fixed(1));
        let _b = registry.start(fixed(2));
    }
}
