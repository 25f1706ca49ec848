mod common;

use std::sync::Arc;

use bramble_core::service::{Application, ServiceAccessor, ServiceError, ServiceRegistry};
use common::{English, Greeter, Welsh};

#[test]
fn test_single_active_instance() {
    let registry = Arc::new(ServiceRegistry::new());
    let mut first = registry.handle::<dyn Greeter, _>(|_: &Arc<ServiceRegistry>| Arc::new(English) as Arc<dyn Greeter>);
    let mut second = registry.handle::<dyn Greeter, _>(|_: &Arc<ServiceRegistry>| Arc::new(Welsh) as Arc<dyn Greeter>);

    first.start();
    assert_eq!(
        second.try_start(),
        Err(ServiceError::AlreadyActive { service: "Greeter" })
    );
    assert_eq!(registry.lookup::<dyn Greeter>().unwrap().greet(), "hello");

    first.stop();
    assert!(registry.lookup::<dyn Greeter>().is_none());
    second.start();
    assert_eq!(registry.lookup::<dyn Greeter>().unwrap().greet(), "helo");
}

#[test]
#[should_panic(expected = "Registering service 'Greeter', when another is already registered")]
fn test_second_start_is_fatal() {
    let registry = Arc::new(ServiceRegistry::new());
    let _first = registry.start::<dyn Greeter, _>(|_: &Arc<ServiceRegistry>| Arc::new(English) as Arc<dyn Greeter>);
    let _second = registry.start::<dyn Greeter, _>(|_: &Arc<ServiceRegistry>| Arc::new(Welsh) as Arc<dyn Greeter>);
}

#[test]
fn test_unregister_requires_the_registered_instance() {
    let registry = ServiceRegistry::new();
    let active: Arc<dyn Greeter> = Arc::new(English);
    let impostor: Arc<dyn Greeter> = Arc::new(English);
    registry.register(Arc::clone(&active)).unwrap();
    assert_eq!(
        registry.unregister(&impostor),
        Err(ServiceError::NotActive { service: "Greeter" })
    );
    assert!(registry.is_active::<dyn Greeter>());
    registry.unregister(&active).unwrap();
    assert!(!registry.is_active::<dyn Greeter>());
}

#[test]
fn test_accessor_sees_services_started_later() {
    let registry = Arc::new(ServiceRegistry::new());
    let accessor = ServiceAccessor::new(Arc::clone(&registry)).require::<dyn Greeter>();
    assert_eq!(accessor.missing(), vec!["Greeter"]);
    assert!(accessor.try_service::<dyn Greeter>().is_none());

    let handle = registry.start::<dyn Greeter, _>(|_: &Arc<ServiceRegistry>| Arc::new(Welsh) as Arc<dyn Greeter>);
    assert_eq!(accessor.service::<dyn Greeter>().greet(), "helo");
    drop(handle);
    assert!(accessor.try_service::<dyn Greeter>().is_none());
}

#[test]
#[should_panic(expected = "Tried to access service 'Greeter' with none registered")]
fn test_accessor_panics_when_absent() {
    let registry = Arc::new(ServiceRegistry::new());
    let accessor = ServiceAccessor::new(registry).require::<dyn Greeter>();
    let _ = accessor.service::<dyn Greeter>();
}

#[test]
fn test_application_stops_in_reverse_order() {
    let mut app = Application::new();
    let greeter = app.start::<dyn Greeter, _>(|_: &Arc<ServiceRegistry>| Arc::new(English) as Arc<dyn Greeter>);
    assert_eq!(greeter.greet(), "hello");
    assert!(app.runtime().should_run());
    let registry = Arc::clone(app.registry());
    assert!(registry.is_active::<dyn Greeter>());

    app.stop();
    assert!(!registry.is_active::<dyn Greeter>());
    assert!(registry.active_services().is_empty());
    app.stop();
}
