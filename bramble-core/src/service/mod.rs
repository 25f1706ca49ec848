//! Typed service registry.
//!
//! Subsystems find the single active instance of each collaborator by type,
//! through a registry object owned by the composition root rather than a
//! global. Registration is scoped by [`ServiceHandle`]: dropping a started
//! handle unregisters its instance.

mod accessor;
mod app;
mod handle;
mod registry;
mod runtime;

pub use accessor::ServiceAccessor;
pub use app::Application;
pub use handle::ServiceHandle;
pub use registry::{service_name, Service, ServiceError, ServiceRegistry};
pub use runtime::Runtime;
