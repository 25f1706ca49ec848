//! # bramble-core
//!
//! Coordination layer for the Bramble groovebox: a service registry for
//! composing long-lived subsystems, state channels for handing values between
//! threads, and action registries for synchronous command fan-out.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bramble_core::itc::{Consumer, QueueExecutor};
//! use bramble_core::service::Application;
//! use bramble_core::state::StateManager;
//! use bramble_types::TransportState;
//!
//! // 1. Compose services; a Runtime is started first
//! let mut app = Application::new();
//! let state = app.start::<StateManager, _>(|_| Arc::new(StateManager::new(TransportState::default())));
//!
//! // 2. Subscribe from a thread that drains its own executor
//! let ui = Arc::new(QueueExecutor::new("ui"));
//! let transport = Consumer::new(&state.transport(), ui.clone());
//!
//! // 3. Producers commit, consumers see the latest value after a drain
//! state.commit_transport(|t| t.play());
//! ui.run_queued_functions();
//! assert!(transport.state().playing);
//!
//! // 4. Services stop in reverse start order
//! app.stop();
//! ```
//!
//! ## Module Overview
//!
//! - [`service`]: `ServiceRegistry`, `ServiceHandle`, `ServiceAccessor`,
//!   `Application` composition root and the `Runtime` stop signal
//! - [`itc`]: executors, executor threads, state channels and consumers,
//!   actions and action registries
//! - [`state`]: `StateManager`, the owner of the transport channel
//! - [`config`]: TOML configuration loading (embedded + user override)

pub mod config;
pub mod itc;
pub mod service;
pub mod state;
