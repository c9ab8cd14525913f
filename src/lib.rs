//! # Invitation Container
//!
//! Dependency wiring for a wedding invitation backend. Repositories, image
//! storage and services are registered once at startup against typed capability
//! tokens and resolved as shared singletons everywhere else.
//!
//! ## Quick Start
//!
//! ```rust
//! use invitation_container::container::{capabilities, setup_dependencies};
//! use invitation_container::domain::NewUser;
//! use invitation_container::{AppConfig, Registry};
//!
//! let registry = Registry::new();
//! setup_dependencies(&registry, &AppConfig::default()).unwrap();
//!
//! let users = registry.resolve::<capabilities::UserService>().unwrap();
//! let anna = users
//!     .register_user(NewUser {
//!         username: "anna".into(),
//!         display_name: "Anna & Minh".into(),
//!         email: None,
//!     })
//!     .unwrap();
//!
//! // Same instance on every resolve
//! let again = registry.resolve::<capabilities::UserService>().unwrap();
//! assert_eq!(again.get_user_by_username("anna").unwrap().id, anna.id);
//! ```
//!
//! ## Features
//!
//! - **Typed capabilities**: a token names what is provided; its instance type is fixed by the token
//! - **Lazy singletons**: providers run on first resolve, concurrent resolves share one instance
//! - **Cycle detection**: a provider that needs itself fails with [`RegistryError::CircularDependency`]
//! - **One-time setup**: [`Registry::setup`] runs its wiring at most once per registry
//! - **Tracing support**: every operation is emitted as a [`RegistryEvent`] and a `tracing` event
//!
//! ## Main Entry Points
//!
//! - [`define_capability!`] - Declare capability tokens
//! - [`Registry::register`] / [`Registry::register_with`] - Bind providers
//! - [`Registry::resolve`] - Fetch the shared instance
//! - [`get_instance`] - The process-wide registry
//! - [`container::init_di`] - Register the whole application on the process-wide registry

mod capability;
mod macros;
mod registry;
mod registry_error;
mod registry_event;

pub mod cleanup;
pub mod config;
pub mod container;
pub mod domain;
pub mod logging;
pub mod repository;
pub mod service;
pub mod storage;

pub use capability::{Capability, CapabilityId};
pub use config::{AppConfig, ConfigError};
pub use registry::{get_instance, Registry, TraceCallback};
pub use registry_error::RegistryError;
pub use registry_event::RegistryEvent;
