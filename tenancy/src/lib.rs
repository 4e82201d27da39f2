//! # Fibre Tenancy
//!
//! Per-tenant lifetime scopes for Rust services that serve many tenants from
//! one process.
//!
//! Fibre Tenancy keeps one long-lived, independently disposable scope per
//! tenant, built on top of a shared application scope. A tenant that was
//! never configured transparently gets a default scope the first time it is
//! used; a tenant can be configured with its own overrides before first use,
//! reconfigured later (the old scope is swapped out atomically and disposed),
//! or removed. All of this is safe to do from many threads at once.
//!
//! ## Core Concepts
//!
//! - **LifetimeScope**: A hierarchical, disposable registry of services.
//!   Child scopes resolve from their own registrations first, then from
//!   their ancestors.
//! - **ScopeRegistry**: The concurrent tenant → scope map with create-once,
//!   replace-and-dispose and cascading teardown semantics.
//! - **KeyIdentifier**: Works out the current tenant from ambient context,
//!   e.g. a thread-local set by request-handling code.
//! - **MultitenantContainer**: Looks like a single scope but delegates every
//!   call to the scope of the currently identified tenant.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_tenancy::{AmbientIdentifier, LifetimeScope, MultitenantContainer};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!   fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter;
//! impl Greeter for EnglishGreeter {
//!   fn greet(&self) -> String {
//!     "Hello!".to_string()
//!   }
//! }
//!
//! struct GermanGreeter;
//! impl Greeter for GermanGreeter {
//!   fn greet(&self) -> String {
//!     "Hallo!".to_string()
//!   }
//! }
//!
//! fn main() -> fibre_tenancy::Result<()> {
//!   // Application-wide registrations.
//!   let app = LifetimeScope::root(|builder| {
//!     builder.add_singleton_trait::<dyn Greeter>(|_| Ok(Arc::new(EnglishGreeter)));
//!   });
//!
//!   let container = MultitenantContainer::new(app, AmbientIdentifier::<String>::new());
//!
//!   // Override the greeter for one tenant only.
//!   container.configure_tenant(Some("berlin".to_string()), |builder| {
//!     builder.add_singleton_trait::<dyn Greeter>(|_| Ok(Arc::new(GermanGreeter)));
//!   })?;
//!
//!   // No tenant identified: the default tenant sees the application greeter.
//!   assert_eq!(container.resolve::<dyn Greeter>()?.greet(), "Hello!");
//!
//!   // Code running on behalf of "berlin" sees the override.
//!   let _tenant = AmbientIdentifier::enter("berlin".to_string());
//!   assert_eq!(container.resolve::<dyn Greeter>()?.greet(), "Hallo!");
//!   Ok(())
//! }
//! ```

mod builder;
mod components;
mod config;
mod container;
mod core;
mod disposer;
mod error;
mod events;
mod identify;
mod key;
mod scope;
mod tenants;

pub use builder::ScopeBuilder;
pub use components::ComponentRegistry;
pub use config::{Configuration, ConfigurationBuilder};
pub use container::MultitenantContainer;
pub use crate::core::InjectionKey;
pub use disposer::{AsyncDisposable, Disposable, Disposer};
pub use error::{Error, Result};
pub use events::{ScopeEvent, SubscriptionId};
pub use identify::{AmbientGuard, AmbientIdentifier, KeyIdentifier, StaticIdentifier};
pub use key::{TenantId, TenantKey};
pub use scope::{LifetimeScope, ScopeTag};
pub use tenants::{Scope, ScopeFactory, ScopeRegistry, TenantScopeFactory, TENANT_SCOPE_TAG};
