//! The `MultitenantContainer` and its associated methods.

use crate::builder::ScopeBuilder;
use crate::components::ComponentRegistry;
use crate::disposer::Disposer;
use crate::error::Result;
use crate::events::{ScopeEvent, SubscriptionId};
use crate::identify::KeyIdentifier;
use crate::key::{TenantId, TenantKey};
use crate::scope::{LifetimeScope, ScopeTag};
use crate::tenants::{ScopeRegistry, TenantScopeFactory};
use std::any::Any;
use std::sync::Arc;

/// A container that looks like a single lifetime scope but serves each
/// tenant from its own scope.
///
/// Every scope-level operation first asks the [`KeyIdentifier`] for the
/// current tenant (falling back to the default tenant), fetches or lazily
/// creates that tenant's scope, and then delegates to it unchanged. Call
/// sites that only resolve services never need to know tenants exist.
///
/// Tenant scopes are children of the application scope, so anything not
/// overridden for a tenant is resolved from the application registrations.
///
/// # Event subscriptions
///
/// [`on_child_scope_beginning`](Self::on_child_scope_beginning) and
/// [`on_scope_ending`](Self::on_scope_ending) subscribe to the scope that is
/// current *at the time of the call*. The subscription stays with that
/// scope: it is not moved if the tenant is later reconfigured, and it does
/// not follow a different tenant being identified afterwards.
///
/// # Nested scopes
///
/// Scopes begun through [`begin_lifetime_scope`](Self::begin_lifetime_scope)
/// and its variants are children of the tenant scope current at the time.
/// Like any child scope they are not disposed together with their parent:
/// they outlive a [`remove_tenant`](Self::remove_tenant) or
/// [`reconfigure_tenant`](Self::reconfigure_tenant) that disposes their
/// tenant scope, and must be disposed by whoever began them. Until then
/// they keep resolving their own registrations, while the disposed tenant
/// scope's registrations are gone and lookups continue in the application
/// scope.
///
/// ```
/// use fibre_tenancy::{AmbientIdentifier, LifetimeScope, MultitenantContainer};
///
/// let app = LifetimeScope::root(|builder| builder.add_instance(String::from("base")));
/// let container = MultitenantContainer::new(app, AmbientIdentifier::<&str>::new());
/// container
///   .configure_tenant(Some("acme"), |builder| builder.add_instance(String::from("acme")))
///   .unwrap();
///
/// assert_eq!(*container.resolve::<String>().unwrap(), "base");
/// let _tenant = AmbientIdentifier::enter("acme");
/// assert_eq!(*container.resolve::<String>().unwrap(), "acme");
/// ```
pub struct MultitenantContainer<K: TenantId, I> {
  registry: ScopeRegistry<K, TenantScopeFactory>,
  identifier: I,
}

impl<K: TenantId, I: KeyIdentifier<K>> MultitenantContainer<K, I> {
  /// Creates a container over `application_container`. The container takes
  /// ownership of the application scope and disposes it last.
  pub fn new(application_container: Arc<LifetimeScope>, identifier: I) -> Self {
    Self {
      registry: ScopeRegistry::new(application_container, TenantScopeFactory),
      identifier,
    }
  }

  /// The application scope all tenant scopes derive from.
  pub fn application_container(&self) -> &Arc<LifetimeScope> {
    self.registry.base_scope()
  }

  pub fn identifier(&self) -> &I {
    &self.identifier
  }

  /// The underlying tenant scope registry.
  pub fn registry(&self) -> &ScopeRegistry<K, TenantScopeFactory> {
    &self.registry
  }

  // --- Tenant Scopes ---

  /// The scope of the currently identified tenant, created on first use.
  pub fn current_tenant_scope(&self) -> Result<Arc<LifetimeScope>> {
    self.registry.get_or_create(self.identifier.identify())
  }

  /// The scope of a specific tenant, created on first use.
  pub fn tenant_scope(&self, key: impl Into<TenantKey<K>>) -> Result<Arc<LifetimeScope>> {
    self.registry.get_or_create(key)
  }

  /// See [`ScopeRegistry::configure`].
  pub fn configure_tenant(
    &self,
    key: impl Into<TenantKey<K>>,
    configuration: impl Fn(&mut ScopeBuilder),
  ) -> Result<()> {
    self.registry.configure(key, configuration)
  }

  /// See [`ScopeRegistry::reconfigure`].
  pub fn reconfigure_tenant(
    &self,
    key: impl Into<TenantKey<K>>,
    configuration: impl Fn(&mut ScopeBuilder),
  ) -> Result<bool> {
    self.registry.reconfigure(key, configuration)
  }

  pub fn remove_tenant(&self, key: impl Into<TenantKey<K>>) -> bool {
    self.registry.remove(key)
  }

  pub fn clear_tenants(&self) {
    self.registry.clear()
  }

  /// The tenants that currently have a scope.
  pub fn tenants(&self) -> Vec<TenantKey<K>> {
    self.registry.keys()
  }

  pub fn tenant_is_configured(&self, key: impl Into<TenantKey<K>>) -> bool {
    self.registry.is_configured(key)
  }

  // --- Scope Surface ---

  pub fn begin_lifetime_scope(&self) -> Result<Arc<LifetimeScope>> {
    self.current_tenant_scope()?.begin_lifetime_scope()
  }

  pub fn begin_lifetime_scope_tagged(&self, tag: impl Into<ScopeTag>) -> Result<Arc<LifetimeScope>> {
    self.current_tenant_scope()?.begin_lifetime_scope_tagged(tag)
  }

  pub fn begin_lifetime_scope_with(
    &self,
    configure: impl FnOnce(&mut ScopeBuilder),
  ) -> Result<Arc<LifetimeScope>> {
    self.current_tenant_scope()?.begin_lifetime_scope_with(configure)
  }

  pub fn begin_lifetime_scope_tagged_with(
    &self,
    tag: impl Into<ScopeTag>,
    configure: impl FnOnce(&mut ScopeBuilder),
  ) -> Result<Arc<LifetimeScope>> {
    self
      .current_tenant_scope()?
      .begin_lifetime_scope_tagged_with(tag, configure)
  }

  /// Resolves a service from the current tenant's scope.
  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.current_tenant_scope()?.resolve::<T>()
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self.current_tenant_scope()?.resolve_named::<T>(name)
  }

  pub fn is_registered<T: ?Sized + Any>(&self) -> Result<bool> {
    Ok(self.current_tenant_scope()?.is_registered::<T>())
  }

  pub fn tag(&self) -> Result<ScopeTag> {
    Ok(self.current_tenant_scope()?.tag().clone())
  }

  pub fn disposer(&self) -> Result<Arc<Disposer>> {
    Ok(self.current_tenant_scope()?.disposer().clone())
  }

  pub fn component_registry(&self) -> Result<Arc<ComponentRegistry>> {
    Ok(self.current_tenant_scope()?.component_registry().clone())
  }

  /// Subscribes to child scopes beginning under the *current* tenant scope.
  pub fn on_child_scope_beginning(
    &self,
    handler: impl Fn(&ScopeEvent) + Send + Sync + 'static,
  ) -> Result<SubscriptionId> {
    Ok(self.current_tenant_scope()?.on_child_scope_beginning(handler))
  }

  /// Subscribes to the *current* tenant scope ending.
  pub fn on_scope_ending(
    &self,
    handler: impl Fn(&ScopeEvent) + Send + Sync + 'static,
  ) -> Result<SubscriptionId> {
    Ok(self.current_tenant_scope()?.on_scope_ending(handler))
  }

  /// Removes a subscription from the *current* tenant scope.
  pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
    Ok(self.current_tenant_scope()?.unsubscribe(id))
  }

  // --- Disposal ---

  pub fn is_disposed(&self) -> bool {
    self.registry.is_disposed()
  }

  /// Disposes every tenant scope and then the application scope.
  pub fn dispose(&self) {
    self.registry.dispose()
  }

  pub async fn dispose_async(&self) {
    self.registry.dispose_async().await
  }
}
