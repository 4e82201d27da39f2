//! The per-tenant scope registry.
//!
//! [`ScopeRegistry`] keeps exactly one long-lived scope per tenant key, built
//! from a shared base scope. Scopes are created lazily on first use or
//! explicitly through `configure`, replaced atomically by `reconfigure`, and
//! disposed by `remove`, `clear` or disposal of the registry itself.
//!
//! # Concurrency
//!
//! The mapping lives in a lock-striped [`DashMap`]. Scopes are always built
//! outside the map's locks, so configuration code may call back into the
//! registry. Publication then uses the map's atomic primitives:
//! insert-if-absent for `configure` and `get_or_create` (a losing racer
//! disposes the scope it built speculatively), and insert-returning-previous
//! for `reconfigure` (the previous scope is disposed after the swap).
//!
//! Disposal of the registry raises its flag *before* sweeping the map. Every
//! publishing operation re-reads the flag after publishing, so a scope
//! created concurrently with disposal is either swept or withdrawn and
//! disposed by its creator. No scope escapes registry ownership undisposed.
//!
//! Operations that create or dispose tenant scopes run under a shared
//! `in_flight` lock. After raising its flag, disposal takes that lock
//! exclusively once, which waits out every operation already past its
//! liveness check. Only then are the remaining tenant scopes swept and the
//! base scope disposed, so the base is always the last scope to go.

use crate::builder::ScopeBuilder;
use crate::error::{Error, Result};
use crate::key::{TenantId, TenantKey};
use crate::scope::{LifetimeScope, ScopeTag};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// The tag given to every tenant scope built by [`TenantScopeFactory`].
pub const TENANT_SCOPE_TAG: &str = "tenant";

const REGISTRY: &str = "tenant scope registry";

/// A disposable scope managed by a [`ScopeRegistry`].
///
/// Disposal must be idempotent: the registry guarantees it disposes each
/// scope it owns once, but a caller may also dispose a scope it holds.
pub trait Scope: Send + Sync + 'static {
  fn dispose(&self);
  fn dispose_async(&self) -> BoxFuture<'_, ()>;
  fn is_disposed(&self) -> bool;
}

/// Builds child scopes from a base scope.
pub trait ScopeFactory: Send + Sync + 'static {
  type Scope: Scope;
  /// What a configuration callback receives to customize the new scope.
  type Builder;

  /// Builds a child of `base`. `configure` is `None` for a default scope.
  /// Errors are passed through to the registry's caller unchanged.
  fn build(
    &self,
    base: &Arc<Self::Scope>,
    configure: Option<&dyn Fn(&mut Self::Builder)>,
  ) -> Result<Arc<Self::Scope>>;
}

impl Scope for LifetimeScope {
  fn dispose(&self) {
    LifetimeScope::dispose(self)
  }

  fn dispose_async(&self) -> BoxFuture<'_, ()> {
    LifetimeScope::dispose_async(self).boxed()
  }

  fn is_disposed(&self) -> bool {
    LifetimeScope::is_disposed(self)
  }
}

/// Builds tenant scopes as tagged child lifetime scopes of the application scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct TenantScopeFactory;

impl ScopeFactory for TenantScopeFactory {
  type Scope = LifetimeScope;
  type Builder = ScopeBuilder;

  fn build(
    &self,
    base: &Arc<LifetimeScope>,
    configure: Option<&dyn Fn(&mut ScopeBuilder)>,
  ) -> Result<Arc<LifetimeScope>> {
    base.begin_lifetime_scope_tagged_with(ScopeTag::named(TENANT_SCOPE_TAG), |builder| {
      if let Some(configure) = configure {
        configure(builder);
      }
    })
  }
}

/// Maps tenant keys to their scopes.
///
/// Keys may be passed as `Some(id)` / `None` (normalized to the default
/// tenant) or as a [`TenantKey`] directly.
///
/// A scope handed out by the registry stays usable until it is removed,
/// reconfigured away or the registry is disposed. Reconfiguring does not
/// interrupt work already running against the previous scope; such work
/// simply observes a scope that is disposed once the swap completes.
///
/// `dispose` must not be called from inside a configuration callback of the
/// same registry: it waits for that very callback to finish.
pub struct ScopeRegistry<K: TenantId, F: ScopeFactory> {
  base: Arc<F::Scope>,
  factory: F,
  scopes: DashMap<TenantKey<K>, Arc<F::Scope>>,
  disposed: AtomicBool,
  in_flight: RwLock<()>,
}

impl<K: TenantId, F: ScopeFactory> ScopeRegistry<K, F> {
  /// Creates an empty registry. The registry takes ownership of `base` and
  /// disposes it last, when the registry itself is disposed.
  pub fn new(base: Arc<F::Scope>, factory: F) -> Self {
    Self {
      base,
      factory,
      scopes: DashMap::new(),
      disposed: AtomicBool::new(false),
      in_flight: RwLock::new(()),
    }
  }

  /// The base scope every tenant scope is built from.
  pub fn base_scope(&self) -> &Arc<F::Scope> {
    &self.base
  }

  pub fn factory(&self) -> &F {
    &self.factory
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::SeqCst)
  }

  fn ensure_live(&self) -> Result<()> {
    if self.is_disposed() {
      Err(Error::Disposed(REGISTRY))
    } else {
      Ok(())
    }
  }

  // Called after `scope` was published under `key`, with `in_flight` held.
  // If the registry began disposing meanwhile, withdraw and dispose the
  // scope here so the caller sees `Disposed`. The sweep is still waiting
  // on `in_flight`, so the base scope goes last either way.
  fn confirm_published(&self, key: &TenantKey<K>, scope: &Arc<F::Scope>) -> Result<()> {
    if !self.is_disposed() {
      return Ok(());
    }
    self
      .scopes
      .remove_if(key, |_, current| Arc::ptr_eq(current, scope));
    scope.dispose();
    Err(Error::Disposed(REGISTRY))
  }

  /// Installs a customized scope for a tenant that has none yet.
  ///
  /// Fails with [`Error::AlreadyConfigured`] if the tenant already has a
  /// scope, including one created implicitly by [`ScopeRegistry::get_or_create`].
  /// When several callers race to configure the same tenant exactly one
  /// succeeds.
  pub fn configure(
    &self,
    key: impl Into<TenantKey<K>>,
    configuration: impl Fn(&mut F::Builder),
  ) -> Result<()> {
    let key = key.into();
    // Recursive, since configuration callbacks may re-enter the registry.
    let _in_flight = self.in_flight.read_recursive();
    self.ensure_live()?;
    if self.scopes.contains_key(&key) {
      return Err(Error::AlreadyConfigured(key.to_string()));
    }

    let configuration: &dyn Fn(&mut F::Builder) = &configuration;
    let scope = self.factory.build(&self.base, Some(configuration))?;
    let inserted = match self.scopes.entry(key.clone()) {
      Entry::Occupied(_) => false,
      Entry::Vacant(slot) => {
        slot.insert(scope.clone());
        true
      }
    };
    if !inserted {
      trace!(tenant = %key, "discarding scope built by a losing configure");
      scope.dispose();
      return Err(Error::AlreadyConfigured(key.to_string()));
    }

    self.confirm_published(&key, &scope)?;
    debug!(tenant = %key, "tenant scope configured");
    Ok(())
  }

  /// Replaces a tenant's scope with a freshly configured one.
  ///
  /// Returns `true` if a previous scope existed; it is disposed once the new
  /// scope is visible and before this call returns. A tenant without a
  /// scope simply gets one.
  pub fn reconfigure(
    &self,
    key: impl Into<TenantKey<K>>,
    configuration: impl Fn(&mut F::Builder),
  ) -> Result<bool> {
    let key = key.into();
    let _in_flight = self.in_flight.read_recursive();
    self.ensure_live()?;

    let configuration: &dyn Fn(&mut F::Builder) = &configuration;
    let scope = self.factory.build(&self.base, Some(configuration))?;
    let previous = self.scopes.insert(key.clone(), scope.clone());
    let published = self.confirm_published(&key, &scope);

    let replaced = match previous {
      Some(previous) => {
        previous.dispose();
        true
      }
      None => false,
    };
    published?;
    debug!(tenant = %key, replaced, "tenant scope reconfigured");
    Ok(replaced)
  }

  /// The tenant's scope, creating a default one on first use.
  ///
  /// Concurrent callers for the same unconfigured tenant all receive the
  /// same scope; any extra scope built while racing is disposed and never
  /// returned.
  pub fn get_or_create(&self, key: impl Into<TenantKey<K>>) -> Result<Arc<F::Scope>> {
    let key = key.into();
    let _in_flight = self.in_flight.read_recursive();
    self.ensure_live()?;
    if let Some(existing) = self.scopes.get(&key) {
      return Ok(existing.value().clone());
    }

    let candidate = self.factory.build(&self.base, None)?;
    let (scope, won) = match self.scopes.entry(key.clone()) {
      Entry::Occupied(current) => (current.get().clone(), false),
      Entry::Vacant(slot) => {
        slot.insert(candidate.clone());
        (candidate.clone(), true)
      }
    };
    if !won {
      trace!(tenant = %key, "discarding scope built by a losing get_or_create");
      candidate.dispose();
      // The winner withdraws its scope if disposal began after it published.
      self.ensure_live()?;
      return Ok(scope);
    }

    self.confirm_published(&key, &scope)?;
    debug!(tenant = %key, "default tenant scope created");
    Ok(scope)
  }

  /// Whether the tenant currently has a scope.
  pub fn is_configured(&self, key: impl Into<TenantKey<K>>) -> bool {
    self.scopes.contains_key(&key.into())
  }

  /// Disposes and forgets the tenant's scope. Returns `false` if it had none
  /// or the registry has been disposed.
  pub fn remove(&self, key: impl Into<TenantKey<K>>) -> bool {
    let key = key.into();
    let _in_flight = self.in_flight.read_recursive();
    // Once disposal has begun its sweep owns every remaining scope.
    if self.is_disposed() {
      return false;
    }
    match self.scopes.remove(&key) {
      Some((_, scope)) => {
        scope.dispose();
        debug!(tenant = %key, "tenant scope removed");
        true
      }
      None => false,
    }
  }

  /// Disposes and forgets every tenant scope present when the call starts.
  pub fn clear(&self) {
    let _in_flight = self.in_flight.read_recursive();
    if self.is_disposed() {
      return;
    }
    let drained = self.drain();
    for scope in &drained {
      scope.dispose();
    }
    debug!(cleared = drained.len(), "tenant scopes cleared");
  }

  /// A snapshot of the tenants that currently have a scope.
  pub fn keys(&self) -> Vec<TenantKey<K>> {
    self
      .scopes
      .iter()
      .map(|entry| entry.key().clone())
      .collect()
  }

  pub fn len(&self) -> usize {
    self.scopes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scopes.is_empty()
  }

  fn drain(&self) -> Vec<Arc<F::Scope>> {
    self
      .keys()
      .into_iter()
      .filter_map(|key| self.scopes.remove(&key).map(|(_, scope)| scope))
      .collect()
  }

  // Returns `false` if disposal already happened. Otherwise returns once
  // every operation that got past its liveness check has finished.
  fn begin_dispose(&self) -> bool {
    if self.disposed.swap(true, Ordering::SeqCst) {
      return false;
    }
    drop(self.in_flight.write());
    true
  }

  /// Disposes every tenant scope and then the base scope. Later calls do
  /// nothing; later `configure`, `reconfigure` and `get_or_create` calls
  /// fail with [`Error::Disposed`].
  pub fn dispose(&self) {
    if !self.begin_dispose() {
      return;
    }
    let drained = self.drain();
    for scope in &drained {
      scope.dispose();
    }
    self.base.dispose();
    debug!(tenants = drained.len(), "tenant scope registry disposed");
  }

  /// Like [`ScopeRegistry::dispose`], awaiting each scope's asynchronous disposal.
  pub async fn dispose_async(&self) {
    if !self.begin_dispose() {
      return;
    }
    let drained = self.drain();
    for scope in &drained {
      scope.dispose_async().await;
    }
    self.base.dispose_async().await;
    debug!(tenants = drained.len(), "tenant scope registry disposed");
  }
}

impl<K: TenantId, F: ScopeFactory> Drop for ScopeRegistry<K, F> {
  fn drop(&mut self) {
    self.dispose();
  }
}
