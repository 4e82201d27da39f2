//! The `ScopeBuilder` used to configure new lifetime scopes.

use crate::components::{Activator, Instance, Lifetime, Registration};
use crate::core::InjectionKey;
use crate::disposer::Disposable;
use crate::error::Result;
use crate::scope::LifetimeScope;
use std::any::Any;
use std::sync::Arc;

/// Collects the registrations for a lifetime scope that is about to begin.
///
/// Factories receive the scope they are activated in, so they can resolve
/// their own dependencies with `?`. Registrations made here shadow any
/// registration for the same service in ancestor scopes.
#[derive(Default)]
pub struct ScopeBuilder {
  registrations: Vec<(InjectionKey, Registration)>,
}

fn plain<T: Any + Send + Sync>(
  factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
) -> Activator {
  Box::new(move |scope: &LifetimeScope| Ok(Box::new(Arc::new(factory(scope)?)) as Instance))
}

// The instance is handed to the disposer of the scope it is activated in.
fn tracked<T: Disposable + Any>(
  factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
) -> Activator {
  Box::new(move |scope: &LifetimeScope| {
    let instance = Arc::new(factory(scope)?);
    scope.disposer().add_disposable(instance.clone());
    Ok(Box::new(instance) as Instance)
  })
}

fn shared<I: ?Sized + Any + Send + Sync>(
  factory: impl Fn(&LifetimeScope) -> Result<Arc<I>> + Send + Sync + 'static,
) -> Activator {
  Box::new(move |scope: &LifetimeScope| Ok(Box::new(factory(scope)?) as Instance))
}

impl ScopeBuilder {
  /// Creates a new, empty `ScopeBuilder`.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.registrations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registrations.is_empty()
  }

  pub(crate) fn into_registrations(self) -> Vec<(InjectionKey, Registration)> {
    self.registrations
  }

  // --- PRIVATE HELPERS ---

  fn push<T: ?Sized + Any>(&mut self, name: Option<&str>, registration: Registration) {
    self
      .registrations
      .push((InjectionKey::of::<T>(name), registration));
  }

  fn add_instance_internal<T: Any + Send + Sync>(&mut self, name: Option<&str>, instance: T) {
    let instance: Instance = Box::new(Arc::new(instance));
    self.push::<T>(name, Registration::instance(instance));
  }

  // --- PUBLIC API ---

  // --- Instance Registration ---
  pub fn add_instance<T: Any + Send + Sync>(&mut self, instance: T) {
    self.add_instance_internal(None, instance);
  }
  pub fn add_instance_with_name<T: Any + Send + Sync>(&mut self, name: &str, instance: T) {
    self.add_instance_internal(Some(name), instance);
  }

  // --- Singleton Registration ---
  pub fn add_singleton<T: Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(None, Registration::new(Lifetime::Singleton, plain(factory)));
  }
  pub fn add_singleton_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(Some(name), Registration::new(Lifetime::Singleton, plain(factory)));
  }

  // --- Scoped Registration ---
  pub fn add_scoped<T: Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(None, Registration::new(Lifetime::Scoped, plain(factory)));
  }
  pub fn add_scoped_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(Some(name), Registration::new(Lifetime::Scoped, plain(factory)));
  }

  // --- Transient Registration ---
  pub fn add_transient<T: Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(None, Registration::new(Lifetime::Transient, plain(factory)));
  }
  pub fn add_transient_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(Some(name), Registration::new(Lifetime::Transient, plain(factory)));
  }

  // --- Trait Registration ---
  pub fn add_singleton_trait<I: ?Sized + Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<Arc<I>> + Send + Sync + 'static,
  ) {
    self.push::<I>(None, Registration::new(Lifetime::Singleton, shared(factory)));
  }
  pub fn add_singleton_trait_with_name<I: ?Sized + Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&LifetimeScope) -> Result<Arc<I>> + Send + Sync + 'static,
  ) {
    self.push::<I>(Some(name), Registration::new(Lifetime::Singleton, shared(factory)));
  }
  pub fn add_scoped_trait<I: ?Sized + Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<Arc<I>> + Send + Sync + 'static,
  ) {
    self.push::<I>(None, Registration::new(Lifetime::Scoped, shared(factory)));
  }

  // --- Owned (disposable) Registration ---
  //
  // Instances are disposed together with the scope that activated them:
  // the registering scope for singletons, the resolving scope otherwise.
  pub fn add_singleton_disposable<T: Disposable + Any>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(None, Registration::new(Lifetime::Singleton, tracked(factory)));
  }
  pub fn add_scoped_disposable<T: Disposable + Any>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(None, Registration::new(Lifetime::Scoped, tracked(factory)));
  }
  pub fn add_transient_disposable<T: Disposable + Any>(
    &mut self,
    factory: impl Fn(&LifetimeScope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.push::<T>(None, Registration::new(Lifetime::Transient, tracked(factory)));
  }
}
