//! Component registrations held by a lifetime scope.

use crate::core::InjectionKey;
use crate::error::{Error, Result};
use crate::scope::LifetimeScope;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;

/// A resolved instance, boxed as `Arc<T>` so it can be shared out cheaply.
pub(crate) type Instance = Box<dyn Any + Send + Sync>;

pub(crate) type Activator = Box<dyn Fn(&LifetimeScope) -> Result<Instance> + Send + Sync>;

/// How long an activated instance is shared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifetime {
  /// One instance per registering scope, shared by all of its descendants.
  Singleton,
  /// One instance per resolving scope.
  Scoped,
  /// A new instance for every resolution.
  Transient,
}

pub(crate) struct Registration {
  lifetime: Lifetime,
  activator: Option<Activator>,
  shared: OnceCell<Instance>,
}

impl Registration {
  pub(crate) fn new(lifetime: Lifetime, activator: Activator) -> Self {
    Self {
      lifetime,
      activator: Some(activator),
      shared: OnceCell::new(),
    }
  }

  /// A singleton whose value was supplied up front.
  pub(crate) fn instance(instance: Instance) -> Self {
    Self {
      lifetime: Lifetime::Singleton,
      activator: None,
      shared: OnceCell::with_value(instance),
    }
  }

  pub(crate) fn lifetime(&self) -> Lifetime {
    self.lifetime
  }

  /// Runs the factory against `scope`.
  pub(crate) fn activate(&self, key: &InjectionKey, scope: &LifetimeScope) -> Result<Instance> {
    match &self.activator {
      Some(activator) => activator(scope),
      None => Err(Error::Activation {
        component: key.to_string(),
        reason: "pre-built instance has no factory".to_owned(),
      }),
    }
  }

  /// The singleton instance, activated against its owning scope on first use.
  pub(crate) fn shared_instance(&self, key: &InjectionKey, owner: &LifetimeScope) -> Result<&Instance> {
    self.shared.get_or_try_init(|| self.activate(key, owner))
  }
}

/// The registrations made directly on one lifetime scope.
///
/// Lookups that miss here continue in the parent scope; that chaining is
/// done by [`LifetimeScope`], not by the registry itself.
#[derive(Default)]
pub struct ComponentRegistry {
  registrations: DashMap<InjectionKey, Arc<Registration>>,
}

impl ComponentRegistry {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Later registrations for the same key replace earlier ones.
  pub(crate) fn register(&self, key: InjectionKey, registration: Registration) {
    self.registrations.insert(key, Arc::new(registration));
  }

  // The `Arc` is cloned out so no shard lock is held while activating.
  pub(crate) fn get(&self, key: &InjectionKey) -> Option<Arc<Registration>> {
    self.registrations.get(key).map(|entry| entry.value().clone())
  }

  pub(crate) fn contains(&self, key: &InjectionKey) -> bool {
    self.registrations.contains_key(key)
  }

  pub(crate) fn clear(&self) {
    self.registrations.clear();
  }

  /// Whether `T` is registered directly in this registry (ancestors are not consulted).
  pub fn is_registered<T: ?Sized + Any>(&self, name: Option<&str>) -> bool {
    self.contains(&InjectionKey::of::<T>(name))
  }

  /// The keys registered directly in this registry.
  pub fn keys(&self) -> Vec<InjectionKey> {
    self
      .registrations
      .iter()
      .map(|entry| entry.key().clone())
      .collect()
  }

  pub fn len(&self) -> usize {
    self.registrations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registrations.is_empty()
  }
}
