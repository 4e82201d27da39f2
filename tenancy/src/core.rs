//! Injection keys and the circular dependency guard.

use crate::error::{Error, Result};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

thread_local! {
  // The activations currently in progress on this thread, as (scope id, key).
  // An entry that is already present means activation re-entered itself.
  static RESOLVING_STACK: RefCell<HashSet<(u64, InjectionKey)>> = RefCell::new(HashSet::new());
}

/// An RAII guard that detects circular dependencies.
///
/// Creating the guard records that `key` is being activated in the scope
/// identified by `scope_id` and fails if that activation is already in
/// progress on this thread. The same key may be activated in a different
/// scope, so an override can wrap the registration it shadows. Dropping
/// the guard removes the record again.
pub(crate) struct ResolutionGuard {
  entry: (u64, InjectionKey),
}

impl ResolutionGuard {
  pub(crate) fn enter(scope_id: u64, key: &InjectionKey) -> Result<Self> {
    let entry = (scope_id, key.clone());
    RESOLVING_STACK.with(|stack| {
      if stack.borrow_mut().insert(entry.clone()) {
        Ok(Self { entry })
      } else {
        Err(Error::CircularDependency(key.to_string()))
      }
    })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_STACK.with(|stack| {
      stack.borrow_mut().remove(&self.entry);
    });
  }
}

/// Identifies a registration: the service type plus an optional name.
#[derive(Clone)]
pub struct InjectionKey {
  type_id: TypeId,
  type_name: &'static str,
  name: Option<Arc<str>>,
}

impl InjectionKey {
  pub(crate) fn of<T: ?Sized + Any>(name: Option<&str>) -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: std::any::type_name::<T>(),
      name: name.map(Arc::from),
    }
  }

  /// The name of the service type.
  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  /// The registration name, if the service was registered under one.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }
}

// `type_name` is diagnostic only and takes no part in equality.
impl PartialEq for InjectionKey {
  fn eq(&self, other: &Self) -> bool {
    self.type_id == other.type_id && self.name == other.name
  }
}

impl Eq for InjectionKey {}

impl std::hash::Hash for InjectionKey {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.type_id.hash(state);
    self.name.hash(state);
  }
}

impl fmt::Display for InjectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "{} (named '{}')", self.type_name, name),
      None => write!(f, "{}", self.type_name),
    }
  }
}

impl fmt::Debug for InjectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "Key({}, Name({}))", self.type_name, name),
      None => write!(f, "Key({})", self.type_name),
    }
  }
}
