//! Strategies that work out which tenant the current operation belongs to.

use crate::key::{TenantId, TenantKey};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Identifies the tenant for the current operation from ambient context.
///
/// Returning `None` is not an error: the caller falls back to the
/// default tenant.
pub trait KeyIdentifier<K>: Send + Sync {
  fn try_identify(&self) -> Option<K>;

  /// The identified tenant, normalized so that a failed identification
  /// yields [`TenantKey::Default`].
  fn identify(&self) -> TenantKey<K> {
    self.try_identify().into()
  }
}

impl<K, F> KeyIdentifier<K> for F
where
  F: Fn() -> Option<K> + Send + Sync,
{
  fn try_identify(&self) -> Option<K> {
    self()
  }
}

/// Always identifies the same tenant.
#[derive(Debug, Clone)]
pub struct StaticIdentifier<K> {
  id: K,
}

impl<K> StaticIdentifier<K> {
  pub fn new(id: K) -> Self {
    Self { id }
  }
}

impl<K: TenantId> KeyIdentifier<K> for StaticIdentifier<K> {
  fn try_identify(&self) -> Option<K> {
    Some(self.id.clone())
  }
}

thread_local! {
  // Per key type, the stack of tenants entered on this thread.
  static AMBIENT_TENANTS: RefCell<HashMap<TypeId, Vec<Box<dyn Any>>>> = RefCell::new(HashMap::new());
}

/// Identifies the tenant most recently entered on the calling thread.
///
/// A request handler enters its tenant once with [`AmbientIdentifier::enter`];
/// everything it calls on the same thread then resolves against that
/// tenant until the returned guard is dropped. Entries nest, and dropping
/// an inner guard restores the outer tenant.
///
/// ```
/// use fibre_tenancy::{AmbientIdentifier, KeyIdentifier};
///
/// let identifier = AmbientIdentifier::<&str>::new();
/// assert_eq!(identifier.try_identify(), None);
/// {
///   let _tenant = AmbientIdentifier::enter("acme");
///   assert_eq!(identifier.try_identify(), Some("acme"));
/// }
/// assert_eq!(identifier.try_identify(), None);
/// ```
#[derive(Debug)]
pub struct AmbientIdentifier<K> {
  _key: PhantomData<fn() -> K>,
}

impl<K> Default for AmbientIdentifier<K> {
  fn default() -> Self {
    Self { _key: PhantomData }
  }
}

impl<K: TenantId> AmbientIdentifier<K> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes `id` the ambient tenant for this thread until the guard drops.
  pub fn enter(id: K) -> AmbientGuard<K> {
    AMBIENT_TENANTS.with(|tenants| {
      tenants
        .borrow_mut()
        .entry(TypeId::of::<K>())
        .or_default()
        .push(Box::new(id));
    });
    AmbientGuard {
      _key: PhantomData,
      _not_send: PhantomData,
    }
  }

  /// The ambient tenant of the calling thread, if any.
  pub fn current() -> Option<K> {
    AMBIENT_TENANTS.with(|tenants| {
      tenants
        .borrow()
        .get(&TypeId::of::<K>())
        .and_then(|stack| stack.last())
        .and_then(|id| id.downcast_ref::<K>())
        .cloned()
    })
  }
}

impl<K: TenantId> KeyIdentifier<K> for AmbientIdentifier<K> {
  fn try_identify(&self) -> Option<K> {
    Self::current()
  }
}

/// Restores the previous ambient tenant when dropped.
///
/// The guard is bound to the thread that created it.
#[must_use = "the ambient tenant is cleared as soon as the guard is dropped"]
pub struct AmbientGuard<K: TenantId> {
  _key: PhantomData<fn() -> K>,
  _not_send: PhantomData<*const ()>,
}

impl<K: TenantId> Drop for AmbientGuard<K> {
  fn drop(&mut self) {
    AMBIENT_TENANTS.with(|tenants| {
      let mut tenants = tenants.borrow_mut();
      if let Some(stack) = tenants.get_mut(&TypeId::of::<K>()) {
        stack.pop();
        if stack.is_empty() {
          tenants.remove(&TypeId::of::<K>());
        }
      }
    });
  }
}
