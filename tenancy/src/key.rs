//! Tenant keys and the default-tenant sentinel.

use std::fmt;
use std::hash::Hash;

/// Bounds required of a tenant identifier.
///
/// Blanket-implemented for every type that satisfies them, so `&'static str`,
/// `String`, integers, UUID newtypes and so on can all be used directly.
pub trait TenantId: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> TenantId for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// The key under which a tenant's scope is registered.
///
/// `Default` stands in whenever no tenant can be identified. It is its own
/// variant, so it never compares equal to any caller-supplied identifier,
/// even one whose own type has an empty or null-like value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantKey<K> {
  Default,
  Id(K),
}

impl<K> TenantKey<K> {
  pub fn is_default(&self) -> bool {
    matches!(self, TenantKey::Default)
  }

  /// The tenant identifier, or `None` for the default tenant.
  pub fn id(&self) -> Option<&K> {
    match self {
      TenantKey::Default => None,
      TenantKey::Id(id) => Some(id),
    }
  }

  pub fn into_id(self) -> Option<K> {
    match self {
      TenantKey::Default => None,
      TenantKey::Id(id) => Some(id),
    }
  }
}

/// `None` normalizes to [`TenantKey::Default`].
impl<K> From<Option<K>> for TenantKey<K> {
  fn from(id: Option<K>) -> Self {
    match id {
      Some(id) => TenantKey::Id(id),
      None => TenantKey::Default,
    }
  }
}

impl<K: fmt::Debug> fmt::Display for TenantKey<K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TenantKey::Default => write!(f, "<default>"),
      TenantKey::Id(id) => write!(f, "{:?}", id),
    }
  }
}
