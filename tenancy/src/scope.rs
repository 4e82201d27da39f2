//! The hierarchical, disposable `LifetimeScope`.

use crate::builder::ScopeBuilder;
use crate::components::{ComponentRegistry, Instance, Lifetime, Registration};
use crate::core::{InjectionKey, ResolutionGuard};
use crate::disposer::Disposer;
use crate::error::{Error, Result};
use crate::events::{LifecycleEvents, ScopeEvent, SubscriptionId};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Labels a lifetime scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeTag {
  /// The application (root) scope.
  Root,
  /// A scope begun without a tag. Every anonymous scope gets a unique number.
  Anonymous(u64),
  Named(Arc<str>),
}

impl ScopeTag {
  pub fn named(name: impl Into<Arc<str>>) -> Self {
    ScopeTag::Named(name.into())
  }

  fn anonymous() -> Self {
    static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(1);
    ScopeTag::Anonymous(NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed))
  }
}

impl From<&str> for ScopeTag {
  fn from(name: &str) -> Self {
    ScopeTag::named(name)
  }
}

impl fmt::Display for ScopeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScopeTag::Root => write!(f, "root"),
      ScopeTag::Anonymous(id) => write!(f, "anonymous-{}", id),
      ScopeTag::Named(name) => write!(f, "{}", name),
    }
  }
}

/// An isolated unit of configuration and resolution.
///
/// A scope resolves services from its own registrations first and then from
/// its ancestors'. Everything a scope activates and tracks is released when
/// the scope is disposed; children are independent and must be disposed on
/// their own.
///
/// ```
/// use fibre_tenancy::LifetimeScope;
///
/// let app = LifetimeScope::root(|builder| builder.add_instance(String::from("shared")));
/// let request = app.begin_lifetime_scope_with(|builder| builder.add_instance(7u32)).unwrap();
///
/// assert_eq!(*request.resolve::<String>().unwrap(), "shared");
/// assert_eq!(*request.resolve::<u32>().unwrap(), 7);
/// assert!(app.resolve::<u32>().is_err());
/// ```
pub struct LifetimeScope {
  id: u64,
  tag: ScopeTag,
  parent: Option<Arc<LifetimeScope>>,
  registry: Arc<ComponentRegistry>,
  scoped: DashMap<InjectionKey, Arc<OnceCell<Instance>>>,
  disposer: Arc<Disposer>,
  events: LifecycleEvents,
  disposed: AtomicBool,
}

impl LifetimeScope {
  /// Builds the application scope.
  pub fn root(configure: impl FnOnce(&mut ScopeBuilder)) -> Arc<Self> {
    let mut builder = ScopeBuilder::new();
    configure(&mut builder);
    Arc::new(Self::assemble(ScopeTag::Root, None, builder))
  }

  fn assemble(tag: ScopeTag, parent: Option<Arc<LifetimeScope>>, builder: ScopeBuilder) -> Self {
    let registry = ComponentRegistry::new();
    for (key, registration) in builder.into_registrations() {
      registry.register(key, registration);
    }
    static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);
    let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
    debug!(scope_id = id, tag = %tag, registrations = registry.len(), "lifetime scope began");
    Self {
      id,
      tag,
      parent,
      registry: Arc::new(registry),
      scoped: DashMap::new(),
      disposer: Arc::new(Disposer::new()),
      events: LifecycleEvents::default(),
      disposed: AtomicBool::new(false),
    }
  }

  fn ensure_live(&self) -> Result<()> {
    if self.is_disposed() {
      Err(Error::Disposed("lifetime scope"))
    } else {
      Ok(())
    }
  }

  // --- Properties ---

  pub fn tag(&self) -> &ScopeTag {
    &self.tag
  }

  pub fn parent(&self) -> Option<&Arc<LifetimeScope>> {
    self.parent.as_ref()
  }

  /// Tracks the disposable instances activated in this scope.
  pub fn disposer(&self) -> &Arc<Disposer> {
    &self.disposer
  }

  /// The registrations made directly on this scope.
  pub fn component_registry(&self) -> &Arc<ComponentRegistry> {
    &self.registry
  }

  // --- Nested Scopes ---

  pub fn begin_lifetime_scope(self: &Arc<Self>) -> Result<Arc<Self>> {
    self.begin_child(ScopeTag::anonymous(), ScopeBuilder::new())
  }

  pub fn begin_lifetime_scope_tagged(self: &Arc<Self>, tag: impl Into<ScopeTag>) -> Result<Arc<Self>> {
    self.begin_child(tag.into(), ScopeBuilder::new())
  }

  /// Begins a child scope with additional registrations.
  pub fn begin_lifetime_scope_with(
    self: &Arc<Self>,
    configure: impl FnOnce(&mut ScopeBuilder),
  ) -> Result<Arc<Self>> {
    self.begin_lifetime_scope_tagged_with(ScopeTag::anonymous(), configure)
  }

  pub fn begin_lifetime_scope_tagged_with(
    self: &Arc<Self>,
    tag: impl Into<ScopeTag>,
    configure: impl FnOnce(&mut ScopeBuilder),
  ) -> Result<Arc<Self>> {
    let mut builder = ScopeBuilder::new();
    configure(&mut builder);
    self.begin_child(tag.into(), builder)
  }

  fn begin_child(self: &Arc<Self>, tag: ScopeTag, builder: ScopeBuilder) -> Result<Arc<Self>> {
    self.ensure_live()?;
    self
      .events
      .raise(&ScopeEvent::ChildScopeBeginning { tag: tag.clone() });
    Ok(Arc::new(Self::assemble(tag, Some(self.clone()), builder)))
  }

  // --- Resolution ---

  /// Resolves a service from this scope or its ancestors.
  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.resolve_key(InjectionKey::of::<T>(None))
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self.resolve_key(InjectionKey::of::<T>(Some(name)))
  }

  /// Whether `T` can be resolved from this scope or its ancestors.
  pub fn is_registered<T: ?Sized + Any>(&self) -> bool {
    self.lookup(&InjectionKey::of::<T>(None)).is_some()
  }

  pub fn is_registered_with_name<T: ?Sized + Any>(&self, name: &str) -> bool {
    self.lookup(&InjectionKey::of::<T>(Some(name))).is_some()
  }

  // Finds the nearest scope, starting with this one, that registers `key`.
  fn lookup(&self, key: &InjectionKey) -> Option<(&LifetimeScope, Arc<Registration>)> {
    let mut scope = self;
    loop {
      if let Some(registration) = scope.registry.get(key) {
        return Some((scope, registration));
      }
      scope = scope.parent.as_deref()?;
    }
  }

  fn resolve_key<T: ?Sized + Any + Send + Sync>(&self, key: InjectionKey) -> Result<Arc<T>> {
    self.ensure_live()?;
    let (owner, registration) = self
      .lookup(&key)
      .ok_or_else(|| Error::NotRegistered(key.to_string()))?;

    // Singletons activate in their owning scope, everything else in this one.
    let activation_scope = match registration.lifetime() {
      Lifetime::Singleton => owner.id,
      Lifetime::Scoped | Lifetime::Transient => self.id,
    };
    let _guard = ResolutionGuard::enter(activation_scope, &key)?;

    let resolved = match registration.lifetime() {
      Lifetime::Singleton => registration
        .shared_instance(&key, owner)?
        .downcast_ref::<Arc<T>>()
        .cloned(),
      Lifetime::Scoped => {
        let cell = self.scoped.entry(key.clone()).or_default().value().clone();
        cell
          .get_or_try_init(|| registration.activate(&key, self))?
          .downcast_ref::<Arc<T>>()
          .cloned()
      }
      Lifetime::Transient => registration
        .activate(&key, self)?
        .downcast::<Arc<T>>()
        .ok()
        .map(|arc_in_a_box| *arc_in_a_box),
    };
    resolved.ok_or_else(|| Error::TypeMismatch(key.to_string()))
  }

  // --- Lifecycle Events ---

  /// Subscribes to children of this scope beginning.
  pub fn on_child_scope_beginning(
    &self,
    handler: impl Fn(&ScopeEvent) + Send + Sync + 'static,
  ) -> SubscriptionId {
    self.events.on_child_scope_beginning(Arc::new(handler))
  }

  /// Subscribes to this scope being disposed. Handlers run before any
  /// tracked instance is released.
  pub fn on_scope_ending(&self, handler: impl Fn(&ScopeEvent) + Send + Sync + 'static) -> SubscriptionId {
    self.events.on_scope_ending(Arc::new(handler))
  }

  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    self.events.unsubscribe(id)
  }

  // --- Disposal ---

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  // Returns `false` if another caller already began disposal.
  fn begin_dispose(&self) -> bool {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return false;
    }
    debug!(tag = %self.tag, tracked = self.disposer.len(), "disposing lifetime scope");
    self.events.raise(&ScopeEvent::ScopeEnding {
      tag: self.tag.clone(),
    });
    self.events.clear();
    true
  }

  fn release_instances(&self) {
    self.scoped.clear();
    self.registry.clear();
  }

  /// Disposes every tracked instance, most recent first, and drops cached
  /// instances. Only the first call has any effect.
  pub fn dispose(&self) {
    if self.begin_dispose() {
      self.disposer.dispose();
      self.release_instances();
    }
  }

  /// Like [`LifetimeScope::dispose`], awaiting asynchronously disposable instances.
  pub async fn dispose_async(&self) {
    if self.begin_dispose() {
      self.disposer.dispose_async().await;
      self.release_instances();
    }
  }
}

impl fmt::Debug for LifetimeScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LifetimeScope")
      .field("tag", &self.tag)
      .field("registrations", &self.registry.len())
      .field("disposed", &self.is_disposed())
      .finish()
  }
}
