//! Lifecycle notifications raised by lifetime scopes.

use crate::scope::ScopeTag;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A lifecycle event raised by a [`LifetimeScope`](crate::LifetimeScope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent {
  /// A child scope with the given tag is beginning under the scope the
  /// handler is subscribed to.
  ChildScopeBeginning { tag: ScopeTag },
  /// The scope the handler is subscribed to is being disposed.
  ScopeEnding { tag: ScopeTag },
}

/// Identifies a handler subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type EventHandler = Arc<dyn Fn(&ScopeEvent) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum EventKind {
  ChildScopeBeginning,
  ScopeEnding,
}

impl ScopeEvent {
  fn kind(&self) -> EventKind {
    match self {
      ScopeEvent::ChildScopeBeginning { .. } => EventKind::ChildScopeBeginning,
      ScopeEvent::ScopeEnding { .. } => EventKind::ScopeEnding,
    }
  }
}

/// The handler lists of a single scope.
#[derive(Default)]
pub(crate) struct LifecycleEvents {
  handlers: RwLock<Vec<(SubscriptionId, EventKind, EventHandler)>>,
}

impl LifecycleEvents {
  pub(crate) fn on_child_scope_beginning(&self, handler: EventHandler) -> SubscriptionId {
    self.subscribe(EventKind::ChildScopeBeginning, handler)
  }

  pub(crate) fn on_scope_ending(&self, handler: EventHandler) -> SubscriptionId {
    self.subscribe(EventKind::ScopeEnding, handler)
  }

  fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
    self.handlers.write().push((id, kind, handler));
    id
  }

  pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut handlers = self.handlers.write();
    let before = handlers.len();
    handlers.retain(|(existing, _, _)| *existing != id);
    handlers.len() != before
  }

  /// Invokes matching handlers outside the lock, so handlers may subscribe
  /// or unsubscribe while being notified.
  pub(crate) fn raise(&self, event: &ScopeEvent) {
    let kind = event.kind();
    let matching: Vec<EventHandler> = self
      .handlers
      .read()
      .iter()
      .filter(|(_, k, _)| *k == kind)
      .map(|(_, _, handler)| handler.clone())
      .collect();
    for handler in matching {
      handler(event);
    }
  }

  pub(crate) fn clear(&self) {
    self.handlers.write().clear();
  }
}
