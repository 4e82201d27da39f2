//! Tracking and releasing resources owned by a lifetime scope.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A resource that must be released when the scope owning it ends.
///
/// Implementations should tolerate being called once per owning scope;
/// the [`Disposer`] never calls `dispose` twice on the same tracked item.
pub trait Disposable: Send + Sync {
  fn dispose(&self);
}

/// A resource with an asynchronous release path.
///
/// The synchronous [`Disposable::dispose`] is still required: it is used
/// when the owning scope is disposed synchronously.
pub trait AsyncDisposable: Disposable {
  fn dispose_async(&self) -> BoxFuture<'_, ()>;
}

enum Tracked {
  Sync(Arc<dyn Disposable>),
  Async(Arc<dyn AsyncDisposable>),
}

/// Holds the disposable instances created by a lifetime scope and releases
/// them, most recent first, when the scope ends.
#[derive(Default)]
pub struct Disposer {
  items: Mutex<Vec<Tracked>>,
  disposed: AtomicBool,
}

impl Disposer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Tracks `item` for disposal.
  ///
  /// If the disposer has already run, the item is disposed immediately so
  /// that nothing created late escapes cleanup.
  pub fn add_disposable(&self, item: Arc<dyn Disposable>) {
    if !self.push(Tracked::Sync(item.clone())) {
      item.dispose();
    }
  }

  /// Tracks `item` for asynchronous disposal.
  pub fn add_async_disposable(&self, item: Arc<dyn AsyncDisposable>) {
    if !self.push(Tracked::Async(item.clone())) {
      item.dispose();
    }
  }

  /// The number of items currently awaiting disposal.
  pub fn len(&self) -> usize {
    self.items.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  fn push(&self, item: Tracked) -> bool {
    let mut items = self.items.lock();
    // Checked under the lock so it cannot interleave with `take_all`.
    if self.disposed.load(Ordering::Acquire) {
      return false;
    }
    items.push(item);
    true
  }

  fn take_all(&self) -> Option<Vec<Tracked>> {
    let mut items = self.items.lock();
    if self.disposed.swap(true, Ordering::AcqRel) {
      return None;
    }
    Some(std::mem::take(&mut *items))
  }

  /// Disposes every tracked item in reverse order of registration.
  /// Subsequent calls do nothing.
  pub fn dispose(&self) {
    let Some(items) = self.take_all() else {
      return;
    };
    for item in items.into_iter().rev() {
      match item {
        Tracked::Sync(item) => item.dispose(),
        Tracked::Async(item) => item.dispose(),
      }
    }
  }

  /// Like [`Disposer::dispose`], awaiting items that have an asynchronous
  /// release path.
  pub async fn dispose_async(&self) {
    let Some(items) = self.take_all() else {
      return;
    };
    for item in items.into_iter().rev() {
      match item {
        Tracked::Sync(item) => item.dispose(),
        Tracked::Async(item) => item.dispose_async().await,
      }
    }
  }
}
