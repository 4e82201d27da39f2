#![allow(dead_code)]

use fibre_tenancy::{Error, Result, Scope, ScopeFactory, ScopeRegistry};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Configuration label that makes `CountingFactory::build` fail.
pub const FAIL: &str = "fail";
/// Configuration label that makes `CountingFactory::build` take a while,
/// widening race windows.
pub const SLOW: &str = "slow";

// A scope that records how it was configured and how often it was disposed.
pub struct CountingScope {
  pub id: usize,
  pub labels: Vec<&'static str>,
  dispose_calls: AtomicUsize,
  async_dispose_calls: AtomicUsize,
  disposals: Arc<Mutex<Vec<usize>>>,
}

impl CountingScope {
  pub fn dispose_calls(&self) -> usize {
    self.dispose_calls.load(Ordering::SeqCst)
  }

  pub fn async_dispose_calls(&self) -> usize {
    self.async_dispose_calls.load(Ordering::SeqCst)
  }
}

impl Scope for CountingScope {
  fn dispose(&self) {
    if self.dispose_calls.fetch_add(1, Ordering::SeqCst) == 0 {
      self.disposals.lock().push(self.id);
    }
  }

  fn dispose_async(&self) -> BoxFuture<'_, ()> {
    async move {
      self.async_dispose_calls.fetch_add(1, Ordering::SeqCst);
      self.dispose();
    }
    .boxed()
  }

  fn is_disposed(&self) -> bool {
    self.dispose_calls() > 0
  }
}

// Builds `CountingScope`s and remembers every one of them, so tests can
// check that nothing built was leaked.
#[derive(Default)]
pub struct CountingFactory {
  next_id: AtomicUsize,
  built: Mutex<Vec<Arc<CountingScope>>>,
  disposals: Arc<Mutex<Vec<usize>>>,
  paused: Mutex<Option<Arc<Barrier>>>,
}

impl CountingFactory {
  pub fn scope(&self, labels: Vec<&'static str>) -> Arc<CountingScope> {
    Arc::new(CountingScope {
      id: self.next_id.fetch_add(1, Ordering::SeqCst),
      labels,
      dispose_calls: AtomicUsize::new(0),
      async_dispose_calls: AtomicUsize::new(0),
      disposals: self.disposals.clone(),
    })
  }

  /// Every scope built through `build`, base scope excluded.
  pub fn built(&self) -> Vec<Arc<CountingScope>> {
    self.built.lock().clone()
  }

  /// Makes the next `build` wait on the returned barrier twice: once when it
  /// starts and once more before it finishes.
  pub fn pause_next_build(&self) -> Arc<Barrier> {
    let barrier = Arc::new(Barrier::new(2));
    *self.paused.lock() = Some(barrier.clone());
    barrier
  }

  /// Scope ids in the order they were first disposed.
  pub fn disposal_order(&self) -> Vec<usize> {
    self.disposals.lock().clone()
  }
}

impl ScopeFactory for CountingFactory {
  type Scope = CountingScope;
  type Builder = Vec<&'static str>;

  fn build(
    &self,
    _base: &Arc<CountingScope>,
    configure: Option<&dyn Fn(&mut Vec<&'static str>)>,
  ) -> Result<Arc<CountingScope>> {
    let paused = self.paused.lock().take();
    if let Some(barrier) = &paused {
      barrier.wait();
      barrier.wait();
    }
    let mut labels = Vec::new();
    if let Some(configure) = configure {
      configure(&mut labels);
    }
    if labels.contains(&FAIL) {
      return Err(Error::activation::<CountingScope>("configuration rejected"));
    }
    if labels.contains(&SLOW) {
      thread::sleep(Duration::from_millis(20));
    }
    let scope = self.scope(labels);
    self.built.lock().push(scope.clone());
    Ok(scope)
  }
}

pub type TestRegistry = ScopeRegistry<&'static str, CountingFactory>;

pub fn build_test_registry() -> (TestRegistry, Arc<CountingScope>) {
  let factory = CountingFactory::default();
  let base = factory.scope(vec!["base"]);
  (ScopeRegistry::new(base.clone(), factory), base)
}

pub fn label(label: &'static str) -> impl Fn(&mut Vec<&'static str>) {
  move |labels: &mut Vec<&'static str>| labels.push(label)
}
