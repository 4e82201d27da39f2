//! Composing scope configuration callbacks.

use std::sync::Arc;

/// A shareable configuration callback for a scope builder of type `B`.
pub type Configuration<B> = Arc<dyn Fn(&mut B) + Send + Sync>;

/// Collects configuration callbacks and combines them into a single
/// [`Configuration`] that runs them in the order they were added.
///
/// Useful when the registrations for a tenant are contributed by several
/// independent parts of an application.
///
/// ```
/// use fibre_tenancy::{ConfigurationBuilder, ScopeBuilder};
///
/// let mut config = ConfigurationBuilder::<ScopeBuilder>::new();
/// config
///   .add(|builder| builder.add_instance(1u32))
///   .add(|builder| builder.add_instance_with_name("region", "eu-west".to_string()));
/// let configuration = config.build();
///
/// let mut builder = ScopeBuilder::new();
/// configuration(&mut builder);
/// assert_eq!(builder.len(), 2);
/// ```
pub struct ConfigurationBuilder<B: 'static> {
  actions: Vec<Configuration<B>>,
}

impl<B: 'static> Default for ConfigurationBuilder<B> {
  fn default() -> Self {
    Self {
      actions: Vec::new(),
    }
  }
}

impl<B: 'static> ConfigurationBuilder<B> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a callback.
  pub fn add(&mut self, action: impl Fn(&mut B) + Send + Sync + 'static) -> &mut Self {
    self.actions.push(Arc::new(action));
    self
  }

  /// Appends an already-built configuration, e.g. one shared between tenants.
  pub fn add_configuration(&mut self, configuration: Configuration<B>) -> &mut Self {
    self.actions.push(configuration);
    self
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// Combines the collected callbacks. An empty builder yields a no-op.
  pub fn build(&self) -> Configuration<B> {
    match self.actions.as_slice() {
      [] => Arc::new(|_: &mut B| {}),
      [single] => single.clone(),
      actions => {
        let actions = actions.to_vec();
        Arc::new(move |builder: &mut B| {
          for action in &actions {
            action(builder);
          }
        })
      }
    }
  }
}
