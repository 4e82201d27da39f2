use thiserror::Error;

/// The error type for `fibre_tenancy` operations.
#[derive(Debug, Error)]
pub enum Error {
  /// `configure` was called for a tenant that already has a scope. Use
  /// `reconfigure` to replace an existing scope.
  #[error("tenant {0} has already been configured")]
  AlreadyConfigured(String),

  /// The registry or lifetime scope has been disposed and can no longer
  /// create or resolve anything.
  #[error("{0} has been disposed")]
  Disposed(&'static str),

  /// No registration exists for the requested component in the scope or
  /// any of its ancestors.
  #[error("no component registered for {0}")]
  NotRegistered(String),

  /// A component depends, directly or indirectly, on itself.
  #[error("circular dependency detected while resolving {0}")]
  CircularDependency(String),

  /// A registration exists but its factory produced a value of the wrong type.
  #[error("component {0} resolved to an unexpected type")]
  TypeMismatch(String),

  /// A factory failed for a reason of its own.
  #[error("failed to activate {component}: {reason}")]
  Activation { component: String, reason: String },
}

impl Error {
  /// Builds an [`Error::Activation`] for component type `T`.
  pub fn activation<T: ?Sized>(reason: impl Into<String>) -> Self {
    Error::Activation {
      component: std::any::type_name::<T>().to_owned(),
      reason: reason.into(),
    }
  }
}

/// A specialized `Result` type for `fibre_tenancy` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
