//! Error types for the dependency injection container.

use std::fmt;

use thiserror::Error;

use crate::provider::ScopeId;

/// Error returned by a [`Dispose`](crate::Dispose) implementation.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency injection errors
///
/// Represents the various error conditions that can occur during service
/// resolution, scope management or disposal.
///
/// # Examples
///
/// ```rust
/// use arbor_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::Unregistered(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use arbor_di::DiError;
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(circular.to_string(), "Circular dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No descriptor and no open-generic template for the requested key
    #[error("Service not registered: {0}")]
    Unregistered(&'static str),
    /// Stored instance could not be downcast to the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (path ends with the repeated service)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Resolution or disposal against a scope that was already disposed
    #[error("Scope {0} has been disposed")]
    ScopeDisposed(ScopeId),
    /// One or more tracked instances failed while being disposed
    #[error("Disposal failed for {} instance(s): {}", .0.len(), DisplayFailures(.0))]
    DisposalFailed(Vec<DisposalFailure>),
    /// Invalid lifetime resolution (e.g., scoped from root with scope validation on)
    #[error("Lifetime error: {0}")]
    WrongLifetime(&'static str),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Build-time validation found errors
    #[error("Invalid container configuration:\n{0}")]
    InvalidConfiguration(String),
}

/// A single instance that failed during scope disposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalFailure {
    /// Type name of the disposed service
    pub service: &'static str,
    /// Scope that owned the instance
    pub scope: ScopeId,
    /// Rendered error reported by the instance
    pub message: String,
}

impl fmt::Display for DisposalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (scope {}): {}", self.service, self.scope, self.message)
    }
}

struct DisplayFailures<'a>(&'a [DisposalFailure]);

impl fmt::Display for DisplayFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl DiError {
    /// Returns `true` for [`DiError::Unregistered`].
    pub fn is_unregistered(&self) -> bool {
        matches!(self, DiError::Unregistered(_))
    }

    /// Turns the failures collected during one disposal pass into a result.
    pub(crate) fn aggregate(failures: Vec<DisposalFailure>) -> DiResult<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::DisposalFailed(failures))
        }
    }
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout arbor-di.
pub type DiResult<T> = Result<T, DiError>;
