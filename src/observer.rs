//! Diagnostic observers for dependency injection traceability.
//!
//! Observers receive resolution and scope events from the container. They are
//! registered on the [`ServiceCollection`](crate::ServiceCollection) before
//! `build()` and shared by every scope of the resulting provider.

use std::sync::Arc;
use std::time::Duration;

use crate::provider::ScopeId;
use crate::{DiError, Key, Lifetime};

/// Observer hooks for resolution and disposal events.
///
/// All methods have empty defaults so an observer only implements what it
/// cares about. Hooks run synchronously on the resolving thread.
///
/// # Examples
///
/// ```
/// use arbor_di::{DiObserver, Key, Lifetime, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver(AtomicUsize);
///
/// impl DiObserver for CountingObserver {
///     fn resolved(&self, _key: &Key, _lifetime: Lifetime, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let observer = Arc::new(CountingObserver::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(7u8);
/// services.add_observer(observer.clone());
///
/// let provider = services.build();
/// provider.get_required::<u8>();
/// assert_eq!(observer.0.load(Ordering::SeqCst), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// A resolution request entered `scope`.
    fn resolving(&self, _key: &Key, _scope: ScopeId) {}

    /// A resolution request completed, from cache or by construction.
    fn resolved(&self, _key: &Key, _lifetime: Lifetime, _duration: Duration) {}

    /// A resolution request failed.
    fn resolution_failed(&self, _key: &Key, _error: &DiError) {}

    /// A scope finished an explicit disposal pass.
    fn scope_disposed(&self, _scope: ScopeId, _failures: usize) {}
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key, scope: ScopeId) {
        for observer in &self.observers {
            observer.resolving(key, scope);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, lifetime: Lifetime, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, lifetime, duration);
        }
    }

    #[inline]
    pub(crate) fn resolution_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(key, error);
        }
    }

    #[inline]
    pub(crate) fn scope_disposed(&self, scope: ScopeId, failures: usize) {
        for observer in &self.observers {
            observer.scope_disposed(scope, failures);
        }
    }
}

/// Observer that forwards every event to `tracing`.
///
/// Resolution events are emitted at `TRACE`, failures at `WARN`, scope
/// disposal at `DEBUG`. Every event carries a `prefix` field, `"arbor-di"`
/// unless set with [`LoggingObserver::with_prefix`].
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "arbor-di".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, key: &Key, scope: ScopeId) {
        tracing::trace!(prefix = %self.prefix, service = key.display_name(), %scope, "resolving");
    }

    fn resolved(&self, key: &Key, lifetime: Lifetime, duration: Duration) {
        tracing::trace!(
            prefix = %self.prefix,
            service = key.display_name(),
            %lifetime,
            ?duration,
            "resolved"
        );
    }

    fn resolution_failed(&self, key: &Key, error: &DiError) {
        tracing::warn!(prefix = %self.prefix, service = key.display_name(), %error, "resolution failed");
    }

    fn scope_disposed(&self, scope: ScopeId, failures: usize) {
        tracing::debug!(prefix = %self.prefix, %scope, failures, "scope disposed");
    }
}
