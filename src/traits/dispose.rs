//! Disposal traits for resource cleanup.

use std::future::Future;
use std::pin::Pin;

use crate::error::DisposeError;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections). A service exposes it to the container through
/// [`Injectable::disposal`](crate::Injectable::disposal); the owning scope then runs it
/// in reverse construction order when the scope is disposed.
///
/// # Examples
///
/// ```
/// use arbor_di::{Dispose, DisposeError, Injectable, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// #[derive(Default)]
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         self.flushed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// impl Injectable for Cache {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Cache::default() }
///     fn disposal(&self) -> Option<&dyn Dispose> { Some(self) }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_service::<Cache>();
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// let cache = scope.get_required::<Cache>();
/// scope.dispose().unwrap();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    ///
    /// An error is collected by the disposing scope; the remaining instances are
    /// still disposed.
    fn dispose(&self) -> Result<(), DisposeError>;
}

/// Trait for asynchronous resource disposal.
///
/// Implement this trait for services that require async teardown (e.g., graceful connection
/// shutdown). Async hooks run only from [`Scope::dispose_async`](crate::Scope::dispose_async)
/// and [`ServiceProvider::dispose_async`](crate::ServiceProvider::dispose_async).
///
/// # Examples
///
/// ```
/// use arbor_di::{AsyncDispose, DisposeError, Resolver, ServiceCollection};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) -> Result<(), DisposeError> {
///         // close self.connection_id ...
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_factory(|resolver| {
///     let client = Arc::new(DatabaseClient { connection_id: "conn_123".to_string() });
///     resolver.register_async_disposer(client.clone());
///     Ok(client.connection_id.clone())
/// });
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> Result<(), DisposeError>;
}

/// Synchronous cleanup hook tracked by a scope.
pub type DisposeHook = Box<dyn FnOnce() -> Result<(), DisposeError> + Send>;

/// Asynchronous cleanup hook tracked by a scope.
pub type AsyncDisposeHook = Box<
    dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), DisposeError>> + Send>> + Send,
>;
