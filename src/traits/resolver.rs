//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::generic::{GenericRequest, GenericService};
use crate::internal::BoxFuture;
use crate::registration::AnyArc;
use crate::traits::{AsyncDispose, AsyncDisposeHook, Dispose, DisposeHook};
use crate::{DiError, DiResult, Key};

/// Core resolver trait for object-safe service resolution.
///
/// This trait provides the fundamental service resolution capabilities that are
/// object-safe (can be used as trait objects). Cycle detection, lifetime policy
/// and disposal tracking all happen behind these methods.
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// ergonomic generic methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves the registration for `key`.
    ///
    /// The returned value is the type-erased `Arc<T>` of the service.
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn std::any::Any + Send + Sync>>;

    /// Resolves a closed generic, closing its open template on first use.
    fn resolve_generic(
        &self,
        request: &GenericRequest,
    ) -> DiResult<Arc<dyn std::any::Any + Send + Sync>>;

    /// Tracks cleanup hooks with the scope this resolver resolves in.
    ///
    /// Used by factories to hand over instances the container did not construct.
    fn track_disposer(
        &self,
        service: &'static str,
        sync: Option<DisposeHook>,
        asynchronous: Option<AsyncDisposeHook>,
    );
}

fn downcast<T: ?Sized + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// `ServiceProvider`, `Scope` and the `ResolverContext` handed to factories all
/// implement this trait. The provider resolves against the root scope.
///
/// # Examples
///
/// ```
/// use arbor_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {}", msg)
///     }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize);
/// collection.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let provider = collection.build();
///
/// let number = provider.get_required::<usize>();
/// assert_eq!(*number, 42);
///
/// let logger = provider.get_required::<dyn Logger>();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves service `T`, a concrete type or a trait object.
    ///
    /// # Examples
    ///
    /// ```
    /// use arbor_di::{DiError, ServiceCollection, Resolver};
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton("configuration".to_string());
    ///
    /// let provider = collection.build();
    /// assert_eq!(&*provider.get::<String>().unwrap(), "configuration");
    /// assert!(matches!(provider.get::<u64>(), Err(DiError::Unregistered(_))));
    /// ```
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&Key::of::<T>())?;
        downcast::<T>(any)
    }

    /// Resolves service `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved (not registered, circular
    /// dependency, disposed scope, etc.).
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves service `T`, or `None` when `T` itself is not registered.
    ///
    /// Every other failure, including an unregistered dependency of `T`,
    /// is still returned as an error.
    fn get_optional<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let key = Key::of::<T>();
        match self.resolve_any(&key) {
            Ok(any) => downcast::<T>(any).map(Some),
            Err(DiError::Unregistered(name)) if name == key.display_name() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Resolves a closed generic service such as `Repository<User>`.
    ///
    /// An exact registration for the closed type wins; otherwise the open
    /// template registered for `G::Shape` is closed with `G::type_args()`.
    fn get_generic<G: GenericService>(&self) -> DiResult<Arc<G>> {
        let any = self.resolve_generic(&GenericRequest::of::<G>())?;
        downcast::<G>(any)
    }

    /// Resolves a closed generic, or `None` when neither the closed type nor
    /// its template is registered.
    fn get_optional_generic<G: GenericService>(&self) -> DiResult<Option<Arc<G>>> {
        let request = GenericRequest::of::<G>();
        match self.resolve_generic(&request) {
            Ok(any) => downcast::<G>(any).map(Some),
            Err(DiError::Unregistered(name)) if name == request.key().display_name() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Resolves a closed generic, panicking on failure.
    fn get_required_generic<G: GenericService>(&self) -> Arc<G> {
        self.get_generic::<G>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<G>(), e))
    }

    /// Registers a service for synchronous disposal with the resolving scope.
    ///
    /// Meant for factories that build instances the container cannot see into.
    /// Hooks execute in reverse registration order.
    ///
    /// # Examples
    ///
    /// ```
    /// use arbor_di::{Dispose, DisposeError, ServiceCollection, Resolver};
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct Connection {
    ///     open: AtomicBool,
    /// }
    ///
    /// impl Dispose for Connection {
    ///     fn dispose(&self) -> Result<(), DisposeError> {
    ///         self.open.store(false, Ordering::SeqCst);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory(|resolver| {
    ///     let conn = Arc::new(Connection { open: AtomicBool::new(true) });
    ///     resolver.register_disposer(conn.clone());
    ///     Ok(conn)
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// let conn = scope.get_required::<Arc<Connection>>();
    /// scope.dispose().unwrap();
    /// assert!(!conn.open.load(Ordering::SeqCst));
    /// ```
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.track_disposer(
            std::any::type_name::<T>(),
            Some(Box::new(move || service.dispose())),
            None,
        );
    }

    /// Registers a service for asynchronous disposal with the resolving scope.
    ///
    /// The hook only runs from `dispose_async`; a synchronous `dispose` reports it
    /// as a failure.
    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) {
        self.track_disposer(
            std::any::type_name::<T>(),
            None,
            Some(Box::new(move || {
                Box::pin(async move { service.dispose().await }) as BoxFuture<_>
            })),
        );
    }
}
