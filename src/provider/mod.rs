//! Service provider module for dependency injection.
//!
//! This module contains the ServiceProvider type, the scope tree hanging off
//! it, and the context handed to constructors and factories.

use std::fmt;
use std::sync::Arc;

use crate::config::ContainerOptions;
use crate::generic::GenericRequest;
use crate::observer::Observers;
use crate::registration::{AnyArc, Catalog};
use crate::traits::{AsyncDisposeHook, DisposeHook, Resolver, ResolverCore};
use crate::{DiResult, Key};

pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub use scope::{Scope, ScopeId};
use scope::ScopeState;

/// The built container and its root scope.
///
/// Resolving directly from the provider resolves against the root scope:
/// singletons are shared everywhere, while scoped and transient instances
/// resolved here are owned by the root and live until the container is torn
/// down. Application code normally resolves through a [`Scope`].
///
/// `ServiceProvider` is cheap to clone and safe to share across threads.
///
/// # Teardown
///
/// [`dispose`](ServiceProvider::dispose) (or dropping the last handle)
/// disposes every live scope, then the root's instances, singletons included.
/// A singleton that holds the provider or a scope keeps the container alive,
/// so such containers must be disposed explicitly.
///
/// # Examples
///
/// ```
/// use arbor_di::{Injectable, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// impl Injectable for Database {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Database { url: "postgres://localhost".into() } }
/// }
///
/// struct UserService { db: Arc<Database> }
/// impl Injectable for UserService {
///     type Deps = (Arc<Database>,);
///     fn construct((db,): Self::Deps) -> Self { UserService { db } }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton_service::<Database>();
/// collection.add_transient_service::<UserService>();
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) catalog: Catalog,
    pub(crate) root: Arc<ScopeState>,
    pub(crate) options: ContainerOptions,
    pub(crate) observers: Observers,
}

impl ServiceProvider {
    pub(crate) fn new(catalog: Catalog, options: ContainerOptions, observers: Observers) -> Self {
        tracing::debug!(
            services = catalog.registrations().count(),
            templates = catalog.templates().count(),
            "service provider built"
        );
        ServiceProvider {
            inner: Arc::new(ProviderInner {
                catalog,
                root: ScopeState::root(),
                options,
                observers,
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Handle to the root scope.
    pub fn root_scope(&self) -> Scope {
        Scope::new(self.clone(), self.inner.root.clone())
    }

    /// Creates a child of the root scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use arbor_di::{Injectable, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct RequestId;
    /// impl Injectable for RequestId {
    ///     type Deps = ();
    ///     fn construct(_: ()) -> Self { RequestId }
    /// }
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_scoped_service::<RequestId>();
    /// let provider = collection.build();
    ///
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let req1a = scope1.get_required::<RequestId>();
    /// let req1b = scope1.get_required::<RequestId>();
    /// let req2 = scope2.get_required::<RequestId>();
    ///
    /// assert!(Arc::ptr_eq(&req1a, &req1b));
    /// assert!(!Arc::ptr_eq(&req1a, &req2));
    /// ```
    pub fn create_scope(&self) -> Scope {
        self.root_scope().create_scope()
    }

    /// Tears the container down: every live scope, then the root's instances,
    /// including singletons.
    ///
    /// Returns [`DiError::ScopeDisposed`](crate::DiError::ScopeDisposed) if the
    /// container was already disposed.
    pub fn dispose(&self) -> DiResult<()> {
        self.root_scope().dispose()
    }

    /// Asynchronous [`dispose`](ServiceProvider::dispose).
    pub async fn dispose_async(&self) -> DiResult<()> {
        self.root_scope().dispose_async().await
    }

    pub fn is_disposed(&self) -> bool {
        self.root_scope().is_disposed()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Number of open generics closed so far.
    pub fn closed_generic_count(&self) -> usize {
        self.inner.catalog.closed_count()
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.inner.catalog.registrations().count())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.root_scope().resolve_any(key)
    }

    fn resolve_generic(&self, request: &GenericRequest) -> DiResult<AnyArc> {
        self.root_scope().resolve_generic(request)
    }

    fn track_disposer(
        &self,
        service: &'static str,
        sync: Option<DisposeHook>,
        asynchronous: Option<AsyncDisposeHook>,
    ) {
        self.root_scope().track_disposer(service, sync, asynchronous);
    }
}

impl Resolver for ServiceProvider {}
