//! Scope tree: per-scope instance caches, disposal lists and teardown.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use ahash::RandomState;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{ResolverContext, ServiceProvider};
use crate::error::DisposalFailure;
use crate::generic::GenericRequest;
use crate::internal::{BoxFuture, DisposeBag, Disposer, StackGuard};
use crate::registration::{AnyArc, Catalog, Registration};
use crate::traits::{AsyncDisposeHook, DisposeHook, Resolver, ResolverCore};
use crate::lifetime::{CacheLocation, DisposalOwner};
use crate::{DiError, DiResult, Key, Lifetime};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a scope, unique within the process. The root scope of every
/// provider is [`ScopeId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

type ScopedCell = Arc<OnceCell<AnyArc>>;

/// Shared state of one node in the scope tree.
pub(crate) struct ScopeState {
    id: ScopeId,
    parent: Option<Arc<ScopeState>>,
    cache: Mutex<HashMap<Key, ScopedCell, RandomState>>,
    bag: Mutex<DisposeBag>,
    children: Mutex<Vec<Weak<ScopeState>>>,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn root() -> Arc<Self> {
        Arc::new(Self::new(ScopeId::ROOT, None))
    }

    fn new(id: ScopeId, parent: Option<Arc<ScopeState>>) -> Self {
        ScopeState {
            id,
            parent,
            cache: Mutex::new(HashMap::with_hasher(RandomState::new())),
            bag: Mutex::new(DisposeBag::default()),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Creates a child. A child of a disposed scope is born disposed.
    fn child(self: &Arc<Self>) -> Arc<Self> {
        let child = Arc::new(Self::new(ScopeId::next(), Some(self.clone())));
        let mut children = self.children.lock();
        if self.is_disposed() {
            child.disposed.store(true, Ordering::Release);
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        drop(children);

        tracing::debug!(scope = %child.id, parent = %self.id, "scope created");
        child
    }

    #[inline]
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Marks the scope disposed; `false` if it already was.
    fn begin_disposal(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    fn scoped_cell(&self, key: &Key) -> ScopedCell {
        self.cache.lock().entry(*key).or_default().clone()
    }

    /// Hands a disposer to this scope. A scope that already finished disposal
    /// runs it immediately.
    pub(super) fn track(&self, disposer: Disposer) {
        let rejected = self.bag.lock().push(disposer);
        if let Err(disposer) = rejected {
            let service = disposer.service();
            if let Err(failure) = disposer.run(self.id) {
                tracing::warn!(scope = %self.id, service, error = %failure.message, "late disposal failed");
            }
        }
    }

    /// Live children, most recent first. Clears the child list.
    fn take_children(&self) -> Vec<Arc<ScopeState>> {
        let children = std::mem::take(&mut *self.children.lock());
        children.iter().rev().filter_map(Weak::upgrade).collect()
    }

    fn detach(&self) {
        if let Some(parent) = &self.parent {
            let this = self as *const ScopeState;
            parent
                .children
                .lock()
                .retain(|weak| !std::ptr::eq(weak.as_ptr(), this));
        }
        self.cache.lock().clear();
    }

    /// Disposes children, then this scope's instances in reverse order.
    /// The caller has already marked the scope disposed.
    fn teardown(&self) -> Vec<DisposalFailure> {
        let mut failures = Vec::new();
        for child in self.take_children() {
            if child.begin_disposal() {
                failures.extend(child.teardown());
            }
        }

        let disposers = self.bag.lock().drain();
        for disposer in disposers {
            if let Err(failure) = disposer.run(self.id) {
                failures.push(failure);
            }
        }

        self.detach();
        tracing::debug!(scope = %self.id, failures = failures.len(), "scope disposed");
        failures
    }

    fn teardown_async(self: Arc<Self>) -> BoxFuture<Vec<DisposalFailure>> {
        Box::pin(async move {
            let mut failures = Vec::new();
            for child in self.take_children() {
                if child.begin_disposal() {
                    failures.extend(child.teardown_async().await);
                }
            }

            let disposers = self.bag.lock().drain();
            for disposer in disposers {
                if let Err(failure) = disposer.run_async(self.id).await {
                    failures.push(failure);
                }
            }

            self.detach();
            tracing::debug!(scope = %self.id, failures = failures.len(), "scope disposed");
            failures
        })
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        if self.begin_disposal() {
            for failure in self.teardown() {
                tracing::warn!(
                    scope = %failure.scope,
                    service = failure.service,
                    error = %failure.message,
                    "disposal failed while dropping scope"
                );
            }
        }
    }
}

/// Scoped service container: one node of the scope tree.
///
/// A `Scope` caches scoped services, tracks the disposable scoped and
/// transient instances it resolves, and reaches singletons through the root.
/// Clones are handles to the same scope.
///
/// # Lifetime Behavior
///
/// - **Singleton**: Resolved and cached in the root (shared across all scopes)
/// - **Scoped**: Resolved and cached within this specific scope
/// - **Transient**: Created fresh on every resolution, disposed with this scope
///
/// Disposal is explicit through [`dispose`](Scope::dispose) or
/// [`dispose_async`](Scope::dispose_async), and also happens when the last
/// handle to an undisposed scope is dropped.
///
/// # Examples
///
/// ```
/// use arbor_di::{Injectable, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct DatabaseConnection;
/// impl Injectable for DatabaseConnection {
///     type Deps = ();
///     fn construct(_: ()) -> Self { DatabaseConnection }
/// }
///
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
/// impl Injectable for UserService {
///     type Deps = (Arc<DatabaseConnection>,);
///     fn construct((db,): Self::Deps) -> Self { UserService { db } }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_service::<DatabaseConnection>();
/// collection.add_transient_service::<UserService>();
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// // Transients in the same scope share the scoped connection
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(!Arc::ptr_eq(&user1, &user2));
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) provider: ServiceProvider,
    pub(crate) state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(provider: ServiceProvider, state: Arc<ScopeState>) -> Self {
        Scope { provider, state }
    }

    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    /// Identifier of the parent scope, `None` for the root.
    pub fn parent_id(&self) -> Option<ScopeId> {
        self.state.parent.as_ref().map(|parent| parent.id)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// The container this scope belongs to.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Number of instances currently waiting for this scope's disposal.
    pub fn tracked_count(&self) -> usize {
        self.state.bag.lock().len()
    }

    /// Creates a nested scope.
    ///
    /// The child sees this scope's singletons but has its own scoped
    /// instances. Disposing this scope disposes the child first.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.provider.clone(), self.state.child())
    }

    /// Disposes this scope and every live nested scope.
    ///
    /// Nested scopes go first, most recent first; then this scope's tracked
    /// instances in reverse construction order. Every instance is disposed even
    /// when some fail; the failures come back together as
    /// [`DiError::DisposalFailed`]. Disposing twice returns [`DiError::ScopeDisposed`].
    ///
    /// # Examples
    ///
    /// ```
    /// use arbor_di::{DiError, ServiceCollection};
    ///
    /// let provider = ServiceCollection::new().build();
    /// let scope = provider.create_scope();
    /// let nested = scope.create_scope();
    ///
    /// scope.dispose().unwrap();
    /// assert!(nested.is_disposed());
    /// assert!(matches!(scope.dispose(), Err(DiError::ScopeDisposed(_))));
    /// ```
    pub fn dispose(&self) -> DiResult<()> {
        if !self.state.begin_disposal() {
            return Err(DiError::ScopeDisposed(self.state.id));
        }
        let failures = self.state.teardown();
        self.finish_disposal(failures)
    }

    /// Asynchronous [`dispose`](Scope::dispose): awaits [`AsyncDispose`](crate::AsyncDispose)
    /// hooks and falls back to synchronous hooks for the rest.
    pub async fn dispose_async(&self) -> DiResult<()> {
        if !self.state.begin_disposal() {
            return Err(DiError::ScopeDisposed(self.state.id));
        }
        let failures = self.state.clone().teardown_async().await;
        self.finish_disposal(failures)
    }

    fn finish_disposal(&self, failures: Vec<DisposalFailure>) -> DiResult<()> {
        let observers = &self.provider.inner().observers;
        if observers.has_observers() {
            observers.scope_disposed(self.state.id, failures.len());
        }
        DiError::aggregate(failures)
    }

    /// Full resolution pipeline for one request.
    fn resolve_with(
        &self,
        key: &Key,
        lookup: impl FnOnce(&Catalog) -> DiResult<Arc<Registration>>,
    ) -> DiResult<AnyArc> {
        let observers = &self.provider.inner().observers;
        if !observers.has_observers() {
            return self.resolve_inner(key, lookup).map(|(instance, _)| instance);
        }

        observers.resolving(key, self.state.id);
        let started = Instant::now();
        match self.resolve_inner(key, lookup) {
            Ok((instance, lifetime)) => {
                observers.resolved(key, lifetime, started.elapsed());
                Ok(instance)
            }
            Err(err) => {
                observers.resolution_failed(key, &err);
                Err(err)
            }
        }
    }

    fn resolve_inner(
        &self,
        key: &Key,
        lookup: impl FnOnce(&Catalog) -> DiResult<Arc<Registration>>,
    ) -> DiResult<(AnyArc, Lifetime)> {
        if self.state.is_disposed() {
            return Err(DiError::ScopeDisposed(self.state.id));
        }

        let inner = self.provider.inner();
        // Entered before any cache is touched, so a cycle never re-enters a
        // cell that is still initializing on this thread.
        let _guard = StackGuard::enter(*key, inner.options.max_depth)?;
        let registration = lookup(&inner.catalog)?;
        let lifetime = registration.lifetime;

        let policy = lifetime.policy();
        let owner: &ScopeState = match policy.owner {
            DisposalOwner::Root => &inner.root,
            DisposalOwner::ResolvingScope => &self.state,
        };

        let instance = match policy.cache {
            CacheLocation::Root => registration
                .singleton
                .get_or_try_init(|| {
                    let instance = self.construct(&registration, owner)?;
                    tracing::debug!(service = key.display_name(), requested_in = %self.state.id, "singleton created");
                    Ok::<_, DiError>(instance)
                })?
                .clone(),
            CacheLocation::Scope => {
                if inner.options.validate_scopes && self.state.parent.is_none() {
                    return Err(DiError::WrongLifetime(
                        "scoped service resolved from the root scope",
                    ));
                }
                let cell = self.state.scoped_cell(&registration.key);
                cell.get_or_try_init(|| self.construct(&registration, owner))?
                    .clone()
            }
            CacheLocation::Uncached => self.construct(&registration, owner)?,
        };

        tracing::trace!(service = key.display_name(), %lifetime, owner = %owner.id, "resolved");
        Ok((instance, lifetime))
    }

    /// Builds an instance with dependencies resolved from this scope, then
    /// hands its disposer to `owner`.
    fn construct(&self, registration: &Registration, owner: &ScopeState) -> DiResult<AnyArc> {
        let catalog = &self.provider.inner().catalog;
        let plan = catalog.injection_plan(registration);
        let ctx = ResolverContext::new(self, owner);
        let built = (registration.recipe.ctor)(&ctx, plan)?;
        if let Some(disposer) = built.disposer {
            owner.track(disposer);
        }
        Ok(built.instance)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.state.id)
            .field("parent", &self.parent_id())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolve_with(key, |catalog| catalog.lookup(key))
    }

    fn resolve_generic(&self, request: &GenericRequest) -> DiResult<AnyArc> {
        self.resolve_with(&request.key, |catalog| catalog.lookup_generic(request))
    }

    fn track_disposer(
        &self,
        service: &'static str,
        sync: Option<DisposeHook>,
        asynchronous: Option<AsyncDisposeHook>,
    ) {
        self.state.track(Disposer::from_hooks(service, sync, asynchronous));
    }
}

impl Resolver for Scope {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_ids_are_unique_and_root_displays_as_root() {
        let a = ScopeId::next();
        let b = ScopeId::next();
        assert_ne!(a, b);
        assert!(!a.is_root());
        assert_eq!(ScopeId::ROOT.to_string(), "root");
        assert_eq!(a.to_string(), a.as_u64().to_string());
    }

    #[test]
    fn child_of_disposed_state_is_born_disposed() {
        let root = ScopeState::root();
        assert!(root.begin_disposal());
        assert!(root.teardown().is_empty());

        let child = root.child();
        assert!(child.is_disposed());
        assert!(root.children.lock().is_empty());
    }

    #[test]
    fn dropping_a_child_detaches_it() {
        let root = ScopeState::root();
        let child = root.child();
        let _other = root.child();
        assert_eq!(root.children.lock().len(), 2);

        drop(child);
        assert_eq!(root.children.lock().len(), 1);
    }
}
