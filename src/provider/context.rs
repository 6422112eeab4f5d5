//! What a constructor or factory sees while its instance is being built.
//!
//! Lookups go to the requesting scope. Disposers go to the scope that owns
//! the new instance, which is the root for singletons.

use crate::generic::GenericRequest;
use crate::internal::Disposer;
use crate::registration::AnyArc;
use crate::traits::{AsyncDisposeHook, DisposeHook, Resolver, ResolverCore};
use crate::{DiResult, Key};

use super::scope::ScopeState;
use super::{Scope, ServiceProvider};

/// Context passed to factories and constructor recipes.
///
/// It resolves against the scope the outer request entered through, so a
/// dependency of a singleton built from inside a scope comes from that same
/// scope. Disposers registered through it go to the scope that owns the
/// instance being built: the root for singletons.
///
/// # Examples
///
/// ```
/// use arbor_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database {
///     url: "postgres://localhost".to_string()
/// });
/// services.add_transient_factory(|resolver| {
///     Ok(UserService {
///         db: resolver.get::<Database>()?,
///     })
/// });
///
/// let provider = services.build();
/// let users = provider.get_required::<UserService>();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    scope: &'a Scope,
    owner: &'a ScopeState,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: &'a Scope, owner: &'a ScopeState) -> Self {
        Self { scope, owner }
    }

    /// The scope the current request entered through.
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// The root provider.
    pub fn provider(&self) -> &'a ServiceProvider {
        self.scope.provider()
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.scope.resolve_any(key)
    }

    fn resolve_generic(&self, request: &GenericRequest) -> DiResult<AnyArc> {
        self.scope.resolve_generic(request)
    }

    fn track_disposer(
        &self,
        service: &'static str,
        sync: Option<DisposeHook>,
        asynchronous: Option<AsyncDisposeHook>,
    ) {
        self.owner
            .track(Disposer::from_hooks(service, sync, asynchronous));
    }
}

impl Resolver for ResolverContext<'_> {}
