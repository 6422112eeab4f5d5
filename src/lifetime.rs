//! Service lifetime definitions and the caching/ownership policy behind them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Service lifetimes controlling instance caching behavior
///
/// Defines how service instances are created, cached, shared and disposed
/// within the container.
///
/// # Examples
///
/// ```rust
/// use arbor_di::{Injectable, Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database;
/// impl Injectable for Database {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Database }
/// }
///
/// struct Repository;
/// impl Injectable for Repository {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Repository }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_service::<Database>(Lifetime::Singleton);
/// services.add_service::<Repository>(Lifetime::Scoped);
///
/// let provider = services.build();
/// let scope1 = provider.create_scope();
/// let scope2 = provider.create_scope();
///
/// // Singleton: same instance across scopes
/// assert!(Arc::ptr_eq(
///     &scope1.get_required::<Database>(),
///     &scope2.get_required::<Database>(),
/// ));
///
/// // Scoped: same within a scope, different across scopes
/// let a = scope1.get_required::<Repository>();
/// assert!(Arc::ptr_eq(&a, &scope1.get_required::<Repository>()));
/// assert!(!Arc::ptr_eq(&a, &scope2.get_required::<Repository>()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Lifetime {
    /// Single instance per container, created lazily and cached forever
    ///
    /// Singletons live in the root catalog and are shared by every scope.
    /// They are disposed only when the container itself is torn down, even if
    /// the first request came from a short-lived scope.
    Singleton,
    /// Single instance per scope, cached for the scope lifetime
    ///
    /// Sibling scopes each get their own instance. The owning scope disposes it.
    Scoped,
    /// New instance per resolution, never cached
    ///
    /// Every instance is tracked by the scope that resolved it and disposed
    /// with that scope.
    Transient,
}

/// Where a resolved instance is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLocation {
    /// The registration's container-wide cell
    Root,
    /// The requesting scope's instance cache
    Scope,
    /// Not cached
    Uncached,
}

/// Which scope owns disposal of a resolved instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposalOwner {
    /// The root scope, drained on container teardown
    Root,
    /// The scope the request entered through
    ResolvingScope,
}

/// Caching and ownership rules for one lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifetimePolicy {
    pub cache: CacheLocation,
    pub owner: DisposalOwner,
    pub shared_across_scopes: bool,
}

impl Lifetime {
    /// The caching/ownership policy for this lifetime.
    ///
    /// | Lifetime  | Cache  | Shared across scopes | Disposal owner  |
    /// |-----------|--------|----------------------|-----------------|
    /// | Singleton | root   | yes                  | root            |
    /// | Scoped    | scope  | no                   | resolving scope |
    /// | Transient | none   | no                   | resolving scope |
    pub const fn policy(self) -> LifetimePolicy {
        match self {
            Lifetime::Singleton => LifetimePolicy {
                cache: CacheLocation::Root,
                owner: DisposalOwner::Root,
                shared_across_scopes: true,
            },
            Lifetime::Scoped => LifetimePolicy {
                cache: CacheLocation::Scope,
                owner: DisposalOwner::ResolvingScope,
                shared_across_scopes: false,
            },
            Lifetime::Transient => LifetimePolicy {
                cache: CacheLocation::Uncached,
                owner: DisposalOwner::ResolvingScope,
                shared_across_scopes: false,
            },
        }
    }

    /// Relative lifespan: singleton outlives scoped, scoped outlives transient.
    pub(crate) const fn rank(self) -> u8 {
        match self {
            Lifetime::Singleton => 2,
            Lifetime::Scoped => 1,
            Lifetime::Transient => 0,
        }
    }

    /// Returns `true` when a service of this lifetime holding a dependency of
    /// `dependency` keeps that dependency alive longer than its own lifetime.
    pub fn captures(self, dependency: Lifetime) -> bool {
        self.rank() > dependency.rank()
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_singletons_are_root_owned() {
        assert_eq!(Lifetime::Singleton.policy().owner, DisposalOwner::Root);
        assert_eq!(Lifetime::Scoped.policy().owner, DisposalOwner::ResolvingScope);
        assert_eq!(Lifetime::Transient.policy().owner, DisposalOwner::ResolvingScope);
    }

    #[test]
    fn transients_are_never_cached() {
        assert_eq!(Lifetime::Transient.policy().cache, CacheLocation::Uncached);
        assert!(!Lifetime::Transient.policy().shared_across_scopes);
        assert!(Lifetime::Singleton.policy().shared_across_scopes);
    }

    #[test]
    fn captive_dependencies() {
        assert!(Lifetime::Singleton.captures(Lifetime::Scoped));
        assert!(Lifetime::Singleton.captures(Lifetime::Transient));
        assert!(Lifetime::Scoped.captures(Lifetime::Transient));
        assert!(!Lifetime::Transient.captures(Lifetime::Singleton));
        assert!(!Lifetime::Scoped.captures(Lifetime::Scoped));
    }
}
