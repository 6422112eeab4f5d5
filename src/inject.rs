//! Constructor and property injection.
//!
//! A service describes how it is built by implementing [`Injectable`]: its
//! constructor parameters are a tuple of [`Dependency`] values resolved from the
//! requesting scope, and its settable properties are declared once through
//! [`Properties`]. The container turns both into a construction recipe at
//! registration time, so no per-resolution inspection happens.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::generic::{GenericService, Shape};
use crate::provider::{ResolverContext, Scope, ServiceProvider};
use crate::traits::{AsyncDispose, Dispose, Resolver};
use crate::{DiResult, Key};

/// A service the container can construct.
///
/// # Examples
///
/// ```rust
/// use arbor_di::{Injectable, Properties, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Clock;
/// impl Injectable for Clock {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Clock }
/// }
///
/// struct Audit;
/// impl Injectable for Audit {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Audit }
/// }
///
/// struct Orders {
///     clock: Arc<Clock>,
///     audit: Option<Arc<Audit>>,
/// }
///
/// impl Injectable for Orders {
///     type Deps = (Arc<Clock>,);
///
///     fn construct((clock,): Self::Deps) -> Self {
///         Orders { clock, audit: None }
///     }
///
///     fn properties() -> Properties<Self> {
///         Properties::new().property("audit", |orders: &mut Orders, audit: Arc<Audit>| {
///             orders.audit = Some(audit);
///         })
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_service::<Clock>();
/// services.add_singleton_service::<Audit>();
/// services.add_transient_service::<Orders>();
///
/// let provider = services.build();
/// let orders = provider.get_required::<Orders>();
/// assert!(orders.audit.is_some());
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor parameters, resolved from the requesting scope.
    type Deps: Dependencies;

    /// Builds the service from its resolved parameters.
    fn construct(deps: Self::Deps) -> Self;

    /// Settable properties injected after construction.
    ///
    /// Only properties whose service type is registered are injected; the
    /// rest are left as constructed.
    fn properties() -> Properties<Self> {
        Properties::new()
    }

    /// Synchronous disposal capability, tracked by the owning scope when present.
    fn disposal(&self) -> Option<&dyn Dispose> {
        None
    }

    /// Asynchronous disposal capability, tracked by the owning scope when present.
    fn async_disposal(&self) -> Option<&dyn AsyncDispose> {
        None
    }
}

/// A constructor parameter or property as seen by validation and descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub key: Key,
    /// Optional parameters resolve to `None` when unregistered.
    pub optional: bool,
    /// Open generic that can close `key` when no exact registration exists.
    pub generic: Option<Shape>,
}

impl DeclaredDependency {
    pub(crate) fn required(key: Key) -> Self {
        DeclaredDependency { key, optional: false, generic: None }
    }

    pub(crate) fn of_generic<G: GenericService>(optional: bool) -> Self {
        DeclaredDependency {
            key: Key::of::<G>(),
            optional,
            generic: Some(Shape::of::<G::Shape>()),
        }
    }
}

/// A single constructor parameter.
pub trait Dependency: Sized + Send + Sync + 'static {
    /// The service this parameter resolves, `None` for container handles.
    fn declared() -> Option<DeclaredDependency>;

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn declared() -> Option<DeclaredDependency> {
        Some(DeclaredDependency::required(Key::of::<T>()))
    }

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        ctx.get::<T>()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Option<Arc<T>> {
    fn declared() -> Option<DeclaredDependency> {
        Some(DeclaredDependency {
            optional: true,
            ..DeclaredDependency::required(Key::of::<T>())
        })
    }

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        ctx.get_optional::<T>()
    }
}

/// A closed generic service, resolved through its open template when the
/// closed type has no registration of its own.
///
/// `Arc<Repository<User>>` only finds an exact registration; declare the
/// parameter as `Generic<Repository<User>>` to let `add_open_generic` serve it.
pub struct Generic<G>(pub Arc<G>);

impl<G> std::ops::Deref for Generic<G> {
    type Target = G;

    fn deref(&self) -> &G {
        &self.0
    }
}

impl<G> Clone for Generic<G> {
    fn clone(&self) -> Self {
        Generic(self.0.clone())
    }
}

impl<G: GenericService> Dependency for Generic<G> {
    fn declared() -> Option<DeclaredDependency> {
        Some(DeclaredDependency::of_generic::<G>(false))
    }

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        ctx.get_generic::<G>().map(Generic)
    }
}

/// The container itself. Always the root provider, whichever scope resolves it.
impl Dependency for ServiceProvider {
    fn declared() -> Option<DeclaredDependency> {
        None
    }

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(ctx.provider().clone())
    }
}

/// The scope the current resolution entered through.
///
/// This is a strong handle. A disposable service that stores it keeps its own
/// scope alive until `Scope::dispose` runs.
impl Dependency for Scope {
    fn declared() -> Option<DeclaredDependency> {
        None
    }

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(ctx.scope().clone())
    }
}

/// The full constructor parameter list of an [`Injectable`].
pub trait Dependencies: Sized {
    fn declared() -> Vec<DeclaredDependency>;

    fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self>;
}

impl Dependencies for () {
    fn declared() -> Vec<DeclaredDependency> {
        Vec::new()
    }

    fn resolve(_ctx: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(())
    }
}

macro_rules! impl_dependencies {
    ($($name:ident),+) => {
        impl<$($name: Dependency),+> Dependencies for ($($name,)+) {
            fn declared() -> Vec<DeclaredDependency> {
                [$($name::declared()),+].into_iter().flatten().collect()
            }

            fn resolve(ctx: &ResolverContext<'_>) -> DiResult<Self> {
                Ok(($($name::resolve(ctx)?,)+))
            }
        }
    };
}

impl_dependencies!(A);
impl_dependencies!(A, B);
impl_dependencies!(A, B, C);
impl_dependencies!(A, B, C, D);
impl_dependencies!(A, B, C, D, E);
impl_dependencies!(A, B, C, D, E, F);
impl_dependencies!(A, B, C, D, E, F, G);
impl_dependencies!(A, B, C, D, E, F, G, H);

type Inject<T> = Arc<dyn Fn(&mut T, &ResolverContext<'_>) -> DiResult<()> + Send + Sync>;

struct PropertyEntry<T> {
    name: &'static str,
    target: DeclaredDependency,
    inject: Inject<T>,
}

/// Declared settable properties of `T`.
///
/// Built once per registration. [`Properties::inherit`] folds a base type's
/// properties into a type that embeds it, so a concrete service composed
/// over a generic base still gets the base's properties injected.
///
/// ```rust
/// use arbor_di::{Injectable, Properties};
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// struct Base<T> {
///     greeter: Option<Arc<Greeter>>,
///     value: Option<T>,
/// }
///
/// impl<T> Base<T> {
///     fn properties() -> Properties<Self>
///     where
///         T: 'static,
///     {
///         Properties::new().property("greeter", |b: &mut Base<T>, g: Arc<Greeter>| {
///             b.greeter = Some(g)
///         })
///     }
/// }
///
/// struct Concrete {
///     base: Base<String>,
/// }
///
/// let props: Properties<Concrete> =
///     Properties::new().inherit(Base::<String>::properties(), |c: &mut Concrete| &mut c.base);
/// assert_eq!(props.names(), vec!["greeter"]);
/// ```
pub struct Properties<T> {
    entries: Vec<PropertyEntry<T>>,
}

impl<T: 'static> Properties<T> {
    pub fn new() -> Self {
        Properties { entries: Vec::new() }
    }

    /// Declares a property holding service `P`.
    pub fn property<P, F>(mut self, name: &'static str, setter: F) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        self.entries.push(PropertyEntry {
            name,
            target: DeclaredDependency {
                optional: true,
                ..DeclaredDependency::required(Key::of::<P>())
            },
            inject: Arc::new(move |target: &mut T, ctx: &ResolverContext<'_>| {
                let value = ctx.get::<P>()?;
                setter(target, value);
                Ok(())
            }),
        });
        self
    }

    /// Declares a property holding closed generic `G`, served by its open
    /// template when `G` has no exact registration.
    pub fn generic_property<G, F>(mut self, name: &'static str, setter: F) -> Self
    where
        G: GenericService,
        F: Fn(&mut T, Arc<G>) + Send + Sync + 'static,
    {
        self.entries.push(PropertyEntry {
            name,
            target: DeclaredDependency::of_generic::<G>(true),
            inject: Arc::new(move |target: &mut T, ctx: &ResolverContext<'_>| {
                let value = ctx.get_generic::<G>()?;
                setter(target, value);
                Ok(())
            }),
        });
        self
    }

    /// Adds every property of `B`, reached through `project`.
    pub fn inherit<B: 'static>(mut self, base: Properties<B>, project: fn(&mut T) -> &mut B) -> Self {
        for entry in base.entries {
            let inner = entry.inject;
            self.entries.push(PropertyEntry {
                name: entry.name,
                target: entry.target,
                inject: Arc::new(move |target: &mut T, ctx: &ResolverContext<'_>| {
                    inner(project(target), ctx)
                }),
            });
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    pub(crate) fn targets(&self) -> Vec<DeclaredDependency> {
        self.entries.iter().map(|e| e.target).collect()
    }

    /// Injects the planned properties into `target`.
    pub(crate) fn apply(
        &self,
        target: &mut T,
        plan: &InjectionPlan,
        ctx: &ResolverContext<'_>,
    ) -> DiResult<()> {
        for &index in plan.indices() {
            if let Some(entry) = self.entries.get(index) {
                (entry.inject)(target, ctx)?;
            }
        }
        Ok(())
    }
}

impl<T: 'static> Default for Properties<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Indices of the declared properties whose service is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InjectionPlan {
    indices: SmallVec<[usize; 4]>,
}

impl InjectionPlan {
    pub(crate) fn compute(
        targets: &[DeclaredDependency],
        is_registered: impl Fn(&DeclaredDependency) -> bool,
    ) -> Self {
        InjectionPlan {
            indices: targets
                .iter()
                .enumerate()
                .filter(|(_, target)| is_registered(target))
                .map(|(index, _)| index)
                .collect(),
        }
    }

    pub(crate) fn indices(&self) -> &[usize] {
        &self.indices
    }
}
