//! Service registration types and the frozen catalog.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::generic::{GenericRequest, Shape, TypeArgs};
use crate::inject::{DeclaredDependency, Dependencies, InjectionPlan};
use crate::internal::Disposer;
use crate::provider::ResolverContext;
use crate::traits::Dispose;
use crate::{DiError, DiResult, Injectable, Key, Lifetime};

// Type-erased storage. Always holds an `Arc<T>` so sized services and trait
// objects downcast the same way.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Output of one construction.
pub(crate) struct Built {
    pub(crate) instance: AnyArc,
    pub(crate) disposer: Option<Disposer>,
}

pub(crate) type Ctor =
    Arc<dyn Fn(&ResolverContext<'_>, &InjectionPlan) -> DiResult<Built> + Send + Sync>;

/// How a registration produces its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StrategyKind {
    /// Built from an [`Injectable`] implementation
    Constructor,
    /// Built by a registered closure
    Factory,
    /// A pre-built instance
    Instance,
}

/// Construction recipe for one registration.
#[derive(Clone)]
pub(crate) struct Recipe {
    pub(crate) kind: StrategyKind,
    pub(crate) impl_name: &'static str,
    pub(crate) params: Vec<DeclaredDependency>,
    pub(crate) property_names: Vec<&'static str>,
    pub(crate) property_targets: Vec<DeclaredDependency>,
    pub(crate) ctor: Ctor,
}

impl Recipe {
    /// Recipe for `T` registered as itself.
    pub(crate) fn constructor<T: Injectable>() -> Self {
        Self::constructor_as::<T, T, _>(|instance| instance)
    }

    /// Recipe for implementation `I` exposed as service `S` through `cast`.
    pub(crate) fn constructor_as<S, I, F>(cast: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        F: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        let properties = Arc::new(I::properties());
        let property_names = properties.names();
        let property_targets = properties.targets();

        let ctor: Ctor = Arc::new(move |ctx, plan| {
            let deps = I::Deps::resolve(ctx)?;
            let mut value = I::construct(deps);
            properties.apply(&mut value, plan, ctx)?;

            let instance = Arc::new(value);
            let disposer = Disposer::for_instance(&instance);
            Ok(Built {
                instance: Arc::new(cast(instance)) as AnyArc,
                disposer,
            })
        });

        Recipe {
            kind: StrategyKind::Constructor,
            impl_name: std::any::type_name::<I>(),
            params: I::Deps::declared(),
            property_names,
            property_targets,
            ctor,
        }
    }

    /// Recipe backed by a factory closure. The result is not tracked for disposal.
    pub(crate) fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::from_factory::<T, _>(move |ctx| {
            Ok(Built {
                instance: Arc::new(factory(ctx)?) as AnyArc,
                disposer: None,
            })
        })
    }

    /// Recipe backed by a factory whose result is tracked through [`Dispose`].
    pub(crate) fn disposable_factory<T, F>(factory: F) -> Self
    where
        T: Dispose,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self::from_factory::<T, _>(move |ctx| {
            let instance = Arc::new(factory(ctx)?);
            let disposer = Disposer::from_dispose(instance.clone());
            Ok(Built {
                instance: Arc::new(instance) as AnyArc,
                disposer: Some(disposer),
            })
        })
    }

    fn from_factory<T, F>(build: F) -> Self
    where
        T: ?Sized + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Built> + Send + Sync + 'static,
    {
        Recipe {
            kind: StrategyKind::Factory,
            impl_name: std::any::type_name::<T>(),
            params: Vec::new(),
            property_names: Vec::new(),
            property_targets: Vec::new(),
            ctor: Arc::new(move |ctx, _plan| build(ctx)),
        }
    }

    /// Recipe returning a pre-built instance. Its owner stays responsible for disposal.
    pub(crate) fn instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Recipe {
            kind: StrategyKind::Instance,
            impl_name: std::any::type_name::<T>(),
            params: Vec::new(),
            property_names: Vec::new(),
            property_targets: Vec::new(),
            ctor: Arc::new(move |_ctx, _plan| {
                Ok(Built {
                    instance: Arc::new(value.clone()) as AnyArc,
                    disposer: None,
                })
            }),
        }
    }
}

/// Service registration with lifetime and recipe.
pub(crate) struct Registration {
    pub(crate) key: Key,
    pub(crate) lifetime: Lifetime,
    pub(crate) recipe: Recipe,
    plan: OnceCell<InjectionPlan>,
    /// Singleton cell, initialized at most once.
    pub(crate) singleton: OnceCell<AnyArc>,
    /// Template this registration was closed from.
    pub(crate) closed_from: Option<Shape>,
}

impl Registration {
    pub(crate) fn new(key: Key, lifetime: Lifetime, recipe: Recipe) -> Self {
        Registration {
            key,
            lifetime,
            recipe,
            plan: OnceCell::new(),
            singleton: OnceCell::new(),
            closed_from: None,
        }
    }

    fn closed(key: Key, template: &Template, recipe: Recipe, plan: InjectionPlan) -> Self {
        Registration {
            key,
            lifetime: template.lifetime,
            recipe,
            plan: OnceCell::with_value(plan),
            singleton: OnceCell::new(),
            closed_from: Some(template.shape),
        }
    }
}

/// Open-generic template: the unbound shape plus its lifetime.
pub(crate) struct Template {
    pub(crate) shape: Shape,
    pub(crate) lifetime: Lifetime,
}

impl Template {
    pub(crate) fn new(shape: Shape, lifetime: Lifetime) -> Self {
        Template { shape, lifetime }
    }
}

/// Service registry holding all registrations.
///
/// The first entries live in a vector scanned linearly; the rest spill into a map.
pub(crate) struct Registry {
    small: Vec<(Key, Arc<Registration>)>,
    large: HashMap<Key, Arc<Registration>, RandomState>,
    small_threshold: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            small: Vec::new(),
            large: HashMap::with_hasher(RandomState::new()),
            small_threshold: 16,
        }
    }

    /// Inserts a registration; a later registration for the same key replaces the earlier one.
    pub(crate) fn insert(&mut self, registration: Registration) {
        let key = registration.key;
        let registration = Arc::new(registration);
        if let Some(slot) = self.small.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = registration;
        } else if self.small.len() < self.small_threshold {
            self.small.push((key, registration));
        } else {
            self.large.insert(key, registration);
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<&Arc<Registration>> {
        self.small
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, reg)| reg)
            .or_else(|| self.large.get(key))
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.small.iter().map(|(_, reg)| reg).chain(self.large.values())
    }

    pub(crate) fn len(&self) -> usize {
        self.small.len() + self.large.len()
    }
}

/// Frozen registrations of a built provider.
///
/// Read-only apart from the closed-generic cache, which gains at most one
/// registration per `(Shape, TypeArgs)` pair.
pub(crate) struct Catalog {
    registry: Registry,
    templates: HashMap<Shape, Template, RandomState>,
    closed: RwLock<HashMap<(Shape, TypeArgs), Arc<Registration>, RandomState>>,
}

impl Catalog {
    pub(crate) fn new(registry: Registry, templates: HashMap<Shape, Template, RandomState>) -> Self {
        Catalog {
            registry,
            templates,
            closed: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    pub(crate) fn lookup(&self, key: &Key) -> DiResult<Arc<Registration>> {
        self.registry
            .get(key)
            .cloned()
            .ok_or(DiError::Unregistered(key.display_name()))
    }

    /// Exact registration first, then a cached closing, then closes the template.
    pub(crate) fn lookup_generic(&self, request: &GenericRequest) -> DiResult<Arc<Registration>> {
        if let Some(registration) = self.registry.get(&request.key) {
            return Ok(registration.clone());
        }

        let cache_key = (request.shape, request.args.clone());
        if let Some(registration) = self.closed.read().get(&cache_key) {
            return Ok(registration.clone());
        }

        let template = self
            .templates
            .get(&request.shape)
            .ok_or(DiError::Unregistered(request.key.display_name()))?;

        let mut closed = self.closed.write();
        let registration = closed.entry(cache_key).or_insert_with(|| {
            let recipe = (request.recipe)();
            // Property types can depend on the type arguments, so each closing
            // gets its own plan.
            let plan = self.plan_for(&recipe.property_targets);
            tracing::debug!(
                template = request.shape.name(),
                args = %request.args,
                "closed open generic"
            );
            Arc::new(Registration::closed(request.key, template, recipe, plan))
        });
        Ok(registration.clone())
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.registry.contains_key(key)
    }

    /// Whether a declared dependency can be served: an exact registration or
    /// an open template for its shape.
    pub(crate) fn can_resolve(&self, target: &DeclaredDependency) -> bool {
        self.contains(&target.key)
            || target
                .generic
                .map_or(false, |shape| self.templates.contains_key(&shape))
    }

    /// The registration's property plan, computed on first use.
    pub(crate) fn injection_plan<'r>(&self, registration: &'r Registration) -> &'r InjectionPlan {
        registration
            .plan
            .get_or_init(|| self.plan_for(&registration.recipe.property_targets))
    }

    fn plan_for(&self, targets: &[DeclaredDependency]) -> InjectionPlan {
        InjectionPlan::compute(targets, |target| self.can_resolve(target))
    }

    pub(crate) fn registrations(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.registry.iter()
    }

    pub(crate) fn template_lifetime(&self, shape: &Shape) -> Option<Lifetime> {
        self.templates.get(shape).map(|t| t.lifetime)
    }

    pub(crate) fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub(crate) fn closed_count(&self) -> usize {
        self.closed.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_registration<T: Send + Sync + 'static>(value: T) -> Registration {
        Registration::new(Key::of::<T>(), Lifetime::Singleton, Recipe::instance(Arc::new(value)))
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new();
        registry.insert(instance_registration(1u32));
        registry.insert(Registration::new(
            Key::of::<u32>(),
            Lifetime::Transient,
            Recipe::instance(Arc::new(2u32)),
        ));

        assert_eq!(registry.len(), 1);
        let reg = registry.get(&Key::of::<u32>()).unwrap();
        assert_eq!(reg.lifetime, Lifetime::Transient);
    }

    #[test]
    fn spills_past_threshold() {
        macro_rules! register_all {
            ($registry:ident; $($n:literal),*) => {
                $( $registry.insert(instance_registration([0u8; $n])); )*
            };
        }

        let mut registry = Registry::new();
        register_all!(registry; 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20);

        assert_eq!(registry.len(), 20);
        assert_eq!(registry.large.len(), 4);
        assert!(registry.contains_key(&Key::of::<[u8; 20]>()));
        assert!(registry.contains_key(&Key::of::<[u8; 1]>()));

        registry.insert(instance_registration([1u8; 18]));
        assert_eq!(registry.len(), 20);
    }

    #[test]
    fn lookup_reports_unregistered() {
        let catalog = Catalog::new(Registry::new(), HashMap::with_hasher(RandomState::new()));
        match catalog.lookup(&Key::of::<String>()) {
            Err(DiError::Unregistered(name)) => assert_eq!(name, "alloc::string::String"),
            _ => panic!("expected Unregistered"),
        }
    }
}
