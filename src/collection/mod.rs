//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type and related functionality
//! for registering services and building service providers.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;

use crate::config::ContainerOptions;
use crate::descriptors::{OpenGenericDescriptor, ServiceDescriptor};
use crate::generic::{OpenGeneric, Shape};
use crate::observer::Observers;
use crate::provider::ResolverContext;
use crate::registration::{Catalog, Recipe, Registration, Registry, Template};
use crate::traits::Dispose;
use crate::{DiError, DiObserver, DiResult, Injectable, Key, Lifetime, ServiceProvider};

/// Mutable set of registrations, frozen into a [`ServiceProvider`] by
/// [`build`](ServiceCollection::build).
///
/// Registering a key twice replaces the earlier registration.
pub struct ServiceCollection {
    pub(crate) registry: Registry,
    pub(crate) templates: HashMap<Shape, Template, RandomState>,
    observers: Observers,
    options: ContainerOptions,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            templates: HashMap::with_hasher(RandomState::new()),
            observers: Observers::new(),
            options: ContainerOptions::default(),
        }
    }

    fn insert(&mut self, key: Key, lifetime: Lifetime, recipe: Recipe) -> &mut Self {
        tracing::trace!(service = key.display_name(), %lifetime, "registered");
        self.registry.insert(Registration::new(key, lifetime, recipe));
        self
    }

    // ----- Constructor Registrations -----

    /// Registers `T`, built from its [`Injectable`] implementation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbor_di::{Injectable, Lifetime, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct Clock;
    /// impl Injectable for Clock {
    ///     type Deps = ();
    ///     fn construct(_: ()) -> Self { Clock }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_service::<Clock>(Lifetime::Transient);
    ///
    /// let provider = services.build();
    /// let a = provider.get_required::<Clock>();
    /// let b = provider.get_required::<Clock>();
    /// assert!(!Arc::ptr_eq(&a, &b));
    /// ```
    pub fn add_service<T: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.insert(Key::of::<T>(), lifetime, Recipe::constructor::<T>())
    }

    pub fn add_singleton_service<T: Injectable>(&mut self) -> &mut Self {
        self.add_service::<T>(Lifetime::Singleton)
    }

    pub fn add_scoped_service<T: Injectable>(&mut self) -> &mut Self {
        self.add_service::<T>(Lifetime::Scoped)
    }

    pub fn add_transient_service<T: Injectable>(&mut self) -> &mut Self {
        self.add_service::<T>(Lifetime::Transient)
    }

    /// Registers `T` only if nothing is registered under its key yet.
    ///
    /// Returns `true` if the registration was added.
    pub fn try_add_service<T: Injectable>(&mut self, lifetime: Lifetime) -> bool {
        if self.contains::<T>() {
            return false;
        }
        self.add_service::<T>(lifetime);
        true
    }

    /// Registers implementation `I` as service `S`, typically a trait object.
    ///
    /// `cast` performs the unsizing coercion, which Rust cannot express generically.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbor_di::{Injectable, Lifetime, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    /// impl Injectable for English {
    ///     type Deps = ();
    ///     fn construct(_: ()) -> Self { English }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_trait_service::<dyn Greeter, English, _>(Lifetime::Singleton, |g| g as Arc<dyn Greeter>);
    ///
    /// let provider = services.build();
    /// assert_eq!(provider.get_required::<dyn Greeter>().greet(), "hello");
    /// ```
    pub fn add_trait_service<S, I, F>(&mut self, lifetime: Lifetime, cast: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        F: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        self.insert(Key::of::<S>(), lifetime, Recipe::constructor_as::<S, I, F>(cast))
    }

    /// Registers the open generic with shape `S`.
    ///
    /// Every closed type whose [`GenericService::Shape`](crate::GenericService::Shape)
    /// is `S` resolves through this template with `lifetime`, unless the
    /// closed type has an exact registration of its own.
    pub fn add_open_generic<S: OpenGeneric>(&mut self, lifetime: Lifetime) -> &mut Self {
        let shape = Shape::of::<S>();
        tracing::trace!(template = shape.name(), %lifetime, "registered open generic");
        self.templates.insert(shape, Template::new(shape, lifetime));
        self
    }

    // ----- Instance and Factory Registrations -----

    /// Registers a singleton instance that will be shared across the entire application.
    ///
    /// The container does not dispose pre-built instances; their creator owns them.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use arbor_di::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.insert(Key::of::<T>(), Lifetime::Singleton, Recipe::instance(Arc::new(value)))
    }

    /// Registers a pre-built trait object as a singleton.
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(Key::of::<T>(), Lifetime::Singleton, Recipe::instance(value))
    }

    /// Registers a factory with the given lifetime.
    ///
    /// The factory receives a [`ResolverContext`] to resolve dependencies. Its
    /// result is not tracked for disposal; use
    /// [`add_disposable_factory`](ServiceCollection::add_disposable_factory) or
    /// [`Resolver::register_disposer`](crate::Resolver::register_disposer) for that.
    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let recipe = Recipe::factory::<T, _>(move |ctx| factory(ctx).map(Arc::new));
        self.insert(Key::of::<T>(), lifetime, recipe)
    }

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use arbor_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory(|resolver| {
    ///     Ok(UserService {
    ///         db: resolver.get::<Database>()?,
    ///     })
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped factory that creates one instance per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient factory that creates a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    /// Registers a factory whose instances are disposed through [`Dispose`]
    /// by the scope that owns them.
    pub fn add_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.insert(Key::of::<T>(), lifetime, Recipe::disposable_factory::<T, _>(factory))
    }

    /// Registers a factory producing a trait object.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use arbor_di::{Lifetime, Resolver, ServiceCollection};
    /// # use std::sync::Arc;
    /// trait Logger: Send + Sync {
    ///     fn name(&self) -> &str;
    /// }
    ///
    /// struct ConsoleLogger;
    /// impl Logger for ConsoleLogger {
    ///     fn name(&self) -> &str { "console" }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_trait_factory::<dyn Logger, _>(Lifetime::Scoped, |_| {
    ///     Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// assert_eq!(scope.get_required::<dyn Logger>().name(), "console");
    /// ```
    pub fn add_trait_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.insert(Key::of::<T>(), lifetime, Recipe::factory::<T, _>(factory))
    }

    // ----- Inspection -----

    /// Whether a registration exists for `T`. Open generics are not consulted.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registry.contains_key(&Key::of::<T>())
    }

    /// Number of registrations, not counting open generics.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0 && self.templates.is_empty()
    }

    /// Returns descriptors for all registered services.
    pub fn get_service_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry
            .iter()
            .map(|reg| ServiceDescriptor::from_registration(reg))
            .collect()
    }

    pub fn get_open_generic_descriptors(&self) -> Vec<OpenGenericDescriptor> {
        self.templates
            .values()
            .map(OpenGenericDescriptor::from_template)
            .collect()
    }

    // ----- Configuration -----

    /// Sets the options the built provider runs with.
    pub fn with_options(&mut self, options: ContainerOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Adds an observer notified of resolutions and scope disposals.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    // ----- Build -----

    /// Freezes the collection into a provider.
    ///
    /// Unlike [`try_build`](ServiceCollection::try_build) this never validates;
    /// configuration problems surface when the affected service is resolved.
    pub fn build(self) -> ServiceProvider {
        let catalog = Catalog::new(self.registry, self.templates);
        ServiceProvider::new(catalog, self.options, self.observers)
    }

    /// Checks the options and, with
    /// [`validate_on_build`](ContainerOptions::validate_on_build) set,
    /// validates the registrations before building.
    ///
    /// Validation errors fail the build with [`DiError::InvalidConfiguration`];
    /// warnings are logged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbor_di::{DiError, Injectable, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct Ping;
    /// impl Injectable for Ping {
    ///     type Deps = (Arc<Pong>,);
    ///     fn construct(_: Self::Deps) -> Self { Ping }
    /// }
    ///
    /// struct Pong;
    /// impl Injectable for Pong {
    ///     type Deps = (Arc<Ping>,);
    ///     fn construct(_: Self::Deps) -> Self { Pong }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_transient_service::<Ping>();
    /// services.add_transient_service::<Pong>();
    ///
    /// match services.try_build() {
    ///     Err(DiError::InvalidConfiguration(report)) => assert!(report.contains("Circular")),
    ///     _ => panic!("expected a configuration error"),
    /// }
    /// ```
    pub fn try_build(self) -> DiResult<ServiceProvider> {
        self.options.check()?;

        if self.options.validate_on_build {
            let result = self.validate();
            if !result.is_valid() {
                return Err(DiError::InvalidConfiguration(result.format_issues()));
            }
            for warning in &result.warnings {
                tracing::warn!(%warning, "service configuration");
            }
        }

        Ok(self.build())
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    impl Injectable for Widget {
        type Deps = ();
        fn construct(_: ()) -> Self {
            Widget
        }
    }

    struct Shelf;
    impl OpenGeneric for Shelf {}

    #[test]
    fn try_add_keeps_first_registration() {
        let mut services = ServiceCollection::new();
        assert!(services.try_add_service::<Widget>(Lifetime::Singleton));
        assert!(!services.try_add_service::<Widget>(Lifetime::Transient));

        let descriptors = services.get_service_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].lifetime, Lifetime::Singleton);
    }

    #[test]
    fn overwrite_replaces_lifetime() {
        let mut services = ServiceCollection::new();
        services.add_singleton_service::<Widget>();
        services.add_transient_service::<Widget>();
        assert_eq!(services.len(), 1);
        assert_eq!(services.get_service_descriptors()[0].lifetime, Lifetime::Transient);
    }

    #[test]
    fn open_generics_are_listed_separately() {
        let mut services = ServiceCollection::new();
        assert!(services.is_empty());
        services.add_open_generic::<Shelf>(Lifetime::Scoped);

        assert!(!services.is_empty());
        assert_eq!(services.len(), 0);
        let templates = services.get_open_generic_descriptors();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].lifetime, Lifetime::Scoped);
        assert!(templates[0].name().ends_with("Shelf"));
    }

    #[test]
    fn try_build_rejects_zero_depth() {
        let mut services = ServiceCollection::new();
        services.with_options(ContainerOptions::default().max_depth(0));
        assert!(matches!(services.try_build(), Err(DiError::InvalidConfiguration(_))));
    }
}
