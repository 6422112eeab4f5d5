//! Service descriptors for introspection and diagnostics.

use crate::generic::Shape;
use crate::inject::DeclaredDependency;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{Registration, StrategyKind, Template};

/// Snapshot of one registration.
///
/// Contains metadata about registered services that can be used for
/// debugging, validation, and runtime introspection of the container
/// configuration.
///
/// # Examples
///
/// ```rust
/// use arbor_di::{Injectable, Lifetime, Properties, ServiceCollection, StrategyKind};
/// use std::sync::Arc;
///
/// struct Database;
/// impl Injectable for Database {
///     type Deps = ();
///     fn construct(_: ()) -> Self { Database }
/// }
///
/// struct Metrics;
///
/// struct Repository {
///     metrics: Option<Arc<Metrics>>,
/// }
/// impl Injectable for Repository {
///     type Deps = (Arc<Database>,);
///     fn construct(_: Self::Deps) -> Self { Repository { metrics: None } }
///     fn properties() -> Properties<Self> {
///         Properties::new().property("metrics", |r: &mut Repository, m: Arc<Metrics>| r.metrics = Some(m))
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_service::<Database>();
/// services.add_scoped_service::<Repository>();
/// services.add_singleton(42u32);
///
/// let descriptors = services.get_service_descriptors();
/// assert_eq!(descriptors.len(), 3);
///
/// let repo = descriptors.iter().find(|d| d.type_name().ends_with("Repository")).unwrap();
/// assert_eq!(repo.lifetime, Lifetime::Scoped);
/// assert_eq!(repo.strategy, StrategyKind::Constructor);
/// assert!(repo.dependencies[0].key.display_name().ends_with("Database"));
/// assert_eq!(repo.properties, vec!["metrics"]);
///
/// let number = descriptors.iter().find(|d| d.type_name() == "u32").unwrap();
/// assert_eq!(number.strategy, StrategyKind::Instance);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key
    pub key: Key,
    /// Service lifetime
    pub lifetime: Lifetime,
    /// How the instance is produced
    pub strategy: StrategyKind,
    /// Implementation type name; the service's own name for factories and instances
    pub impl_type_name: &'static str,
    /// Declared constructor parameters (empty for factories and instances)
    pub dependencies: Vec<DeclaredDependency>,
    /// Names of declared injectable properties
    pub properties: Vec<&'static str>,
    /// Open generic this registration was closed from
    pub closed_from: Option<Shape>,
}

impl ServiceDescriptor {
    pub(crate) fn from_registration(registration: &Registration) -> Self {
        ServiceDescriptor {
            key: registration.key,
            lifetime: registration.lifetime,
            strategy: registration.recipe.kind,
            impl_type_name: registration.recipe.impl_name,
            dependencies: registration.recipe.params.clone(),
            properties: registration.recipe.property_names.clone(),
            closed_from: registration.closed_from,
        }
    }

    /// Get the type/trait name
    ///
    /// Returns the human-readable type or trait name for this service,
    /// the result of `std::any::type_name`.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// `true` when the service is exposed under a different type than its
    /// implementation, e.g. a trait object.
    pub fn is_aliased(&self) -> bool {
        self.strategy == StrategyKind::Constructor && self.impl_type_name != self.type_name()
    }
}

/// Snapshot of one open-generic template.
#[derive(Debug, Clone)]
pub struct OpenGenericDescriptor {
    pub shape: Shape,
    pub lifetime: Lifetime,
}

impl OpenGenericDescriptor {
    pub(crate) fn from_template(template: &Template) -> Self {
        OpenGenericDescriptor {
            shape: template.shape,
            lifetime: template.lifetime,
        }
    }

    pub fn name(&self) -> &'static str {
        self.shape.name()
    }
}
