//! Configuration validation for service registrations.
//!
//! Validation walks the declared constructor parameters and properties of
//! every registration and reports problems that would otherwise surface as
//! resolution failures at runtime.
//!
//! # Rules
//!
//! - **Missing dependency**: error. A required constructor parameter has no
//!   registration and no open generic that could close it.
//! - **Circular dependency**: error. Registrations depend on each other in a cycle.
//! - **Singleton depending on scoped**: warning. The singleton captures the
//!   instance of whichever scope first built it.
//! - **Singleton depending on transient**: warning. The singleton keeps the
//!   same transient forever.
//!
//! Factories and pre-built instances declare no parameters and are treated as
//! leaves.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use ahash::RandomState;

use crate::generic::Shape;
use crate::inject::DeclaredDependency;
use crate::registration::Registration;
use crate::{Key, Lifetime, ServiceCollection, ServiceProvider};

/// Result of validating a set of registrations.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Errors that will make resolution fail
    pub errors: Vec<ValidationError>,
    /// Potentially problematic configurations
    pub warnings: Vec<ValidationWarning>,
}

/// A configuration problem that makes resolution fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required dependency is not registered
    MissingDependency {
        service: &'static str,
        dependency: &'static str,
    },
    /// Services that depend on each other; the first name is repeated last
    CircularDependency { cycle: Vec<&'static str> },
}

/// A configuration that resolves but probably does not do what was meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    SingletonDependsOnScoped {
        singleton: &'static str,
        scoped: &'static str,
    },
    SingletonDependsOnTransient {
        singleton: &'static str,
        transient: &'static str,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingDependency { service, dependency } => {
                write!(f, "Service '{}' depends on unregistered service '{}'", service, dependency)
            }
            ValidationError::CircularDependency { cycle } => {
                write!(f, "Circular dependency detected: {}", cycle.join(" -> "))
            }
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::SingletonDependsOnScoped { singleton, scoped } => write!(
                f,
                "Singleton '{}' depends on scoped '{}' - will keep the instance of the first scope that built it",
                singleton, scoped
            ),
            ValidationWarning::SingletonDependsOnTransient { singleton, transient } => write!(
                f,
                "Singleton '{}' depends on transient '{}' - will always get same instance",
                singleton, transient
            ),
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed without errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if there are warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Formats errors and warnings for display.
    pub fn format_issues(&self) -> String {
        let mut output = String::new();

        if !self.errors.is_empty() {
            output.push_str("Validation Errors:\n");
            for error in &self.errors {
                output.push_str(&format!("  - {}\n", error));
            }
        }

        if !self.warnings.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str("Validation Warnings:\n");
            for warning in &self.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }

        output
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return f.write_str("no issues");
        }
        f.write_str(self.format_issues().trim_end())
    }
}

/// Dependency graph over registrations, indexed by position.
struct Graph<'a> {
    nodes: Vec<&'a Registration>,
    edges: Vec<Vec<usize>>,
}

impl<'a> Graph<'a> {
    fn dfs_cycles(
        &self,
        current: usize,
        visited: &mut HashSet<usize, RandomState>,
        path: &mut Vec<usize>,
        cycles: &mut Vec<Vec<&'static str>>,
    ) {
        if let Some(cycle_start) = path.iter().position(|&id| id == current) {
            let cycle = path[cycle_start..]
                .iter()
                .chain(std::iter::once(&current))
                .map(|&id| self.nodes[id].key.display_name())
                .collect();
            cycles.push(cycle);
            return;
        }

        if !visited.insert(current) {
            return;
        }

        path.push(current);
        for &dep in &self.edges[current] {
            self.dfs_cycles(dep, visited, path, cycles);
        }
        path.pop();
    }

    fn detect_cycles(&self) -> Vec<Vec<&'static str>> {
        let mut visited = HashSet::with_hasher(RandomState::new());
        let mut path = Vec::new();
        let mut cycles = Vec::new();

        for start in 0..self.nodes.len() {
            if !visited.contains(&start) {
                self.dfs_cycles(start, &mut visited, &mut path, &mut cycles);
            }
        }

        cycles
    }
}

/// Validates `registrations`. `template_lifetime` reports the lifetime of an
/// open generic, if one is registered for the shape.
pub(crate) fn validate<'a, I, F>(registrations: I, template_lifetime: F) -> ValidationResult
where
    I: IntoIterator<Item = &'a Arc<Registration>>,
    F: Fn(&Shape) -> Option<Lifetime>,
{
    let nodes: Vec<&Registration> = registrations.into_iter().map(|r| r.as_ref()).collect();
    let index: HashMap<Key, usize, RandomState> = nodes
        .iter()
        .enumerate()
        .map(|(i, reg)| (reg.key, i))
        .collect();

    let mut result = ValidationResult::default();
    let mut edges = vec![Vec::new(); nodes.len()];

    for (i, reg) in nodes.iter().enumerate() {
        let service = reg.key.display_name();
        let declared = reg
            .recipe
            .params
            .iter()
            .chain(reg.recipe.property_targets.iter());

        for dep in declared {
            let dependency_lifetime = match lookup(dep, &index, &nodes, &template_lifetime) {
                Some((target, lifetime)) => {
                    if let Some(target) = target {
                        edges[i].push(target);
                    }
                    lifetime
                }
                None => {
                    if !dep.optional {
                        result.errors.push(ValidationError::MissingDependency {
                            service,
                            dependency: dep.key.display_name(),
                        });
                    }
                    continue;
                }
            };

            if reg.lifetime == Lifetime::Singleton && reg.lifetime.captures(dependency_lifetime) {
                let dependency = dep.key.display_name();
                match dependency_lifetime {
                    Lifetime::Scoped => result.warnings.push(ValidationWarning::SingletonDependsOnScoped {
                        singleton: service,
                        scoped: dependency,
                    }),
                    Lifetime::Transient => {
                        result.warnings.push(ValidationWarning::SingletonDependsOnTransient {
                            singleton: service,
                            transient: dependency,
                        })
                    }
                    Lifetime::Singleton => {}
                }
            }
        }
    }

    let graph = Graph { nodes, edges };
    for cycle in graph.detect_cycles() {
        result.errors.push(ValidationError::CircularDependency { cycle });
    }

    result
}

// Exact registrations become graph edges; template closings only contribute a lifetime.
fn lookup<F>(
    dep: &DeclaredDependency,
    index: &HashMap<Key, usize, RandomState>,
    nodes: &[&Registration],
    template_lifetime: &F,
) -> Option<(Option<usize>, Lifetime)>
where
    F: Fn(&Shape) -> Option<Lifetime>,
{
    if let Some(&target) = index.get(&dep.key) {
        return Some((Some(target), nodes[target].lifetime));
    }
    dep.generic
        .as_ref()
        .and_then(template_lifetime)
        .map(|lifetime| (None, lifetime))
}

impl ServiceCollection {
    /// Validates the registrations collected so far.
    ///
    /// # Examples
    ///
    /// ```
    /// use arbor_di::{Injectable, ServiceCollection, ValidationError};
    /// use std::sync::Arc;
    ///
    /// struct Database;
    /// struct UserService;
    /// impl Injectable for UserService {
    ///     type Deps = (Arc<Database>,);
    ///     fn construct(_: Self::Deps) -> Self { UserService }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_transient_service::<UserService>();
    ///
    /// let result = services.validate();
    /// assert!(!result.is_valid());
    /// assert!(matches!(result.errors[0], ValidationError::MissingDependency { .. }));
    /// ```
    pub fn validate(&self) -> ValidationResult {
        validate(self.registry.iter(), |shape| {
            self.templates.get(shape).map(|t| t.lifetime)
        })
    }
}

impl ServiceProvider {
    /// Validates the provider's registrations.
    ///
    /// Open generics closed at runtime are not part of the graph; a parameter
    /// served by an open generic counts as registered.
    pub fn validate(&self) -> ValidationResult {
        let catalog = &self.inner().catalog;
        validate(catalog.registrations(), |shape| catalog.template_lifetime(shape))
    }
}
