//! Open-generic registrations.
//!
//! Rust has no runtime instantiation of generic types, so an open generic is
//! registered by its unbound [`Shape`] and closed at the request site: the
//! requested `Wrapper<i32>` is already monomorphized and brings its own
//! construction recipe, while the registered template contributes the lifetime
//! and the injection plan shared by every closing.
//!
//! ```rust
//! use arbor_di::{GenericService, Injectable, Lifetime, OpenGeneric, Resolver, ServiceCollection, TypeArgs};
//! use std::marker::PhantomData;
//!
//! struct Repository<T>(PhantomData<T>);
//!
//! // The unbound `Repository<_>`.
//! struct RepositoryShape;
//! impl OpenGeneric for RepositoryShape {}
//!
//! impl<T: Send + Sync + 'static> Injectable for Repository<T> {
//!     type Deps = ();
//!     fn construct(_: ()) -> Self { Repository(PhantomData) }
//! }
//!
//! impl<T: Send + Sync + 'static> GenericService for Repository<T> {
//!     type Shape = RepositoryShape;
//!     fn type_args() -> TypeArgs { TypeArgs::of::<T>() }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_open_generic::<RepositoryShape>(Lifetime::Scoped);
//!
//! let provider = services.build();
//! let scope = provider.create_scope();
//! let users = scope.get_required_generic::<Repository<u64>>();
//! assert!(std::sync::Arc::ptr_eq(&users, &scope.get_required_generic::<Repository<u64>>()));
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::registration::Recipe;
use crate::{Injectable, Key};

/// Marker for the unbound form of a generic service.
pub trait OpenGeneric: 'static {
    /// Name used in descriptors and errors.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Identity of an unbound generic.
#[derive(Clone, Copy)]
pub struct Shape {
    id: TypeId,
    name: &'static str,
}

impl Shape {
    pub fn of<S: OpenGeneric>() -> Self {
        Shape {
            id: TypeId::of::<S>(),
            name: S::name(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({})", self.name)
    }
}

#[derive(Clone, Copy)]
struct TypeArg {
    id: TypeId,
    name: &'static str,
}

/// Concrete type arguments of one closing, in declaration order.
#[derive(Clone, Default)]
pub struct TypeArgs {
    args: SmallVec<[TypeArg; 2]>,
}

impl TypeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-argument closing.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new().with::<T>()
    }

    /// Appends the next type argument.
    pub fn with<T: ?Sized + 'static>(mut self) -> Self {
        self.args.push(TypeArg {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl PartialEq for TypeArgs {
    fn eq(&self, other: &Self) -> bool {
        self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.id == b.id)
    }
}

impl Eq for TypeArgs {}

impl Hash for TypeArgs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.args.len().hash(state);
        for arg in &self.args {
            arg.id.hash(state);
        }
    }
}

impl fmt::Display for TypeArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(arg.name)?;
        }
        f.write_str(">")
    }
}

impl fmt::Debug for TypeArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeArgs{}", self)
    }
}

/// A closed generic service: an [`Injectable`] that knows its unbound shape
/// and the type arguments it was closed with.
pub trait GenericService: Injectable {
    type Shape: OpenGeneric;

    fn type_args() -> TypeArgs;
}

/// Object-safe description of a closed generic request.
///
/// Carries the monomorphized recipe so the catalog can close a template
/// without knowing the concrete type.
pub struct GenericRequest {
    pub(crate) key: Key,
    pub(crate) shape: Shape,
    pub(crate) args: TypeArgs,
    pub(crate) recipe: fn() -> Recipe,
}

impl GenericRequest {
    pub(crate) fn of<G: GenericService>() -> Self {
        GenericRequest {
            key: Key::of::<G>(),
            shape: Shape::of::<G::Shape>(),
            args: G::type_args(),
            recipe: Recipe::constructor::<G>,
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn args(&self) -> &TypeArgs {
        &self.args
    }
}
