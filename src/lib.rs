//! # arbor-di
//!
//! Lifetime-correct dependency injection for Rust, with nested scopes and
//! deterministic disposal.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped, and Transient services
//! - **Constructor and property injection**: declared through [`Injectable`]
//! - **Open generics**: one registration serves every closing of a generic service
//! - **Circular dependency detection**: reported as errors with the full path
//! - **Scope tree**: child scopes, cascade disposal, sync and async teardown
//! - **Thread-safe**: singletons and scoped services are built exactly once
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor_di::{Injectable, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! // Define your services
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     type Deps = (Arc<Database>,);
//!     fn construct((db,): Self::Deps) -> Self { UserService { db } }
//! }
//!
//! // Register services
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_service::<UserService>();
//!
//! // Build and use the service provider
//! let provider = services.build();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and shared across the entire application,
//!   disposed with the container
//! - **Scoped**: Created once per scope, disposed with that scope
//! - **Transient**: Created fresh on every resolution, disposed with the scope
//!   that resolved it
//!
//! ## Scoped Services
//!
//! ```rust
//! use arbor_di::{Resolver, ServiceCollection};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct RequestId(String);
//!
//! let mut services = ServiceCollection::new();
//! let counter = Arc::new(AtomicUsize::new(0));
//! let counter_clone = counter.clone();
//!
//! services.add_scoped_factory(move |_| {
//!     let n = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
//!     Ok(RequestId(format!("req-{}", n)))
//! });
//!
//! let provider = services.build();
//! let scope1 = provider.create_scope();
//! let scope2 = provider.create_scope();
//!
//! let req1 = scope1.get_required::<RequestId>();
//! let req2 = scope2.get_required::<RequestId>();
//! // Different scopes get different instances
//! assert_ne!(req1.0, req2.0);
//!
//! scope1.dispose().unwrap();
//! scope2.dispose().unwrap();
//! ```

pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod generic;
pub mod inject;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;
pub mod validation;

mod internal;
mod registration;

// Re-export core types
pub use collection::ServiceCollection;
pub use config::{ContainerOptions, DEFAULT_MAX_DEPTH};
pub use descriptors::{OpenGenericDescriptor, ServiceDescriptor};
pub use error::{DiError, DiResult, DisposalFailure, DisposeError};
pub use generic::{GenericRequest, GenericService, OpenGeneric, Shape, TypeArgs};
pub use inject::{DeclaredDependency, Dependencies, Dependency, Generic, Injectable, Properties};
pub use key::{key_of_type, Key};
pub use lifetime::{CacheLocation, DisposalOwner, Lifetime, LifetimePolicy};
pub use observer::{DiObserver, LoggingObserver};
pub use provider::{ResolverContext, Scope, ScopeId, ServiceProvider};
pub use registration::StrategyKind;
pub use traits::{AsyncDispose, AsyncDisposeHook, Dispose, DisposeHook, Resolver, ResolverCore};
pub use validation::{ValidationError, ValidationResult, ValidationWarning};
