//! Core traits for the dependency injection container.

mod dispose;
mod resolver;

pub use dispose::{AsyncDispose, AsyncDisposeHook, Dispose, DisposeHook};
pub use resolver::{Resolver, ResolverCore};
