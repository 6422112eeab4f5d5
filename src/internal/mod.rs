//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::StackGuard;
pub(crate) use dispose_bag::{BoxFuture, DisposeBag, Disposer};
