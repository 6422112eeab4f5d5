//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::{DiError, DiResult, Key};

// Thread-local resolution chain. A chain is always synchronous, so the keys
// currently being constructed on this thread are exactly the chain.
thread_local! {
    static RESOLUTION_CHAIN: RefCell<Vec<Key>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the thread-local resolution chain.
///
/// Entering checks for a cycle before pushing; dropping pops the frame, so the
/// chain unwinds correctly on every exit path including `?` returns.
pub(crate) struct StackGuard {
    key: Key,
}

impl StackGuard {
    /// Pushes `key` onto the chain.
    ///
    /// Fails with [`DiError::Circular`] when `key` is already on the chain; the
    /// path starts at the first occurrence and ends with the repeated key.
    /// Fails with [`DiError::DepthExceeded`] once the chain is `max_depth` long.
    pub(crate) fn enter(key: Key, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();

            if let Some(start) = chain.iter().position(|k| *k == key) {
                let mut path: Vec<&'static str> =
                    chain[start..].iter().map(Key::display_name).collect();
                path.push(key.display_name());
                return Err(DiError::Circular(path));
            }

            if chain.len() >= max_depth {
                return Err(DiError::DepthExceeded(chain.len()));
            }

            chain.push(key);
            Ok(StackGuard { key })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_CHAIN.with(|chain| {
            let popped = chain.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.key));
        });
    }
}

/// Current chain depth on this thread.
#[cfg(test)]
pub(crate) fn depth() -> usize {
    RESOLUTION_CHAIN.with(|chain| chain.borrow().len())
}
