//! Internal disposal bag for managing cleanup hooks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{DisposalFailure, DisposeError};
use crate::provider::ScopeId;
use crate::traits::{AsyncDisposeHook, Dispose, DisposeHook};
use crate::Injectable;

/// Future type for disposal operations.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type DisposeResult = Result<(), DisposeError>;

/// Cleanup hooks for one tracked instance.
///
/// An instance may expose a synchronous hook, an asynchronous hook or both.
/// The synchronous pass runs `sync`; the asynchronous pass prefers `asynchronous`
/// and falls back to `sync`.
pub(crate) struct Disposer {
    service: &'static str,
    sync: Option<DisposeHook>,
    asynchronous: Option<AsyncDisposeHook>,
}

impl Disposer {
    /// Hooks for a constructed service, or `None` when it has no disposal capability.
    pub(crate) fn for_instance<T: Injectable>(instance: &Arc<T>) -> Option<Self> {
        let has_sync = instance.disposal().is_some();
        let has_async = instance.async_disposal().is_some();
        if !has_sync && !has_async {
            return None;
        }

        let sync = has_sync.then(|| {
            let instance = instance.clone();
            Box::new(move || match instance.disposal() {
                Some(hook) => hook.dispose(),
                None => Ok(()),
            }) as DisposeHook
        });

        let asynchronous = has_async.then(|| {
            let instance = instance.clone();
            Box::new(move || {
                Box::pin(async move {
                    match instance.async_disposal() {
                        Some(hook) => hook.dispose().await,
                        None => Ok(()),
                    }
                }) as BoxFuture<DisposeResult>
            }) as AsyncDisposeHook
        });

        Some(Disposer {
            service: std::any::type_name::<T>(),
            sync,
            asynchronous,
        })
    }

    /// Hook for a disposable factory result.
    pub(crate) fn from_dispose<T: Dispose>(instance: Arc<T>) -> Self {
        Disposer {
            service: std::any::type_name::<T>(),
            sync: Some(Box::new(move || instance.dispose())),
            asynchronous: None,
        }
    }

    /// Hooks handed over through `Resolver::register_disposer` and friends.
    pub(crate) fn from_hooks(
        service: &'static str,
        sync: Option<DisposeHook>,
        asynchronous: Option<AsyncDisposeHook>,
    ) -> Self {
        Disposer {
            service,
            sync,
            asynchronous,
        }
    }

    pub(crate) fn service(&self) -> &'static str {
        self.service
    }

    /// Runs the synchronous hook.
    ///
    /// An async-only instance cannot be disposed here without blocking and is
    /// reported as a failure.
    pub(crate) fn run(self, scope: ScopeId) -> Result<(), DisposalFailure> {
        let service = self.service;
        let result = match self.sync {
            Some(hook) => hook(),
            None => Err("requires asynchronous disposal; use dispose_async".into()),
        };
        result.map_err(|err| DisposalFailure {
            service,
            scope,
            message: err.to_string(),
        })
    }

    /// Runs the asynchronous hook, or the synchronous one when that is all there is.
    pub(crate) async fn run_async(self, scope: ScopeId) -> Result<(), DisposalFailure> {
        let service = self.service;
        let result = match (self.asynchronous, self.sync) {
            (Some(hook), _) => hook().await,
            (None, Some(hook)) => hook(),
            (None, None) => Ok(()),
        };
        result.map_err(|err| DisposalFailure {
            service,
            scope,
            message: err.to_string(),
        })
    }
}

/// Disposers tracked by one scope, in construction order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposer>,
    closed: bool,
}

impl DisposeBag {
    /// Tracks a disposer. A closed bag hands it back so the caller disposes it
    /// on the spot.
    pub(crate) fn push(&mut self, disposer: Disposer) -> Result<(), Disposer> {
        if self.closed {
            return Err(disposer);
        }
        self.entries.push(disposer);
        Ok(())
    }

    /// Closes the bag and returns its disposers in reverse construction order.
    pub(crate) fn drain(&mut self) -> Vec<Disposer> {
        self.closed = true;
        let mut entries = std::mem::take(&mut self.entries);
        entries.reverse();
        entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Dispose for Recorder {
        fn dispose(&self) -> Result<(), DisposeError> {
            self.log.lock().push(self.name);
            if self.name == "broken" {
                Err("broken on purpose".into())
            } else {
                Ok(())
            }
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Disposer {
        Disposer::from_dispose(Arc::new(Recorder { name, log: log.clone() }))
    }

    #[test]
    fn drains_in_reverse_and_closes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        assert!(bag.push(recorder("first", &log)).is_ok());
        assert!(bag.push(recorder("second", &log)).is_ok());
        assert_eq!(bag.len(), 2);

        for disposer in bag.drain() {
            disposer.run(ScopeId::ROOT).unwrap();
        }
        assert_eq!(*log.lock(), vec!["second", "first"]);
        assert!(bag.is_empty());

        let late = bag.push(recorder("late", &log));
        assert!(late.is_err());
    }

    #[test]
    fn failure_names_service_and_scope() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failure = recorder("broken", &log).run(ScopeId::ROOT).unwrap_err();
        assert!(failure.service.ends_with("Recorder"));
        assert_eq!(failure.scope, ScopeId::ROOT);
        assert_eq!(failure.message, "broken on purpose");
    }

    #[test]
    fn async_only_fails_synchronous_pass() {
        let hook: AsyncDisposeHook = Box::new(|| Box::pin(async { Ok(()) }) as BoxFuture<DisposeResult>);
        let failure = Disposer::from_hooks("AsyncOnly", None, Some(hook))
            .run(ScopeId::ROOT)
            .unwrap_err();
        assert_eq!(failure.service, "AsyncOnly");
        assert!(failure.message.contains("asynchronous"));
    }
}
