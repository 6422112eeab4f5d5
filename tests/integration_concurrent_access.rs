//! Concurrent access integration tests
//!
//! These tests verify that arbor-di behaves correctly under concurrent access:
//! exactly-once singleton and scoped creation, scope isolation, and
//! concurrent scope creation and disposal.

use arbor_di::{Dispose, DisposeError, Injectable, Lifetime, Resolver, ServiceCollection};
use crossbeam_utils::thread;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

static SLOW_BUILT: AtomicUsize = AtomicUsize::new(0);

/// Takes long enough to build that concurrent first requests overlap.
struct SlowService {
    id: usize,
}

impl Injectable for SlowService {
    type Deps = ();
    fn construct(_: ()) -> Self {
        std::thread::sleep(Duration::from_millis(20));
        SlowService {
            id: SLOW_BUILT.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[test]
fn test_singleton_created_exactly_once_under_contention() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(move |_| {
        std::thread::sleep(Duration::from_millis(20));
        Ok(counter.fetch_add(1, Ordering::SeqCst))
    });
    let sp = sc.build();

    let thread_count = 16;
    let barrier = Barrier::new(thread_count);

    let results: Vec<Arc<usize>> = thread::scope(|s| {
        let handles: Vec<_> = (0..thread_count)
            .map(|i| {
                let sp = &sp;
                let barrier = &barrier;
                s.spawn(move |_| {
                    barrier.wait();
                    if i % 2 == 0 {
                        sp.get_required::<usize>()
                    } else {
                        sp.create_scope().get_required::<usize>()
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    for result in &results {
        assert!(Arc::ptr_eq(result, &results[0]));
    }
}

#[test]
fn test_scoped_created_once_per_scope_across_threads() {
    let mut sc = ServiceCollection::new();
    sc.add_service::<SlowService>(Lifetime::Scoped);
    let sp = sc.build();
    let scope = sp.create_scope();

    let thread_count = 8;
    let barrier = Barrier::new(thread_count);

    let results: Vec<Arc<SlowService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let scope = &scope;
                let barrier = &barrier;
                s.spawn(move |_| {
                    barrier.wait();
                    scope.get_required::<SlowService>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    for result in &results {
        assert!(Arc::ptr_eq(result, &results[0]));
        assert_eq!(result.id, results[0].id);
    }
}

#[test]
fn test_scoped_service_isolation_between_threads() {
    let mut sc = ServiceCollection::new();
    sc.add_service::<SlowService>(Lifetime::Scoped);
    let sp = sc.build();

    let thread_count = 6;
    let barrier = Barrier::new(thread_count);

    let ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let sp = &sp;
                let barrier = &barrier;
                s.spawn(move |_| {
                    let scope = sp.create_scope();
                    barrier.wait();
                    let a = scope.get_required::<SlowService>();
                    let b = scope.get_required::<SlowService>();
                    assert!(Arc::ptr_eq(&a, &b));
                    a.id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), thread_count);
}

struct Session {
    closed: Arc<AtomicUsize>,
}

impl Dispose for Session {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_concurrent_scope_creation_and_disposal() {
    let closed = Arc::new(AtomicUsize::new(0));
    let c = closed.clone();

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory(Lifetime::Transient, move |_| {
        Ok(Session { closed: c.clone() })
    });
    let sp = sc.build();

    let thread_count = 8;
    let scopes_per_thread = 25;

    thread::scope(|s| {
        for _ in 0..thread_count {
            let sp = &sp;
            s.spawn(move |_| {
                for _ in 0..scopes_per_thread {
                    let scope = sp.create_scope();
                    scope.get_required::<Session>();
                    scope.get_required::<Session>();
                    scope.dispose().unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(
        closed.load(Ordering::SeqCst),
        thread_count * scopes_per_thread * 2
    );
    assert_eq!(sp.root_scope().tracked_count(), 0);
}

#[test]
fn test_open_generic_closed_once_under_contention() {
    use arbor_di::{GenericService, OpenGeneric, TypeArgs};
    use std::marker::PhantomData;

    struct Channel<T>(PhantomData<T>);
    struct ChannelShape;
    impl OpenGeneric for ChannelShape {}

    impl<T: Send + Sync + 'static> Injectable for Channel<T> {
        type Deps = ();
        fn construct(_: ()) -> Self {
            Channel(PhantomData)
        }
    }

    impl<T: Send + Sync + 'static> GenericService for Channel<T> {
        type Shape = ChannelShape;
        fn type_args() -> TypeArgs {
            TypeArgs::of::<T>()
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_open_generic::<ChannelShape>(Lifetime::Singleton);
    let sp = sc.build();

    let barrier = Barrier::new(8);
    let results: Vec<Arc<Channel<u64>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sp = &sp;
                let barrier = &barrier;
                s.spawn(move |_| {
                    barrier.wait();
                    sp.get_required_generic::<Channel<u64>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(sp.closed_generic_count(), 1);
    for result in &results {
        assert!(Arc::ptr_eq(result, &results[0]));
    }
}
