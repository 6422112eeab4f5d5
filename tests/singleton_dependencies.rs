//! A singleton that resolves transients through the container it holds.
//!
//! Instances resolved by the singleton belong to the root, not to the scope
//! whose request happened to trigger the resolution.

use arbor_di::{Dispose, DisposeError, Injectable, Resolver, ServiceCollection, ServiceProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct EmptyTransient {
    disposed: AtomicBool,
}

impl EmptyTransient {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Dispose for EmptyTransient {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Injectable for EmptyTransient {
    type Deps = ();
    fn construct(_: ()) -> Self {
        EmptyTransient {
            disposed: AtomicBool::new(false),
        }
    }
    fn disposal(&self) -> Option<&dyn Dispose> {
        Some(self)
    }
}

struct MySingletonService {
    provider: ServiceProvider,
    transients: Mutex<Vec<Arc<EmptyTransient>>>,
}

impl MySingletonService {
    fn resolve_transient(&self) {
        let transient = self.provider.get_required::<EmptyTransient>();
        self.transients.lock().unwrap().push(transient);
    }

    fn count(&self) -> usize {
        self.transients.lock().unwrap().len()
    }
}

impl Injectable for MySingletonService {
    type Deps = (ServiceProvider,);
    fn construct((provider,): Self::Deps) -> Self {
        MySingletonService {
            provider,
            transients: Mutex::new(Vec::new()),
        }
    }
}

struct MyTransient1 {
    _singleton: Arc<MySingletonService>,
}

impl Injectable for MyTransient1 {
    type Deps = (Arc<MySingletonService>,);
    fn construct((singleton,): Self::Deps) -> Self {
        singleton.resolve_transient();
        MyTransient1 {
            _singleton: singleton,
        }
    }
}

#[test]
fn test_singleton_keeps_transients_it_resolved() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_service::<MySingletonService>();
    sc.add_transient_service::<MyTransient1>();
    sc.add_transient_service::<EmptyTransient>();
    let sp = sc.build();

    let singleton = sp.get_required::<MySingletonService>();
    let direct = {
        let scope = sp.create_scope();

        scope.get_required::<MyTransient1>();
        scope.get_required::<MyTransient1>();
        assert_eq!(singleton.count(), 2);

        let direct = scope.get_required::<EmptyTransient>();
        assert!(!direct.is_disposed());

        scope.dispose().unwrap();
        assert!(direct.is_disposed());
        direct
    };

    assert!(direct.is_disposed());
    assert_eq!(singleton.count(), 2);
    for transient in singleton.transients.lock().unwrap().iter() {
        assert!(!transient.is_disposed());
    }

    // The singleton holds the provider, so teardown has to be explicit.
    sp.dispose().unwrap();
    for transient in singleton.transients.lock().unwrap().iter() {
        assert!(transient.is_disposed());
    }
}

#[test]
fn test_transient_dependency_of_singleton_is_captured() {
    struct Holder {
        inner: Arc<EmptyTransient>,
    }

    impl Injectable for Holder {
        type Deps = (Arc<EmptyTransient>,);
        fn construct((inner,): Self::Deps) -> Self {
            Holder { inner }
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_service::<Holder>();
    sc.add_transient_service::<EmptyTransient>();
    let sp = sc.build();

    let scope = sp.create_scope();
    let holder = scope.get_required::<Holder>();
    let again = sp.get_required::<Holder>();
    assert!(Arc::ptr_eq(&holder.inner, &again.inner));

    // The dependency was resolved against the requesting scope and dies with it.
    scope.dispose().unwrap();
    assert!(holder.inner.is_disposed());
}
