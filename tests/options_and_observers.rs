use arbor_di::{
    ContainerOptions, DiError, DiObserver, Injectable, Key, Lifetime, LoggingObserver, Resolver,
    ScopeId, ServiceCollection, StrategyKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingObserver {
    resolving: AtomicUsize,
    resolved: AtomicUsize,
    failed: Mutex<Vec<&'static str>>,
    disposed: Mutex<Vec<(ScopeId, usize)>>,
}

impl DiObserver for RecordingObserver {
    fn resolving(&self, _key: &Key, _scope: ScopeId) {
        self.resolving.fetch_add(1, Ordering::SeqCst);
    }

    fn resolved(&self, _key: &Key, _lifetime: Lifetime, _duration: Duration) {
        self.resolved.fetch_add(1, Ordering::SeqCst);
    }

    fn resolution_failed(&self, key: &Key, _error: &DiError) {
        self.failed.lock().unwrap().push(key.display_name());
    }

    fn scope_disposed(&self, scope: ScopeId, failures: usize) {
        self.disposed.lock().unwrap().push((scope, failures));
    }
}

struct Clock;
impl Injectable for Clock {
    type Deps = ();
    fn construct(_: ()) -> Self {
        Clock
    }
}

#[test]
fn test_observer_sees_resolution_and_disposal() {
    let observer = Arc::new(RecordingObserver::default());

    let mut sc = ServiceCollection::new();
    sc.add_singleton_service::<Clock>();
    sc.add_observer(observer.clone());
    let sp = sc.build();

    let scope = sp.create_scope();
    scope.get_required::<Clock>();
    scope.get_required::<Clock>();
    assert!(scope.get::<String>().is_err());

    assert!(observer.resolving.load(Ordering::SeqCst) >= 2);
    assert_eq!(observer.resolved.load(Ordering::SeqCst), 2);
    assert_eq!(*observer.failed.lock().unwrap(), vec!["alloc::string::String"]);

    let id = scope.id();
    scope.dispose().unwrap();
    assert_eq!(*observer.disposed.lock().unwrap(), vec![(id, 0)]);
}

#[test]
fn test_logging_observer_with_subscriber() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("trace"))
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut sc = ServiceCollection::new();
        sc.add_transient_service::<Clock>();
        sc.add_observer(Arc::new(LoggingObserver::with_prefix("test")));
        let sp = sc.build();

        let scope = sp.create_scope();
        scope.get_required::<Clock>();
        assert!(scope.get::<u8>().is_err());
        scope.dispose().unwrap();
    });
}

#[test]
fn test_options_from_environment() {
    std::env::set_var("ARBOR_IT_OPTS_VALIDATE_SCOPES", "on");
    std::env::set_var("ARBOR_IT_OPTS_MAX_DEPTH", "3");
    let options = ContainerOptions::from_env_with_prefix("ARBOR_IT_OPTS").unwrap();
    assert!(options.validate_scopes);
    assert_eq!(options.max_depth, 3);

    let mut sc = ServiceCollection::new();
    sc.add_scoped_service::<Clock>();
    sc.with_options(options);
    let sp = sc.build();

    assert!(sp.options().validate_scopes);
    assert!(matches!(sp.get::<Clock>(), Err(DiError::WrongLifetime(_))));
    assert!(sp.create_scope().get::<Clock>().is_ok());
}

#[test]
fn test_max_depth_bounds_resolution_chain() {
    struct A;
    struct B;
    struct C;
    struct D;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory(|r| {
        r.get::<B>()?;
        Ok(A)
    });
    sc.add_transient_factory(|r| {
        r.get::<C>()?;
        Ok(B)
    });
    sc.add_transient_factory(|r| {
        r.get::<D>()?;
        Ok(C)
    });
    sc.add_transient_factory(|_| Ok(D));
    sc.with_options(ContainerOptions::new().max_depth(3));
    let sp = sc.build();

    assert!(sp.get::<B>().is_ok());
    assert!(matches!(sp.get::<A>(), Err(DiError::DepthExceeded(_))));
}

#[cfg(feature = "serde")]
#[test]
fn test_options_round_trip_through_json() {
    let options = ContainerOptions::new().validate_scopes(true).max_depth(16);
    let json = serde_json::to_string(&options).unwrap();
    let back: ContainerOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(options, back);
}

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}
impl Injectable for English {
    type Deps = (Arc<Clock>,);
    fn construct(_: Self::Deps) -> Self {
        English
    }
}

#[test]
fn test_descriptors_describe_registrations() {
    let mut sc = ServiceCollection::new();
    sc.add_trait_service::<dyn Greeter, English, _>(Lifetime::Scoped, |e| e as Arc<dyn Greeter>);
    sc.add_singleton_service::<Clock>();
    sc.add_transient_factory(|_| Ok(7u16));

    let descriptors = sc.get_service_descriptors();
    assert_eq!(descriptors.len(), 3);

    let greeter = descriptors
        .iter()
        .find(|d| d.type_name().contains("Greeter"))
        .unwrap();
    assert!(greeter.is_aliased());
    assert!(greeter.impl_type_name.ends_with("English"));
    assert_eq!(greeter.lifetime, Lifetime::Scoped);
    assert_eq!(greeter.dependencies.len(), 1);
    assert!(greeter.closed_from.is_none());

    let clock = descriptors
        .iter()
        .find(|d| d.type_name().ends_with("Clock"))
        .unwrap();
    assert!(!clock.is_aliased());
    assert_eq!(clock.strategy, StrategyKind::Constructor);

    let number = descriptors.iter().find(|d| d.type_name() == "u16").unwrap();
    assert_eq!(number.strategy, StrategyKind::Factory);
    assert!(!number.is_aliased());

    let sp = sc.build();
    assert_eq!(sp.create_scope().get_required::<dyn Greeter>().greet(), "hello");
}
