use arbor_di::{
    ContainerOptions, DiError, Injectable, Lifetime, Properties, Resolver, ServiceCollection,
};
use std::sync::Arc;

fn assert_circular<T>(result: Result<T, DiError>, expected: &[&str]) {
    match result {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), expected.len(), "wrong circular path: {:?}", path);
            for (name, suffix) in path.iter().zip(expected) {
                assert!(name.ends_with(suffix), "expected {} in {:?}", suffix, path);
            }
        }
        Err(other) => panic!("expected Circular, got {}", other),
        Ok(_) => panic!("expected Circular, got an instance"),
    }
}

#[test]
fn test_self_circular_dependency() {
    struct SelfReferencing;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory(|r| {
        r.get::<SelfReferencing>()?;
        Ok(SelfReferencing)
    });

    let sp = sc.build();
    assert_circular(sp.get::<SelfReferencing>(), &["SelfReferencing", "SelfReferencing"]);
}

struct A {
    _b: Arc<B>,
}
impl Injectable for A {
    type Deps = (Arc<B>,);
    fn construct((b,): Self::Deps) -> Self {
        A { _b: b }
    }
}

struct B {
    _c: Arc<C>,
}
impl Injectable for B {
    type Deps = (Arc<C>,);
    fn construct((c,): Self::Deps) -> Self {
        B { _c: c }
    }
}

struct C {
    _a: Arc<A>,
}
impl Injectable for C {
    type Deps = (Arc<A>,);
    fn construct((a,): Self::Deps) -> Self {
        C { _a: a }
    }
}

#[test]
fn test_three_level_circular() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_service::<A>();
    sc.add_transient_service::<B>();
    sc.add_transient_service::<C>();

    let sp = sc.build();
    assert_circular(sp.get::<A>(), &["::A", "::B", "::C", "::A"]);
    // The path starts wherever the request entered the cycle.
    assert_circular(sp.get::<B>(), &["::B", "::C", "::A", "::B"]);
}

#[test]
fn test_circular_singletons_do_not_deadlock() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_service::<A>();
    sc.add_singleton_service::<B>();
    sc.add_singleton_service::<C>();

    let sp = sc.build();
    assert_circular(sp.get::<A>(), &["::A", "::B", "::C", "::A"]);

    // A failed construction leaves nothing cached, so it fails the same way again.
    assert_circular(sp.get::<A>(), &["::A", "::B", "::C", "::A"]);
}

#[test]
fn test_circular_in_scope_is_reported_and_scope_stays_usable() {
    struct Healthy;

    let mut sc = ServiceCollection::new();
    sc.add_scoped_service::<A>();
    sc.add_scoped_service::<B>();
    sc.add_scoped_service::<C>();
    sc.add_scoped_factory(|_| Ok(Healthy));

    let sp = sc.build();
    let scope = sp.create_scope();
    assert_circular(scope.get::<C>(), &["::C", "::A", "::B", "::C"]);
    assert!(scope.get::<Healthy>().is_ok());
}

#[test]
fn test_circular_with_traits() {
    trait Ping: Send + Sync {}
    trait Pong: Send + Sync {}

    struct PingImpl;
    impl Ping for PingImpl {}
    struct PongImpl;
    impl Pong for PongImpl {}

    let mut sc = ServiceCollection::new();
    sc.add_trait_factory::<dyn Ping, _>(Lifetime::Transient, |r| {
        r.get::<dyn Pong>()?;
        Ok(Arc::new(PingImpl) as Arc<dyn Ping>)
    });
    sc.add_trait_factory::<dyn Pong, _>(Lifetime::Transient, |r| {
        r.get::<dyn Ping>()?;
        Ok(Arc::new(PongImpl) as Arc<dyn Pong>)
    });

    let sp = sc.build();
    assert_circular(sp.get::<dyn Ping>(), &["Ping", "Pong", "Ping"]);
}

#[test]
fn test_depth_exceeded() {
    struct Leaf;
    impl Injectable for Leaf {
        type Deps = ();
        fn construct(_: ()) -> Self {
            Leaf
        }
    }

    struct Middle;
    impl Injectable for Middle {
        type Deps = (Arc<Leaf>,);
        fn construct(_: Self::Deps) -> Self {
            Middle
        }
    }

    struct Top;
    impl Injectable for Top {
        type Deps = (Arc<Middle>,);
        fn construct(_: Self::Deps) -> Self {
            Top
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_service::<Leaf>();
    sc.add_transient_service::<Middle>();
    sc.add_transient_service::<Top>();
    sc.with_options(ContainerOptions::default().max_depth(2));

    let sp = sc.build();
    assert!(matches!(sp.get::<Top>(), Err(DiError::DepthExceeded(2))));
    assert!(sp.get::<Middle>().is_ok());
}

#[test]
fn test_error_message_joins_path() {
    let err = DiError::Circular(vec!["A", "B", "A"]);
    assert!(err.to_string().contains("A -> B -> A"));
}

struct PropertyA {
    _b: Option<Arc<PropertyB>>,
}
impl Injectable for PropertyA {
    type Deps = ();
    fn construct(_: ()) -> Self {
        PropertyA { _b: None }
    }
    fn properties() -> Properties<Self> {
        Properties::new().property("b", |a: &mut Self, b: Arc<PropertyB>| a._b = Some(b))
    }
}

struct PropertyB {
    _a: Option<Arc<PropertyA>>,
}
impl Injectable for PropertyB {
    type Deps = ();
    fn construct(_: ()) -> Self {
        PropertyB { _a: None }
    }
    fn properties() -> Properties<Self> {
        Properties::new().property("a", |b: &mut Self, a: Arc<PropertyA>| b._a = Some(a))
    }
}

#[test]
fn test_circular_through_properties() {
    struct Healthy;

    let mut sc = ServiceCollection::new();
    sc.add_transient_service::<PropertyA>();
    sc.add_transient_service::<PropertyB>();
    sc.add_transient_factory(|_| Ok(Healthy));

    let sp = sc.build();
    let scope = sp.create_scope();
    assert_circular(scope.get::<PropertyA>(), &["::PropertyA", "::PropertyB", "::PropertyA"]);

    // The resolution chain unwinds on error.
    assert!(scope.get::<Healthy>().is_ok());
    assert_circular(scope.get::<PropertyB>(), &["::PropertyB", "::PropertyA", "::PropertyB"]);
}
