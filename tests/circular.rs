use heist_bootstrap::{
    key_of_type, Dependencies, DiError, DiResult, Injectable, Key, Lifetime, Resolver, ServiceCollection,
};
use std::sync::Arc;

/// Helper: assert that `result` is a cycle whose path ends at `last` and
/// mentions every name in `expected`.
fn assert_cycle<T>(result: DiResult<T>, expected: &[&str], last: &str) {
    match result {
        Err(DiError::CyclicDependency(path)) => {
            for name in expected {
                assert!(
                    path.iter().any(|p| p.ends_with(name)),
                    "path {:?} missing {}",
                    path,
                    name
                );
            }
            let tail = path.last().copied().unwrap_or_default();
            assert!(tail.ends_with(last), "path {:?} should end at {}", path, last);
        }
        Err(other) => panic!("expected CyclicDependency, got {other}"),
        Ok(_) => panic!("expected CyclicDependency, got a value"),
    }
}

#[test]
fn test_self_circular_dependency() {
    struct SelfReferencing;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<SelfReferencing, _>(|r| {
        r.get::<SelfReferencing>()?;
        Ok(SelfReferencing)
    });

    let sp = sc.build();
    assert_cycle(sp.get::<SelfReferencing>(), &["SelfReferencing"], "SelfReferencing");
}

#[test]
fn test_singleton_cycle_fails_without_overflow() {
    struct A(#[allow(dead_code)] Arc<B>);
    struct B(#[allow(dead_code)] Arc<A>);

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<A, _>(|r| Ok(A(r.get::<B>()?)));
    sc.add_singleton_factory::<B, _>(|r| Ok(B(r.get::<A>()?)));

    let sp = sc.build();
    assert_cycle(sp.get::<A>(), &["A", "B"], "A");

    // nothing was cached by the failed attempt; the error is repeatable
    assert_cycle(sp.get::<B>(), &["A", "B"], "B");
}

#[test]
fn test_transient_cycle_fails_without_overflow() {
    struct A(#[allow(dead_code)] Arc<B>);
    struct B(#[allow(dead_code)] Arc<A>);

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<A, _>(|r| Ok(A(r.get::<B>()?)));
    sc.add_transient_factory::<B, _>(|r| Ok(B(r.get::<A>()?)));

    let sp = sc.build();
    assert_cycle(sp.get::<A>(), &["A", "B"], "A");
}

#[test]
fn test_three_step_cycle_reports_full_path() {
    struct Planner(#[allow(dead_code)] Arc<Scout>);
    struct Scout(#[allow(dead_code)] Arc<Fence>);
    struct Fence(#[allow(dead_code)] Arc<Planner>);

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Planner, _>(|r| Ok(Planner(r.get()?)));
    sc.add_transient_factory::<Scout, _>(|r| Ok(Scout(r.get()?)));
    sc.add_singleton_factory::<Fence, _>(|r| Ok(Fence(r.get()?)));

    let sp = sc.build();
    match sp.get::<Planner>() {
        Err(DiError::CyclicDependency(path)) => {
            assert_eq!(path.len(), 4);
            assert!(path[0].ends_with("Planner"));
            assert!(path[1].ends_with("Scout"));
            assert!(path[2].ends_with("Fence"));
            assert!(path[3].ends_with("Planner"));
        }
        other => panic!("expected CyclicDependency, got {:?}", other.err()),
    }
}

#[test]
fn test_injectable_cycle() {
    struct Left;
    struct Right;

    impl Injectable for Left {
        fn dependencies() -> Vec<Key> {
            vec![key_of_type::<Right>()]
        }
        fn construct(_: &Dependencies) -> DiResult<Self> {
            Ok(Left)
        }
    }

    impl Injectable for Right {
        fn dependencies() -> Vec<Key> {
            vec![key_of_type::<Left>()]
        }
        fn construct(_: &Dependencies) -> DiResult<Self> {
            Ok(Right)
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_injectable::<Left>(Lifetime::Singleton);
    sc.add_injectable::<Right>(Lifetime::Singleton);

    // declared dependencies all exist, so validation passes; the cycle shows at resolution
    sc.validate().unwrap();
    let sp = sc.build();
    assert_cycle(sp.get::<Left>(), &["Left", "Right"], "Left");
}

#[test]
fn test_resolution_recovers_after_cycle() {
    struct Loop;
    struct Fine;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Loop, _>(|r| {
        r.get::<Loop>()?;
        Ok(Loop)
    });
    sc.add_transient_factory::<Fine, _>(|_| Ok(Fine));

    let sp = sc.build();
    assert!(sp.get::<Loop>().is_err());
    // the resolution stack unwound fully
    assert!(sp.get::<Fine>().is_ok());
}
