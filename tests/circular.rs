use ferrous_inject::{
    class_key, create_token, Args, ConstructResult, DiError, Injectable, Injector, InjectorConfig, Key,
};
use std::sync::Arc;

#[derive(Debug)]
struct Chicken {
    _egg: Arc<Egg>,
}

#[derive(Debug)]
struct Egg {
    _chicken: Arc<Chicken>,
}

impl Injectable for Chicken {
    fn dependencies() -> Vec<Key> {
        vec![class_key::<Egg>()]
    }

    fn construct(args: &mut Args) -> ConstructResult<Self> {
        Ok(Chicken { _egg: args.take()? })
    }
}

impl Injectable for Egg {
    fn dependencies() -> Vec<Key> {
        vec![class_key::<Chicken>()]
    }

    fn construct(args: &mut Args) -> ConstructResult<Self> {
        Ok(Egg { _chicken: args.take()? })
    }
}

fn short(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

#[test]
fn test_two_class_cycle_reports_chain() {
    let injector = Injector::new();
    let error = injector.inject_class::<Chicken>().unwrap_err();

    match &error {
        DiError::Circular { chain } => {
            assert_eq!(chain, &vec![class_key::<Chicken>(), class_key::<Egg>(), class_key::<Chicken>()]);
        }
        other => panic!("expected circular error, got {:?}", other),
    }

    let names: Vec<&str> = error.chain_descriptions().into_iter().map(short).collect();
    assert_eq!(names, vec!["Chicken", "Egg", "Chicken"]);
    assert!(error.to_string().starts_with("Circular dependency: "));
}

#[test]
fn test_three_token_cycle_starts_at_first_occurrence() {
    let root = create_token::<u8>("ROOT");
    let a = create_token::<u8>("A");
    let b = create_token::<u8>("B");
    let c = create_token::<u8>("C");

    let injector = Injector::new();
    injector.provide_factory(&root, vec![a.key()], |args| Ok(*args.take::<u8>()?)).unwrap();
    injector.provide_factory(&a, vec![b.key()], |args| Ok(*args.take::<u8>()?)).unwrap();
    injector.provide_factory(&b, vec![c.key()], |args| Ok(*args.take::<u8>()?)).unwrap();
    injector.provide_factory(&c, vec![a.key()], |args| Ok(*args.take::<u8>()?)).unwrap();

    let error = injector.inject(&root).unwrap_err();
    assert_eq!(error.chain_descriptions(), vec!["A", "B", "C", "A"]);
}

#[test]
fn test_cycle_leaves_no_stale_state() {
    let a = create_token::<u8>("A");
    let b = create_token::<u8>("B");
    let injector = Injector::new();
    injector.provide_factory(&a, vec![b.key()], |args| Ok(*args.take::<u8>()?)).unwrap();
    injector.provide_factory(&b, vec![a.key()], |args| Ok(*args.take::<u8>()?)).unwrap();

    assert!(matches!(injector.inject(&a), Err(DiError::Circular { .. })));
    assert!(!injector.is_resolved(&a.key()));
    assert!(!injector.is_resolved(&b.key()));

    // Break the cycle; the same injector now resolves normally.
    injector.provide_value(&b, 7).unwrap();
    assert_eq!(*injector.inject(&a).unwrap(), 7);
}

#[test]
fn test_token_self_dependency_is_circular() {
    let a = create_token::<u8>("SELF");
    let injector = Injector::new();
    injector
        .provide_factory(&a, vec![a.key()], |args| Ok(*args.take::<u8>()?))
        .unwrap();
    assert!(injector.is_bound(&a.key()));
    assert_eq!(injector.validate().cycles, vec![vec![a.key(), a.key()]]);

    match injector.inject(&a) {
        Err(DiError::Circular { chain }) => assert_eq!(chain, vec![a.key(), a.key()]),
        other => panic!("expected circular error, got {:?}", other),
    }
    assert!(!injector.is_resolved(&a.key()));
}

struct Ouroboros;

impl Injectable for Ouroboros {
    fn dependencies() -> Vec<Key> {
        vec![class_key::<Ouroboros>()]
    }

    fn construct(_: &mut Args) -> ConstructResult<Self> {
        Ok(Ouroboros)
    }
}

#[test]
fn test_class_self_dependency_is_circular_bound_or_implicit() {
    let cycle = vec![class_key::<Ouroboros>(), class_key::<Ouroboros>()];

    let implicit = Injector::new();
    match implicit.inject_class::<Ouroboros>() {
        Err(DiError::Circular { chain }) => assert_eq!(chain, cycle),
        other => panic!("expected circular error, got {:?}", other.map(|_| ())),
    }

    let bound = Injector::new();
    bound.provide_class::<Ouroboros>().unwrap();
    match bound.inject_class::<Ouroboros>() {
        Err(DiError::Circular { chain }) => assert_eq!(chain, cycle),
        other => panic!("expected circular error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_runtime_self_injection_is_circular() {
    let a = create_token::<u8>("A");
    let injector = Arc::new(Injector::new());
    let weak = Arc::downgrade(&injector);
    injector
        .provide_factory(&a, vec![], move |_| {
            let injector = weak.upgrade().ok_or("injector dropped")?;
            Ok(*injector.inject(&a)?)
        })
        .unwrap();

    let error = injector.inject(&a).unwrap_err();
    assert_eq!(error.chain_descriptions(), vec!["A", "A"]);
}

#[test]
fn test_depth_limit() {
    let tokens: Vec<_> = (0..10).map(|_| create_token::<u32>("LINK")).collect();
    let injector = Injector::with_config(InjectorConfig::default().with_max_depth(5));
    injector.provide_value(&tokens[9], 0).unwrap();
    for pair in tokens.windows(2) {
        injector
            .provide_factory(&pair[0], vec![pair[1].key()], |args| Ok(*args.take::<u32>()? + 1))
            .unwrap();
    }

    assert!(matches!(injector.inject(&tokens[0]), Err(DiError::DepthExceeded(5))));
    assert_eq!(*injector.inject(&tokens[5]).unwrap(), 4);
}
