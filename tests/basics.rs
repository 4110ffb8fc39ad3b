use ferrous_inject::{
    class_key, create_token, Args, ConstructResult, DiError, Injectable, Injector, Key, Provider, Token,
};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Connection {
    name: &'static str,
}

static DB: Lazy<Token<Connection>> = Lazy::new(|| create_token("DB"));

struct Repo {
    db: Arc<Connection>,
}

impl Injectable for Repo {
    fn dependencies() -> Vec<Key> {
        vec![DB.key()]
    }

    fn construct(args: &mut Args) -> ConstructResult<Self> {
        Ok(Repo { db: args.take()? })
    }
}

#[test]
fn test_end_to_end_repo_scenario() {
    let injector = Injector::new();

    let error = injector.inject(&*DB).unwrap_err();
    assert!(matches!(error, DiError::NoProvider { .. }));
    assert!(error.to_string().contains("DB"));

    injector.provide(Provider::token(&*DB).use_value(Connection { name: "fakeConn" })).unwrap();

    let first = injector.inject_class::<Repo>().unwrap();
    let second = injector.inject_class::<Repo>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.db.name, "fakeConn");
    assert!(Arc::ptr_eq(&first.db, &injector.inject(&*DB).unwrap()));
}

#[test]
fn test_value_provider_returns_value() {
    let port = create_token::<u16>("PORT");
    let injector = Injector::new();
    injector.provide_value(&port, 8080).unwrap();

    let a = injector.inject(&port).unwrap();
    let b = injector.inject(&port).unwrap();
    assert_eq!(*a, 8080);
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_tokens_with_same_description_do_not_collide() {
    let a = create_token::<&'static str>("SAME");
    let b = create_token::<&'static str>("SAME");
    let injector = Injector::new();
    injector.provide_value(&a, "a").unwrap();

    assert_eq!(*injector.inject(&a).unwrap(), "a");
    assert!(injector.inject(&b).unwrap_err().is_no_provider_for(&b.key()));
}

#[test]
fn test_factory_receives_dependencies_in_order() {
    let host = create_token::<String>("HOST");
    let port = create_token::<u16>("PORT");
    let url = create_token::<String>("URL");

    let injector = Injector::new();
    injector.provide_value(&host, "localhost".to_string()).unwrap();
    injector.provide_value(&port, 5432).unwrap();
    injector
        .provide_factory(&url, vec![host.key(), port.key()], |args| {
            let host = args.take::<String>()?;
            let port = args.take::<u16>()?;
            Ok(format!("{}:{}", host, port))
        })
        .unwrap();

    assert_eq!(injector.inject(&url).unwrap().as_str(), "localhost:5432");
}

#[test]
fn test_factory_is_called_once() {
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let id = create_token::<String>("ID");

    let injector = Injector::new();
    injector
        .provide_factory(&id, vec![], move |_| {
            let mut c = counter.lock().unwrap();
            *c += 1;
            Ok(format!("instance-{}", *c))
        })
        .unwrap();

    assert_eq!(injector.inject(&id).unwrap().as_str(), "instance-1");
    assert_eq!(injector.inject(&id).unwrap().as_str(), "instance-1");
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn test_class_provider_on_token() {
    struct Fake;

    impl Injectable for Fake {
        fn construct(_: &mut Args) -> ConstructResult<Self> {
            Ok(Fake)
        }
    }

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    impl Clock for Fake {
        fn now(&self) -> u64 {
            1_700_000_000
        }
    }

    let clock = create_token::<dyn Clock>("CLOCK");
    let injector = Injector::new();
    injector
        .provide(Provider::token(&clock).use_class_as::<Fake>(|fake| fake))
        .unwrap();

    assert_eq!(injector.inject(&clock).unwrap().now(), 1_700_000_000);
    // Binding a token to a class does not cache the class key itself.
    assert!(!injector.is_resolved(&class_key::<Fake>()));
}

#[test]
fn test_class_key_rebound_to_substitute() {
    struct Mailer {
        sent: Mutex<Vec<String>>,
    }

    impl Injectable for Mailer {
        fn construct(_: &mut Args) -> ConstructResult<Self> {
            Ok(Mailer { sent: Mutex::new(vec!["real".to_string()]) })
        }
    }

    let injector = Injector::new();
    injector
        .provide(Provider::class::<Mailer>().use_value(Mailer { sent: Mutex::new(Vec::new()) }))
        .unwrap();

    let mailer = injector.inject_class::<Mailer>().unwrap();
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[test]
fn test_bare_class_provider() {
    struct Service;

    impl Injectable for Service {
        fn construct(_: &mut Args) -> ConstructResult<Self> {
            Ok(Service)
        }
    }

    let injector = Injector::new();
    injector.provide(Provider::from_class::<Service>()).unwrap();
    assert!(injector.is_bound(&class_key::<Service>()));

    let a = injector.inject_class::<Service>().unwrap();
    let b = injector.inject_class::<Service>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_failing_factory_is_wrapped_and_not_cached() {
    let attempts = Arc::new(Mutex::new(0));
    let counter = attempts.clone();
    let token = create_token::<u32>("FLAKY");

    let injector = Injector::new();
    injector
        .provide_factory(&token, vec![], move |_| {
            let mut a = counter.lock().unwrap();
            *a += 1;
            if *a == 1 {
                Err("first attempt fails".into())
            } else {
                Ok(*a)
            }
        })
        .unwrap();

    match injector.inject(&token) {
        Err(DiError::Instantiation { key, source }) => {
            assert_eq!(key, token.key());
            assert_eq!(source.to_string(), "first attempt fails");
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
    assert!(!injector.is_resolved(&token.key()));
    assert_eq!(*injector.inject(&token).unwrap(), 2);
}

#[test]
fn test_nested_no_provider_propagates_unchanged() {
    let missing = create_token::<u8>("MISSING");
    let outer = create_token::<u8>("OUTER");
    let injector = Injector::new();
    injector
        .provide_factory(&outer, vec![missing.key()], |args| Ok(*args.take::<u8>()?))
        .unwrap();

    let error = injector.inject(&outer).unwrap_err();
    assert!(error.is_no_provider_for(&missing.key()));
}

#[test]
fn test_factory_can_inject_through_captured_injector() {
    let base = create_token::<u32>("BASE");
    let derived = create_token::<u32>("DERIVED");
    let injector = Arc::new(Injector::new());
    injector.provide_value(&base, 20).unwrap();

    let weak = Arc::downgrade(&injector);
    injector
        .provide_factory(&derived, vec![], move |_| {
            let injector = weak.upgrade().ok_or("injector dropped")?;
            Ok(*injector.inject(&base)? + 1)
        })
        .unwrap();

    assert_eq!(*injector.inject(&derived).unwrap(), 21);
}

#[test]
fn test_wrong_argument_type_reports_key() {
    let number = create_token::<u32>("NUMBER");
    let text = create_token::<String>("TEXT");
    let injector = Injector::new();
    injector.provide_value(&number, 1).unwrap();
    injector
        .provide_factory(&text, vec![number.key()], |args| Ok(args.take::<String>()?.to_string()))
        .unwrap();

    match injector.inject(&text) {
        Err(DiError::Instantiation { key, source }) => {
            assert_eq!(key, text.key());
            assert!(source.to_string().contains("Type mismatch"));
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_providers_are_rejected() {
    let token = create_token::<u32>("COUNT");
    let injector = Injector::new();

    assert!(matches!(injector.provide(Provider::token(&token)), Err(DiError::Configuration { .. })));
    assert!(matches!(
        injector.provide(Provider::token(&token).use_value(1).use_value(2)),
        Err(DiError::Configuration { .. })
    ));
    assert!(!injector.is_bound(&token.key()));
}

#[test]
fn test_try_inject() {
    let present = create_token::<u8>("PRESENT");
    let absent = create_token::<u8>("ABSENT");
    let injector = Injector::new();
    injector.provide_value(&present, 1).unwrap();

    assert_eq!(injector.try_inject(&present).unwrap().map(|v| *v), Some(1));
    assert!(injector.try_inject(&absent).unwrap().is_none());
}

#[test]
fn test_injectors_are_isolated() {
    let token = create_token::<u8>("SHARED");
    let left = Injector::named("left");
    let right = Injector::named("right");
    left.provide_value(&token, 1).unwrap();

    assert_eq!(*left.inject(&token).unwrap(), 1);
    match right.inject(&token) {
        Err(DiError::NoProvider { injector, .. }) => assert_eq!(injector, "right"),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}
